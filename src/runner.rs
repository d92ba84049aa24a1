//! External process execution
//!
//! Every backend call (docker, k3d, the ansible container) goes through this
//! module. Calls run synchronously under a bounded timeout; a timeout is a
//! fatal error for the invocation so the orchestrator never continues into a
//! half-provisioned topology.

use anyhow::{Context, Result, bail};
use regex::Regex;
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// Default bound on any single external invocation
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(1800);

/// Run a command and capture its combined output
pub fn run_capture(argv: &[String], timeout: Duration) -> Result<String> {
    let (status, output) = spawn_collect(argv, false, timeout)?;
    if status.success() {
        Ok(output)
    } else {
        bail!("command failed ({status}): {}\n{output}", argv.join(" "))
    }
}

/// Run a command, echoing output as it arrives while also capturing it
pub fn run_streamed(argv: &[String], timeout: Duration) -> Result<String> {
    let (status, output) = spawn_collect(argv, true, timeout)?;
    if status.success() {
        Ok(output)
    } else {
        bail!("command failed ({status}): {}", argv.join(" "))
    }
}

/// Like [`run_streamed`] but hands back status and output instead of
/// failing, for callers that post-process the output of failed runs
pub fn run_streamed_unchecked(
    argv: &[String],
    timeout: Duration,
) -> Result<(ExitStatus, String)> {
    spawn_collect(argv, true, timeout)
}

/// Run a command, treating a failure whose output matches `ignore` as success
///
/// Used for idempotent backend calls ("network already exists", "No clusters
/// found").
pub fn run_allowing(argv: &[String], ignore: &Regex, timeout: Duration) -> Result<String> {
    let (status, output) = spawn_collect(argv, false, timeout)?;
    if status.success() || ignore.is_match(&output) {
        Ok(output)
    } else {
        bail!("command failed ({status}): {}\n{output}", argv.join(" "))
    }
}

/// Run a command with inherited stdio (interactive sessions, no timeout)
pub fn run_interactive(argv: &[String]) -> Result<ExitStatus> {
    let (cmd, args) = argv.split_first().context("empty command line")?;
    Command::new(cmd)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| format!("failed to execute: {}", argv.join(" ")))
}

fn spawn_collect(
    argv: &[String],
    stream: bool,
    timeout: Duration,
) -> Result<(ExitStatus, String)> {
    let (cmd, args) = argv.split_first().context("empty command line")?;
    log::debug!("running: {}", argv.join(" "));

    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to execute: {}", argv.join(" ")))?;

    let stdout = child.stdout.take().context("child stdout unavailable")?;
    let stderr = child.stderr.take().context("child stderr unavailable")?;

    let out_reader = std::thread::spawn(move || collect_lines(stdout, stream, false));
    let err_reader = std::thread::spawn(move || collect_lines(stderr, stream, true));

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if started.elapsed() > timeout {
            let _ = child.kill();
            let _ = child.wait();
            bail!(
                "command timed out after {}s: {}",
                timeout.as_secs(),
                argv.join(" ")
            );
        }
        std::thread::sleep(Duration::from_millis(50));
    };

    let mut output = out_reader.join().unwrap_or_default();
    output.push_str(&err_reader.join().unwrap_or_default());
    Ok((status, output))
}

fn collect_lines(source: impl Read, stream: bool, to_stderr: bool) -> String {
    let mut collected = String::new();
    for line in BufReader::new(source).lines().map_while(Result::ok) {
        if stream {
            if to_stderr {
                eprintln!("{line}");
            } else {
                println!("{line}");
            }
        }
        collected.push_str(&line);
        collected.push('\n');
    }
    collected
}
