//! Docker container and network operations

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::io::IsTerminal;

use crate::backend::{container_name, network_name, os_image};
use crate::paths;
use crate::rewrite::AddressLookup;
use crate::runner::{self, COMMAND_TIMEOUT};
use crate::topology::NodeSpec;

lazy_static! {
    static ref ALREADY_EXISTS: Regex = Regex::new("already exists").unwrap();
    static ref ALREADY_GONE: Regex =
        Regex::new("not found|No such|has active endpoints").unwrap();
}

fn argv(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Create the namespace network; an existing network is not an error
pub fn create_network(namespace: &str) -> Result<()> {
    let args = argv(&["docker", "network", "create", &network_name(namespace)]);
    runner::run_allowing(&args, &ALREADY_EXISTS, COMMAND_TIMEOUT)
        .context("could not create docker network")?;
    Ok(())
}

/// Start the base container for a plain node
///
/// The secret directory and the NFS data directory are bind-mounted so the
/// playbook can reach the node over ssh and nodes can share files.
pub fn create_container(namespace: &str, node: &NodeSpec, os: &str) -> Result<()> {
    let secret = paths::secret_dir()?;
    let nfs = paths::nfs_data_dir()?;

    let mut args = argv(&[
        "docker",
        "run",
        "--name",
        &container_name(namespace, &node.name),
        "-v",
        &format!("{}:/vagrant/secret:Z", secret.display()),
        "-v",
        &format!("{}:/nfs:Z", nfs.display()),
        "-d",
        "--cgroupns=host",
        "--tmpfs",
        "/tmp",
        "--network",
        &network_name(namespace),
        "--tmpfs",
        "/run",
        "--tmpfs",
        "/run/lock",
        "-v",
        "/sys/fs/cgroup:/sys/fs/cgroup",
        "--hostname",
        &node.name,
    ]);

    if let Some(memory) = &node.memory {
        args.push(format!("--memory={memory}"));
    }
    if let Some(cpus) = &node.cpus {
        args.push(format!("--cpus={cpus}"));
    }
    if node.privileged {
        args.extend(argv(&[
            "--privileged",
            "--cap-add",
            "NET_ADMIN",
            "--cap-add",
            "SYS_PTRACE",
            "--cap-add",
            "IPC_LOCK",
            "--cap-add",
            "DAC_OVERRIDE",
            "--cap-add",
            "AUDIT_WRITE",
            "--security-opt",
            "seccomp=unconfined",
        ]));
    }
    if let Some(port) = &node.expose_port {
        args.push("-p".to_string());
        args.push(port.clone());
    }
    args.push(os_image(os));

    runner::run_capture(&args, COMMAND_TIMEOUT)
        .with_context(|| format!("could not create container {}", node.name))?;
    Ok(())
}

/// Raw `docker ps` listing of the namespace's containers, for display
pub fn list_containers(namespace: &str) -> Result<String> {
    let args = argv(&[
        "docker",
        "ps",
        "-a",
        "--filter",
        &format!("network={}", network_name(namespace)),
    ]);
    runner::run_capture(&args, COMMAND_TIMEOUT)
}

/// Names of all containers attached to the namespace network
pub fn container_names(namespace: &str) -> Result<Vec<String>> {
    let args = argv(&[
        "docker",
        "ps",
        "-a",
        "--filter",
        &format!("network={}", network_name(namespace)),
        "--format",
        "{{.Names}}",
    ]);
    let out = runner::run_allowing(&args, &ALREADY_GONE, COMMAND_TIMEOUT)?;
    Ok(out.lines().filter(|l| !l.is_empty()).map(String::from).collect())
}

/// Container IDs attached to the namespace network
pub fn container_ids(namespace: &str) -> Result<Vec<String>> {
    let args = argv(&[
        "docker",
        "ps",
        "-a",
        "--filter",
        &format!("network={}", network_name(namespace)),
        "--format",
        "{{.ID}}",
    ]);
    let out = runner::run_allowing(&args, &ALREADY_GONE, COMMAND_TIMEOUT)?;
    Ok(out.lines().filter(|l| !l.is_empty()).map(String::from).collect())
}

/// Force-remove containers with their anonymous volumes
pub fn remove_containers(ids: &[String]) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let mut args = argv(&["docker", "rm", "-f", "-v"]);
    args.extend(ids.iter().cloned());
    runner::run_allowing(&args, &ALREADY_GONE, COMMAND_TIMEOUT)?;
    Ok(())
}

/// Remove the namespace network
pub fn remove_network(namespace: &str) -> Result<()> {
    let args = argv(&["docker", "network", "rm", &network_name(namespace)]);
    runner::run_allowing(&args, &ALREADY_GONE, COMMAND_TIMEOUT)?;
    Ok(())
}

/// All docker network names, one per line
pub fn list_networks() -> Result<String> {
    let args = argv(&["docker", "network", "ls", "--format={{.Name}}"]);
    runner::run_capture(&args, COMMAND_TIMEOUT)
}

/// Address of a container on the namespace network
pub fn container_ip(namespace: &str, container: &str) -> Result<String> {
    let network = network_name(namespace);
    let args = argv(&[
        "docker",
        "inspect",
        container,
        "--format",
        &format!("{{{{ index .NetworkSettings.Networks \"{network}\" \"IPAddress\" }}}}"),
    ]);
    let out = runner::run_capture(&args, COMMAND_TIMEOUT)
        .with_context(|| format!("could not inspect container {container}"))?;
    Ok(out.trim().to_string())
}

/// Address of a node's base container
pub fn node_ip(namespace: &str, node: &str) -> Result<String> {
    container_ip(namespace, &container_name(namespace, node))
}

/// `docker exec` into a node, allocating a tty when attached to one
pub fn exec_interactive(namespace: &str, node: &str, cmd: &[String]) -> Result<std::process::ExitStatus> {
    let mut args = argv(&["docker", "exec"]);
    if std::io::stdin().is_terminal() {
        args.push("-it".to_string());
    } else {
        args.push("-i".to_string());
    }
    args.push(container_name(namespace, node));
    args.extend(cmd.iter().cloned());
    runner::run_interactive(&args)
}

/// Run a shell script in a throwaway helper container on the namespace
/// network
pub fn run_in_helper_container(
    namespace: &str,
    script: &str,
    volumes: &[String],
    stream: bool,
) -> Result<String> {
    let mut args = argv(&[
        "docker",
        "run",
        "-i",
        "--rm",
        "--network",
        &network_name(namespace),
    ]);
    args.extend(volumes.iter().cloned());
    args.push(os_image("el8"));
    args.push("bash".to_string());
    args.push("-c".to_string());
    args.push(script.to_string());

    if stream {
        runner::run_streamed(&args, COMMAND_TIMEOUT)
    } else {
        runner::run_capture(&args, COMMAND_TIMEOUT)
    }
}

/// Lazy address resolution against running containers
pub struct DockerLookup {
    pub namespace: String,
}

impl AddressLookup for DockerLookup {
    fn node_ip(&self, node: &str) -> Result<String> {
        node_ip(&self.namespace, node)
    }

    fn node_hostname(&self, node: &str) -> String {
        container_name(&self.namespace, node)
    }
}
