//! Exec into a node's container

use anyhow::Result;

use crate::backend::docker;
use crate::Context;

/// Run a command in a node, defaulting to a login shell on node0
///
/// Exits with the container command's status so scripted callers can chain
/// on it.
pub fn run(ctx: &Context, args: &[String]) -> Result<()> {
    let (node, cmd) = split_node_and_command(args);
    let status = docker::exec_interactive(&ctx.namespace, &node, &cmd)?;
    std::process::exit(status.code().unwrap_or(1));
}

/// `[node] [--] [cmd…]` with node defaulting to node0 and the command
/// defaulting to a login shell
fn split_node_and_command(args: &[String]) -> (String, Vec<String>) {
    let mut node = "node0".to_string();
    let mut cmd: Vec<String>;

    if args.len() <= 1 {
        if let Some(first) = args.first()
            && first != "--"
        {
            node = first.clone();
        }
        cmd = vec!["/bin/bash".to_string(), "--login".to_string()];
    } else {
        node = args[0].clone();
        cmd = args[1..].to_vec();
        if cmd.len() > 1 && cmd[0] == "--" {
            cmd.remove(0);
        }
    }
    (node, cmd)
}
