//! Image-backed nodes
//!
//! Nodes tagged `docker-image` run an unmodified vendor image instead of a
//! provisioned base container; they never appear in the inventory. Creation
//! and configuration are split: every container must exist before
//! replication wiring connects them.

use anyhow::{Context, Result};
use std::collections::BTreeMap;

use crate::backend::{container_name, docker, network_name};
use crate::rewrite::ADMIN_PASSWORD;
use crate::runner::{self, COMMAND_TIMEOUT};

fn image_for(cmd: &str, args: &BTreeMap<String, String>) -> String {
    if let Some(image) = args.get("docker-image")
        && !image.is_empty()
    {
        return image.clone();
    }
    match args.get("version").map(String::as_str) {
        Some(version) if version != "latest" && !version.is_empty() => {
            format!("{cmd}:{version}")
        }
        _ => format!("{cmd}:latest"),
    }
}

/// Create the vendor-image container for one directive
pub fn create_container(
    namespace: &str,
    node: &str,
    cmd: &str,
    args: &BTreeMap<String, String>,
) -> Result<()> {
    let mut run_args = vec![
        "docker".to_string(),
        "run".to_string(),
        "--name".to_string(),
        container_name(namespace, node),
        "-d".to_string(),
        "--network".to_string(),
        network_name(namespace),
        "--hostname".to_string(),
        node.to_string(),
    ];

    // Vendor database images expect their superuser password up front
    if cmd.starts_with("mysql") || cmd.starts_with("percona-server") {
        run_args.push("-e".to_string());
        run_args.push(format!("MYSQL_ROOT_PASSWORD={ADMIN_PASSWORD}"));
    } else if cmd.starts_with("postgres") {
        run_args.push("-e".to_string());
        run_args.push(format!("POSTGRES_PASSWORD={ADMIN_PASSWORD}"));
    }

    if let Some(port) = args.get("expose") {
        run_args.push("-p".to_string());
        run_args.push(port.clone());
    }

    run_args.push(image_for(cmd, args));

    runner::run_capture(&run_args, COMMAND_TIMEOUT)
        .with_context(|| format!("could not create image container {node}"))?;
    Ok(())
}

/// Second-pass configuration for an image-backed directive
///
/// Runs after every node's container exists; currently wires mysql-family
/// replication when the directive names a master.
pub fn configure_container(
    namespace: &str,
    node: &str,
    cmd: &str,
    args: &BTreeMap<String, String>,
) -> Result<()> {
    let Some(master) = args.get("master") else {
        return Ok(());
    };
    if !(cmd.starts_with("mysql") || cmd.starts_with("percona-server")) {
        return Ok(());
    }

    let master_ip = docker::node_ip(namespace, master)
        .with_context(|| format!("could not resolve replication master {master}"))?;

    let change_master = format!(
        "CHANGE MASTER TO MASTER_HOST='{master_ip}', MASTER_USER='root', \
         MASTER_PASSWORD='{ADMIN_PASSWORD}', MASTER_AUTO_POSITION=1; START SLAVE;"
    );
    let exec_args = vec![
        "docker".to_string(),
        "exec".to_string(),
        container_name(namespace, node),
        "mysql".to_string(),
        format!("-p{ADMIN_PASSWORD}"),
        "-e".to_string(),
        change_master,
    ];
    runner::run_capture(&exec_args, COMMAND_TIMEOUT)
        .with_context(|| format!("could not configure replication on {node}"))?;
    Ok(())
}
