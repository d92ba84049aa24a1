//! Playbook runs through the ansible container
//!
//! The playbook container joins the namespace network, mounts the inventory,
//! the rule database and the secret directory, waits until every inventory
//! host answers a ping, then runs the playbook against all of them at once.

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

use crate::backend::{container_name, network_name, os_image};
use crate::paths;
use crate::runner::{self, COMMAND_TIMEOUT};
use crate::ui;

lazy_static! {
    static ref FATAL_LINE: Regex = Regex::new(r"FAILED[!]|failed=").unwrap();
}

/// Outcome of a playbook invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybookRun {
    /// No inventory, nothing to configure
    Skipped,
    Completed,
    /// Ansible reported failed tasks; fatal lines were already printed
    Failed,
}

/// Run the provisioning playbook over the namespace inventory
pub fn run_playbook(namespace: &str, verbose: bool) -> Result<PlaybookRun> {
    let inventory = paths::inventory_file(namespace)?;
    match std::fs::metadata(&inventory) {
        Err(_) => {
            log::info!("no systemd-based installations, skipping ansible");
            return Ok(PlaybookRun::Skipped);
        }
        Ok(meta) if meta.len() == 0 => {
            log::info!("no systemd-based installations, skipping ansible");
            return Ok(PlaybookRun::Skipped);
        }
        Ok(_) => {}
    }

    let mut volumes = vec![
        "-v".to_string(),
        format!("{}:/vagrant/ansible_hosts_run:Z", inventory.display()),
        "-v".to_string(),
        format!(
            "{}:/vagrant/dbstand_version.db:Z",
            paths::database_path()?.display()
        ),
        "-v".to_string(),
        format!("{}:/vagrant/secret:Z", paths::secret_dir()?.display()),
    ];

    // Local role and playbook overrides take precedence over the ones baked
    // into the ansible image
    if Path::new("roles").is_dir() {
        let roles = std::fs::canonicalize("roles").context("could not resolve roles dir")?;
        volumes.push("-v".to_string());
        volumes.push(format!("{}:/vagrant/roles:Z", roles.display()));
        if Path::new("common").is_dir() {
            let common =
                std::fs::canonicalize("common").context("could not resolve common dir")?;
            volumes.push("-v".to_string());
            volumes.push(format!("{}:/vagrant/common:Z", common.display()));
        }
    }
    if Path::new("playbook.yml").is_file() {
        let playbook =
            std::fs::canonicalize("playbook.yml").context("could not resolve playbook")?;
        volumes.push("-v".to_string());
        volumes.push(format!("{}:/vagrant/playbook.yml:Z", playbook.display()));
    }

    let runner_name = container_name(namespace, "ansible");
    let mut cmd = vec![
        "docker".to_string(),
        "run".to_string(),
        "-i".to_string(),
        "--rm".to_string(),
        "--name".to_string(),
        runner_name.clone(),
        "--network".to_string(),
        network_name(namespace),
        "--hostname".to_string(),
        runner_name,
    ];
    cmd.extend(volumes);
    cmd.push(os_image("ansible"));
    cmd.push("bash".to_string());
    cmd.push("-c".to_string());

    let mut script = "cd /vagrant;\
        until ansible -m ping -i ansible_hosts_run all &>/dev/null ; do sleep 1; done ; \
        ANSIBLE_FORCE_COLOR=True ANSIBLE_DISPLAY_SKIPPED_HOSTS=False \
        ansible-playbook -i ansible_hosts_run --forks 16 playbook.yml"
        .to_string();
    if verbose {
        script.push_str(" -vvv");
    }
    cmd.push(script);

    let (status, output) = runner::run_streamed_unchecked(&cmd, COMMAND_TIMEOUT)?;
    if status.success() {
        return Ok(PlaybookRun::Completed);
    }

    ui::error("provisioning playbook failed:");
    for line in fatal_lines(&output) {
        eprintln!("{line}");
    }
    Ok(PlaybookRun::Failed)
}

fn fatal_lines(output: &str) -> Vec<&str> {
    output
        .lines()
        .filter(|line| FATAL_LINE.is_match(line))
        .collect()
}
