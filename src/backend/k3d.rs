//! Ephemeral Kubernetes clusters via k3d
//!
//! Clusters live on the namespace's docker network so operator pods and
//! plain nodes can reach each other. Cluster names follow the container
//! naming scheme; k3d itself prefixes server containers with `k3d-` and
//! suffixes them `-server-0`, which is how existing clusters are discovered.

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

use crate::backend::{container_name, docker, network_name};
use crate::paths;
use crate::runner::{self, COMMAND_TIMEOUT};
use crate::topology::ClusterProvisioner;

lazy_static! {
    static ref NO_CLUSTERS: Regex = Regex::new("No clusters found").unwrap();
}

/// Create a k3d cluster for a node
///
/// `args` is the parsed directive argument map: `version` selects the k3s
/// image tag, `nodes` the total node count (agents = nodes - 1, default 2),
/// plus optional `storage-path`, `host-alias`, `ingress-type`/`ingress` and
/// `registry-cache`.
pub fn create_cluster(
    namespace: &str,
    node: &str,
    args: &BTreeMap<String, String>,
) -> Result<()> {
    let cluster_name = container_name(namespace, node);

    let mut agents = 2u32;
    if let Some(nodes) = args.get("nodes")
        && let Ok(total) = nodes.parse::<u32>()
        && total > 1
    {
        agents = total - 1;
    }

    let version = args.get("version").map(String::as_str).unwrap_or("latest");
    let mut cmd = vec![
        "k3d".to_string(),
        "cluster".to_string(),
        "create".to_string(),
        cluster_name,
        "-i".to_string(),
        format!("rancher/k3s:{version}"),
        "--network".to_string(),
        network_name(namespace),
        "-a".to_string(),
        agents.to_string(),
    ];

    // Disk-pressure evictions would tear down test pods on nearly-full hosts
    for arg in [
        "--kubelet-arg=eviction-hard=imagefs.available<1%,nodefs.available<1%@server:*",
        "--kubelet-arg=eviction-minimum-reclaim=imagefs.available=1%,nodefs.available=1%@server:*",
        "--kubelet-arg=eviction-hard=imagefs.available<1%,nodefs.available<1%@agent:*",
        "--kubelet-arg=eviction-minimum-reclaim=imagefs.available=1%,nodefs.available=1%@agent:*",
    ] {
        cmd.push("--k3s-arg".to_string());
        cmd.push(arg.to_string());
    }

    if let Some(dir) = args.get("storage-path") {
        cmd.push("--volume".to_string());
        cmd.push(format!("{dir}:/var/lib/rancher/k3s/storage@all"));
    }

    cmd.push("--volume".to_string());
    cmd.push("/sys/kernel/debug:/sys/kernel/debug@all".to_string());

    if let Some(host_alias) = args.get("host-alias") {
        cmd.push("--host-alias".to_string());
        cmd.push(host_alias.replace('|', ","));
    }

    if let Some(ingress_type) = args.get("ingress-type")
        && ingress_type != "traefik"
    {
        cmd.push("--k3s-arg".to_string());
        cmd.push("--disable=traefik@server:0".to_string());
        if let Some(port) = args.get("ingress") {
            cmd.push("-p".to_string());
            cmd.push(format!("{port}:{port}@loadbalancer"));
        }
    }

    if let Some(registry_cache) = args.get("registry-cache") {
        let config = format!(
            "\nmirrors:\n  docker.io:\n    endpoint:\n    - \"{registry_cache}\"\n"
        );
        let config_file = paths::registry_mirror_file()?;
        std::fs::write(&config_file, config)
            .with_context(|| format!("could not write {}", config_file.display()))?;
        cmd.push("--registry-config".to_string());
        cmd.push(config_file.display().to_string());
    }

    runner::run_streamed(&cmd, COMMAND_TIMEOUT).context("could not create k3d cluster")?;
    Ok(())
}

/// Cluster names discovered from the namespace's containers
pub fn find_clusters(namespace: &str) -> Result<Vec<String>> {
    let clusters = docker::container_names(namespace)?
        .into_iter()
        .filter_map(|name| {
            name.strip_suffix("-server-0")
                .and_then(|s| s.strip_prefix("k3d-"))
                .map(String::from)
        })
        .collect();
    Ok(clusters)
}

/// Delete one cluster; an already-gone cluster is not an error
pub fn delete_cluster(cluster: &str) -> Result<()> {
    let cmd = vec![
        "k3d".to_string(),
        "cluster".to_string(),
        "delete".to_string(),
        cluster.to_string(),
    ];
    runner::run_allowing(&cmd, &NO_CLUSTERS, COMMAND_TIMEOUT)?;
    Ok(())
}

/// The live provisioner handed to the topology planner
pub struct K3dProvisioner {
    pub namespace: String,
}

impl ClusterProvisioner for K3dProvisioner {
    fn create_cluster(&self, node: &str, args: &BTreeMap<String, String>) -> Result<()> {
        create_cluster(&self.namespace, node, args)
    }
}
