//! Namespace management: container sets sharing one docker network

use anyhow::Result;

use crate::backend::{docker, k3d, network_name};
use crate::cli::NamespaceCreateArgs;
use crate::keyword::parse_option_map;
use crate::paths;
use crate::topology::{Backend, NodeSpec};
use crate::ui;
use crate::Context;

/// Create a namespace's network and containers from option maps
pub fn create(ctx: &Context, args: &NamespaceCreateArgs) -> Result<()> {
    let os_map = parse_option_map(&args.os);
    let priv_map = parse_option_map(&args.privileged);
    let expose_map = parse_option_map(&args.expose);

    docker::create_network(&args.name)?;
    for (node, osver) in &os_map {
        let privileged = priv_map
            .get(node)
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(true);
        let spec = NodeSpec {
            name: node.clone(),
            os: Some(osver.clone()),
            backend: Backend::Docker,
            privileged,
            expose_port: expose_map.get(node).cloned(),
            memory: ctx.memory.clone(),
            cpus: ctx.cpus.clone(),
            directives: Vec::new(),
        };
        ui::info(&format!("creating container {node} (os {osver})"));
        docker::create_container(&args.name, &spec, osver)?;
    }
    ui::success(&format!("namespace {} created", args.name));
    Ok(())
}

/// List namespaces, derived from docker network names
pub fn list() -> Result<()> {
    let networks = docker::list_networks()?;
    for namespace in namespaces_from(&networks) {
        println!("{namespace}");
    }
    Ok(())
}

fn namespaces_from(networks: &str) -> Vec<String> {
    let suffix = network_name("");
    networks
        .lines()
        .filter_map(|line| {
            if line == suffix {
                Some("default".to_string())
            } else {
                line.strip_suffix(&format!("-{suffix}")).map(String::from)
            }
        })
        .collect()
}

/// Tear down everything a namespace runs: clusters, containers, network,
/// and the accumulated inventory
pub fn destroy(namespace: &str) -> Result<()> {
    for cluster in k3d::find_clusters(namespace)? {
        k3d::delete_cluster(&cluster)?;
    }

    let ids = docker::container_ids(namespace)?;
    docker::remove_containers(&ids)?;
    docker::remove_network(namespace)?;

    let inventory = paths::inventory_file(namespace)?;
    if inventory.exists() {
        std::fs::remove_file(&inventory)?;
    }
    Ok(())
}
