//! Deployment orchestration
//!
//! Turns a planned topology into running infrastructure in three phases:
//! network and base containers first, then per-node provisioning in node
//! order, then one playbook run over the accumulated inventory. The phases
//! are strictly sequential; any backend failure aborts the remainder.

use anyhow::{Context, Result};
use ruledb::{Catalog, RuleTable};
use std::io::Write;

use crate::backend::{ansible, container_name, docker, image, k3d, operator};
use crate::exit;
use crate::keyword::Directive;
use crate::paths;
use crate::rewrite;
use crate::secrets;
use crate::topology::{self, Backend, NodeSpec, PlanDefaults};
use crate::ui;

/// Provision one `deploy` invocation end to end
///
/// Mixed-image nodes and failed playbook/operator runs terminate the process
/// with their dedicated exit codes; backend errors propagate to the caller.
pub fn run(
    catalog: &Catalog,
    namespace: &str,
    directives: &[String],
    defaults: &PlanDefaults,
    verbose: bool,
) -> Result<()> {
    let provisioner = k3d::K3dProvisioner {
        namespace: namespace.to_string(),
    };
    let topology = topology::plan(catalog, directives, defaults, &provisioner)?;
    if topology.is_empty() {
        ui::warn("nothing to deploy");
        return Ok(());
    }

    secrets::ensure_ssh_key()?;

    // Phase 1: network plus a base container for every plain node. Marker
    // names without a numeric suffix were already dropped during planning.
    docker::create_network(namespace)?;
    for node in topology.ordered() {
        if let Some(os) = &node.os {
            ui::info(&format!(
                "creating container {} (os {os})",
                container_name(namespace, &node.name)
            ));
            docker::create_container(namespace, node, os)?;
        }
    }

    // Phase 2: per-node provisioning in ascending node order. A node
    // introduced only by its marker gets a base container and nothing else;
    // an inventory line for it would point the playbook at an unprovisioned
    // host.
    for node in topology.ordered() {
        if !needs_provisioning(node) {
            continue;
        }
        match node.backend {
            Backend::DockerImage => deploy_image_node(catalog, namespace, node)?,
            Backend::Kubectl => deploy_operator_node(catalog, namespace, node)?,
            Backend::Docker => deploy_host_node(catalog, namespace, node)?,
        }
    }

    // Image-backed nodes are wired together only after every container
    // exists; replication targets may live on later nodes
    for node in topology.ordered() {
        if node.backend == Backend::DockerImage {
            configure_image_node(catalog, namespace, node)?;
        }
    }

    // Phase 3: one playbook run over everything the inventory accumulated
    if ansible::run_playbook(namespace, verbose)? == ansible::PlaybookRun::Failed {
        std::process::exit(exit::PLAYBOOK_FAILED);
    }
    Ok(())
}

fn needs_provisioning(node: &NodeSpec) -> bool {
    !node.directives.is_empty()
}

fn deploy_image_node(catalog: &Catalog, namespace: &str, node: &NodeSpec) -> Result<()> {
    for raw in &node.directives {
        let directive = Directive::parse(catalog, raw);
        if !directive.args.contains_key("docker-image") {
            ui::error(&format!(
                "can't mix docker-image items with provisioned ones; keep a single \
                 docker-image command per node (node {}, directive {raw})",
                node.name
            ));
            std::process::exit(exit::MIXED_IMAGE);
        }
        image::create_container(namespace, &node.name, &directive.cmd, &directive.args)?;
    }
    Ok(())
}

fn configure_image_node(catalog: &Catalog, namespace: &str, node: &NodeSpec) -> Result<()> {
    for raw in &node.directives {
        let directive = Directive::parse(catalog, raw);
        if directive.args.contains_key("docker-image") {
            image::configure_container(namespace, &node.name, &directive.cmd, &directive.args)?;
        }
    }
    Ok(())
}

fn deploy_operator_node(catalog: &Catalog, namespace: &str, node: &NodeSpec) -> Result<()> {
    let mut base_args = String::new();
    let mut versioned = Vec::new();

    for raw in &node.directives {
        let directive = Directive::parse(catalog, raw);
        let resolved = catalog.resolve(RuleTable::Operator, &directive.cmd, &directive.rule_args())?;
        log::info!("{resolved}");
        if resolved.contains("--version") {
            versioned.push(resolved);
        } else if !resolved.is_empty() {
            base_args.push(' ');
            base_args.push_str(&resolved);
        }
    }

    if !operator::run_operator_tool(namespace, &node.name, &base_args)? {
        std::process::exit(exit::PLAYBOOK_FAILED);
    }
    // Version-pinned deployments run one at a time on top of the shared base
    // arguments
    for resolved in versioned {
        let args = format!("{base_args} {resolved}");
        if !operator::run_operator_tool(namespace, &node.name, &args)? {
            std::process::exit(exit::PLAYBOOK_FAILED);
        }
    }
    Ok(())
}

fn deploy_host_node(catalog: &Catalog, namespace: &str, node: &NodeSpec) -> Result<()> {
    log::info!("deploying {} with {:?}", node.name, node.directives);

    for raw in &node.directives {
        let directive = Directive::parse(catalog, raw);
        if directive.cmd == "percona-server-mongodb" {
            secrets::ensure_mongo_keyfile()?;
        }
    }

    let ip = docker::node_ip(namespace, &node.name)
        .with_context(|| format!("could not resolve address of {}", node.name))?;
    let resolved = resolve_host_args(catalog, &node.name, &node.directives)?;
    let line = inventory_line(&container_name(namespace, &node.name), &ip, &resolved);

    let lookup = docker::DockerLookup {
        namespace: namespace.to_string(),
    };
    let rewritten = rewrite::rewrite_node_refs(&line, &lookup);

    let inventory = paths::inventory_file(namespace)?;
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(&inventory)
        .with_context(|| format!("could not open inventory {}", inventory.display()))?;
    file.write_all(rewritten.as_bytes())
        .context("could not append to inventory")?;
    Ok(())
}

/// Resolve a node's directives against the host rule table into one
/// space-separated argument string
///
/// A directive naming the node itself as master loses that argument with a
/// warning; a node cannot replicate from itself.
fn resolve_host_args(catalog: &Catalog, node_name: &str, raws: &[String]) -> Result<String> {
    let mut tokens = Vec::new();
    for raw in raws {
        let mut directive = Directive::parse(catalog, raw);
        if directive.args.get("master").is_some_and(|m| m == node_name) {
            log::warn!("a master can't lead itself: {node_name}: {raw}");
            directive.args.remove("master");
        }
        let resolved =
            catalog.resolve(RuleTable::Host, &directive.cmd, &directive.rule_args())?;
        log::info!("{resolved}");
        if !resolved.is_empty() {
            tokens.push(resolved);
        }
    }
    Ok(tokens.join(" "))
}

fn inventory_line(hostname: &str, ip: &str, args: &str) -> String {
    format!(
        "{hostname} ansible_connection=ssh ansible_user=root \
         ansible_ssh_private_key_file=secret/id_rsa ansible_host={ip} \
         ansible_python_interpreter=/usr/bin/python3 \
         ansible_ssh_common_args='-o StrictHostKeyChecking=no ' {args}\n"
    )
}
