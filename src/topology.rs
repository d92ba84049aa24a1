//! Topology planning
//!
//! Scans the ordered deploy directive list, splits it into per-node
//! definitions at `node<N>` markers, and classifies each node's provisioning
//! backend. Cluster-backed nodes get their ephemeral Kubernetes cluster
//! created during the scan, through the injected [`ClusterProvisioner`],
//! because later directives on the same node assume the cluster exists.

use anyhow::Result;
use ruledb::Catalog;
use std::collections::BTreeMap;

use crate::keyword::Directive;

/// Default OS image tag for plain container nodes
pub const DEFAULT_OS: &str = "el8";

/// Command suffix that marks a Kubernetes operator deployment
const OPERATOR_SUFFIX: &str = "-operator";

/// How a node is provisioned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Plain container, configured through the inventory + playbook run
    Docker,
    /// Pre-built image used as-is, no inventory line
    DockerImage,
    /// Ephemeral Kubernetes cluster driven through the operator tool
    Kubectl,
}

/// Per-node provisioning plan
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub name: String,
    pub os: Option<String>,
    pub backend: Backend,
    pub privileged: bool,
    pub expose_port: Option<String>,
    pub memory: Option<String>,
    pub cpus: Option<String>,
    pub directives: Vec<String>,
}

impl NodeSpec {
    fn new(name: &str, defaults: &PlanDefaults) -> Self {
        let backend = match defaults.provider.as_str() {
            "docker-image" => Backend::DockerImage,
            "kubectl" => Backend::Kubectl,
            _ => Backend::Docker,
        };
        let os = if backend == Backend::Docker {
            Some(DEFAULT_OS.to_string())
        } else {
            None
        };
        Self {
            name: name.to_string(),
            os,
            backend,
            privileged: true,
            expose_port: None,
            memory: defaults.memory.clone(),
            cpus: defaults.cpus.clone(),
            directives: Vec::new(),
        }
    }
}

/// Node defaults taken from the command line
///
/// `provider` selects the initial backend for every node; directives can
/// still upgrade individual nodes during the scan.
#[derive(Debug, Clone, Default)]
pub struct PlanDefaults {
    pub provider: String,
    pub memory: Option<String>,
    pub cpus: Option<String>,
}

/// Creates ephemeral Kubernetes clusters during planning
pub trait ClusterProvisioner {
    fn create_cluster(&self, node: &str, args: &BTreeMap<String, String>) -> Result<()>;
}

/// The planned node set for one deployment
#[derive(Debug, Default)]
pub struct Topology {
    nodes: BTreeMap<String, NodeSpec>,
}

impl Topology {
    pub fn get(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.get(name)
    }

    /// Nodes in processing order: ascending numeric suffix
    ///
    /// Names that don't parse as `node<N>` are dropped rather than crashing
    /// the run.
    pub fn ordered(&self) -> Vec<&NodeSpec> {
        let mut indexed: Vec<(u32, &NodeSpec)> = self
            .nodes
            .values()
            .filter_map(|spec| node_index(&spec.name).map(|idx| (idx, spec)))
            .collect();
        indexed.sort_by_key(|(idx, _)| *idx);
        indexed.into_iter().map(|(_, spec)| spec).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Numeric suffix of a `node<N>` name
pub fn node_index(name: &str) -> Option<u32> {
    name.strip_prefix("node")?.parse().ok()
}

/// Plan the topology for one `deploy` invocation
///
/// Directives that are themselves node identifiers delimit nodes; the
/// implicit first node is `node0`. Classification can be upgraded by a later
/// directive on the same node (an operator command after plain-container
/// directives switches the whole node to the cluster backend).
pub fn plan(
    catalog: &Catalog,
    directives: &[String],
    defaults: &PlanDefaults,
    clusters: &dyn ClusterProvisioner,
) -> Result<Topology> {
    let mut topology = Topology::default();
    let mut current = "node0".to_string();
    topology
        .nodes
        .insert(current.clone(), NodeSpec::new(&current, defaults));

    for (i, raw) in directives.iter().enumerate() {
        if raw.starts_with("node") {
            if i == 0 {
                // Explicit first marker replaces the implicit node0
                topology.nodes.remove("node0");
            }
            current = raw.clone();
            topology
                .nodes
                .entry(current.clone())
                .or_insert_with(|| NodeSpec::new(&current, defaults));
            continue;
        }

        let directive = Directive::parse(catalog, raw);
        let node = topology
            .nodes
            .get_mut(&current)
            .expect("current node spec exists");
        node.directives.push(raw.clone());

        if directive.cmd == "os" {
            node.os = Some(raw.trim_start_matches("os:").to_string());
        } else if directive.args.contains_key("docker-image") {
            node.backend = Backend::DockerImage;
            node.os = None;
        } else if let Some(port) = directive.args.get("expose") {
            node.expose_port = Some(port.clone());
        } else if directive.cmd == "k3d" {
            node.backend = Backend::Kubectl;
            node.os = None;
            clusters.create_cluster(&current, &directive.args)?;
        } else if raw == "provider:kubectl" {
            node.backend = Backend::Kubectl;
            node.os = None;
        } else if node.backend != Backend::Kubectl && directive.cmd.ends_with(OPERATOR_SUFFIX) {
            node.backend = Backend::Kubectl;
            node.os = None;
            // Operator without an explicit cluster directive gets the
            // default cluster configuration
            let k3d_defaults = Directive::parse(catalog, "k3d");
            clusters.create_cluster(&current, &k3d_defaults.args)?;
        }
    }

    Ok(topology)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingClusters {
        calls: Mutex<Vec<(String, BTreeMap<String, String>)>>,
    }

    impl RecordingClusters {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, BTreeMap<String, String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ClusterProvisioner for RecordingClusters {
        fn create_cluster(&self, node: &str, args: &BTreeMap<String, String>) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((node.to_string(), args.clone()));
            Ok(())
        }
    }

    fn catalog() -> Catalog {
        Catalog::open_in_memory().unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn implicit_node0_with_defaults() {
        let clusters = RecordingClusters::new();
        let topo = plan(
            &catalog(),
            &strings(&["mysql:8.0"]),
            &PlanDefaults::default(),
            &clusters,
        )
        .unwrap();

        let node0 = topo.get("node0").unwrap();
        assert_eq!(node0.backend, Backend::Docker);
        assert_eq!(node0.os.as_deref(), Some(DEFAULT_OS));
        assert!(node0.privileged);
        assert_eq!(node0.directives, strings(&["mysql:8.0"]));
    }

    #[test]
    fn node_markers_delimit_definitions() {
        let clusters = RecordingClusters::new();
        let topo = plan(
            &catalog(),
            &strings(&["mysql:8.0", "node1", "mysql:8.0,master=node0"]),
            &PlanDefaults::default(),
            &clusters,
        )
        .unwrap();

        assert_eq!(topo.get("node0").unwrap().directives.len(), 1);
        assert_eq!(
            topo.get("node1").unwrap().directives,
            strings(&["mysql:8.0,master=node0"])
        );
    }

    #[test]
    fn leading_marker_replaces_implicit_node0() {
        let clusters = RecordingClusters::new();
        let topo = plan(
            &catalog(),
            &strings(&["node1", "mysql:8.0"]),
            &PlanDefaults::default(),
            &clusters,
        )
        .unwrap();

        assert!(topo.get("node0").is_none());
        assert!(topo.get("node1").is_some());
    }

    #[test]
    fn os_directive_overrides_tag_only() {
        let clusters = RecordingClusters::new();
        let topo = plan(
            &catalog(),
            &strings(&["os:el9", "mysql:8.0"]),
            &PlanDefaults::default(),
            &clusters,
        )
        .unwrap();

        let node0 = topo.get("node0").unwrap();
        assert_eq!(node0.os.as_deref(), Some("el9"));
        assert_eq!(node0.backend, Backend::Docker);
    }

    #[test]
    fn docker_image_switches_backend_and_clears_os() {
        let clusters = RecordingClusters::new();
        let topo = plan(
            &catalog(),
            &strings(&["mysql:8.0,docker-image"]),
            &PlanDefaults::default(),
            &clusters,
        )
        .unwrap();

        let node0 = topo.get("node0").unwrap();
        assert_eq!(node0.backend, Backend::DockerImage);
        assert_eq!(node0.os, None);
    }

    #[test]
    fn expose_records_port_without_backend_change() {
        let clusters = RecordingClusters::new();
        let topo = plan(
            &catalog(),
            &strings(&["pmm-server:expose=8443"]),
            &PlanDefaults::default(),
            &clusters,
        )
        .unwrap();

        let node0 = topo.get("node0").unwrap();
        assert_eq!(node0.expose_port.as_deref(), Some("8443"));
        assert_eq!(node0.backend, Backend::Docker);
    }

    #[test]
    fn k3d_creates_cluster_before_operator_runs() {
        let clusters = RecordingClusters::new();
        let topo = plan(
            &catalog(),
            &strings(&["k3d:v1.28.0", "percona-xtradb-operator"]),
            &PlanDefaults::default(),
            &clusters,
        )
        .unwrap();

        let node0 = topo.get("node0").unwrap();
        assert_eq!(node0.backend, Backend::Kubectl);
        assert_eq!(node0.os, None);

        // Exactly one cluster: the explicit k3d directive provisions it and
        // the operator directive must not provision a second one
        let calls = clusters.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "node0");
        assert_eq!(calls[0].1.get("version").unwrap(), "v1.28.0");
    }

    #[test]
    fn operator_alone_provisions_default_cluster() {
        let clusters = RecordingClusters::new();
        let topo = plan(
            &catalog(),
            &strings(&["percona-postgresql-operator:2.3.1"]),
            &PlanDefaults::default(),
            &clusters,
        )
        .unwrap();

        assert_eq!(topo.get("node0").unwrap().backend, Backend::Kubectl);
        assert_eq!(clusters.calls().len(), 1);
    }

    #[test]
    fn operator_after_plain_directives_upgrades_backend() {
        // Observed edge case: a later operator directive flips the whole
        // node to the cluster backend, discarding the plain-container OS tag.
        let clusters = RecordingClusters::new();
        let topo = plan(
            &catalog(),
            &strings(&["mysql:8.0", "percona-xtradb-operator"]),
            &PlanDefaults::default(),
            &clusters,
        )
        .unwrap();

        let node0 = topo.get("node0").unwrap();
        assert_eq!(node0.backend, Backend::Kubectl);
        assert_eq!(node0.os, None);
        assert_eq!(node0.directives.len(), 2);
        assert_eq!(clusters.calls().len(), 1);
    }

    #[test]
    fn provider_kubectl_directive_switches_without_cluster() {
        let clusters = RecordingClusters::new();
        let topo = plan(
            &catalog(),
            &strings(&["provider:kubectl"]),
            &PlanDefaults::default(),
            &clusters,
        )
        .unwrap();

        assert_eq!(topo.get("node0").unwrap().backend, Backend::Kubectl);
        assert!(clusters.calls().is_empty());
    }

    #[test]
    fn ordered_is_ascending_regardless_of_input_order() {
        let clusters = RecordingClusters::new();
        let topo = plan(
            &catalog(),
            &strings(&["node2", "mysql", "node1", "mysql", "node10", "mysql"]),
            &PlanDefaults::default(),
            &clusters,
        )
        .unwrap();

        let names: Vec<&str> = topo.ordered().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["node1", "node2", "node10"]);
    }

    #[test]
    fn malformed_node_names_are_dropped_from_order() {
        let clusters = RecordingClusters::new();
        let topo = plan(
            &catalog(),
            &strings(&["nodeX", "mysql", "node1", "mysql"]),
            &PlanDefaults::default(),
            &clusters,
        )
        .unwrap();

        let names: Vec<&str> = topo.ordered().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["node1"]);
    }

    #[test]
    fn provider_default_flips_every_node_to_image_backend() {
        let clusters = RecordingClusters::new();
        let defaults = PlanDefaults {
            provider: "docker-image".to_string(),
            ..PlanDefaults::default()
        };
        let topo = plan(
            &catalog(),
            &strings(&["mysql:8.0,docker-image", "node1", "pg:16,docker-image"]),
            &defaults,
            &clusters,
        )
        .unwrap();

        for node in topo.ordered() {
            assert_eq!(node.backend, Backend::DockerImage);
            assert_eq!(node.os, None);
        }
    }

    #[test]
    fn kubectl_provider_default_needs_no_cluster_directive() {
        let clusters = RecordingClusters::new();
        let defaults = PlanDefaults {
            provider: "kubectl".to_string(),
            ..PlanDefaults::default()
        };
        let topo = plan(&catalog(), &strings(&["mysql:8.0"]), &defaults, &clusters).unwrap();
        assert_eq!(topo.get("node0").unwrap().backend, Backend::Kubectl);
        // Pre-existing cluster assumed; the default provider never provisions
        assert!(clusters.calls().is_empty());
    }

    #[test]
    fn defaults_carry_memory_and_cpus() {
        let clusters = RecordingClusters::new();
        let defaults = PlanDefaults {
            memory: Some("2g".to_string()),
            cpus: Some("2".to_string()),
            ..PlanDefaults::default()
        };
        let topo = plan(&catalog(), &strings(&["mysql"]), &defaults, &clusters).unwrap();
        let node0 = topo.get("node0").unwrap();
        assert_eq!(node0.memory.as_deref(), Some("2g"));
        assert_eq!(node0.cpus.as_deref(), Some("2"));
    }
}
