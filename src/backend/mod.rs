//! Provisioning backends
//!
//! Thin wrappers over the external tools dbstand drives: docker for
//! containers and networks, k3d for ephemeral Kubernetes clusters, the
//! ansible container for playbook runs, and the in-container operator tool.

pub mod ansible;
pub mod docker;
pub mod image;
pub mod k3d;
pub mod operator;

/// Namespace-qualified container (and host) name
///
/// The default namespace uses bare names so existing single-namespace
/// workflows keep their container names.
pub fn container_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}-{name}")
    }
}

/// Name of the namespace's docker network
pub fn network_name(namespace: &str) -> String {
    container_name(namespace, "dbstand")
}

/// Base image for a plain container node
pub fn os_image(os: &str) -> String {
    format!("dbstand/{os}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_namespace_uses_bare_names() {
        assert_eq!(container_name("", "node0"), "node0");
        assert_eq!(network_name(""), "dbstand");
    }

    #[test]
    fn named_namespace_prefixes() {
        assert_eq!(container_name("t1", "node0"), "t1-node0");
        assert_eq!(network_name("t1"), "t1-dbstand");
    }

    #[test]
    fn os_image_tag() {
        assert_eq!(os_image("el8"), "dbstand/el8");
    }
}
