//! Kubernetes operator deployments
//!
//! Operator directives resolve to argument strings for the operator helper
//! tool, which runs inside a helper container on the namespace network with
//! the cluster's kubeconfig pointed at the k3d server container.

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;

use crate::backend::{container_name, docker};
use crate::paths;
use crate::ui;

lazy_static! {
    static ref FATAL_LINE: Regex = Regex::new(r"^fatal:.*$").unwrap();
}

/// Run the operator helper tool for one node
///
/// Returns `Ok(false)` when the tool itself reported failure; fatal lines
/// are printed before returning. Empty argument strings are a no-op.
pub fn run_operator_tool(namespace: &str, node: &str, operator_args: &str) -> Result<bool> {
    if operator_args.trim().is_empty() {
        return Ok(true);
    }

    let cluster_name = container_name(namespace, node);
    // The kubeconfig k3d writes points at a host-published port; inside the
    // namespace network the API server is the server container on 6443
    let mut fix_kube_config = String::new();
    if let Ok(cluster_ip) = docker::container_ip(namespace, &format!("k3d-{cluster_name}-server-0"))
        && !cluster_ip.is_empty()
    {
        fix_kube_config = format!(
            "sed -i -re 's/0.0.0.0:[0-9]+/{cluster_ip}:6443/g' /root/.kube/config ;\
             kubectl config use-context k3d-{cluster_name};"
        );
    }

    let home = dirs::home_dir().unwrap_or_else(|| "/root".into());
    let volumes = vec![
        "-v".to_string(),
        format!("{}:/vagrant/secret:Z", paths::secret_dir()?.display()),
        "-v".to_string(),
        format!("{}:/vagrant/secret/.kube:Z", home.join(".kube").display()),
        "-v".to_string(),
        format!("{}:/vagrant/data:Z", paths::data_dir()?.display()),
    ];

    let arch = std::env::consts::ARCH;
    let script = format!(
        "cd /vagrant;\
         mkdir -p /root/.kube ; cp /vagrant/secret/.kube/config /root/.kube/config; \
         test -f /usr/local/bin/kubectl || \
           (curl -LO https://dl.k8s.io/release/$(curl -L -s https://dl.k8s.io/release/stable.txt)/bin/linux/{arch}/kubectl ; \
            chmod +x kubectl ; mv kubectl /usr/local/bin/kubectl); \
         mkdir -p /vagrant/data/k8s; \
         git config --global --add safe.directory '*'; \
         {fix_kube_config}\
         python3 tools/run_k8s_operator.py {operator_args}"
    );

    match docker::run_in_helper_container(namespace, &script, &volumes, false) {
        Ok(_) => Ok(true),
        Err(err) => {
            ui::error("operator deployment failed:");
            for line in err.to_string().lines().filter(|l| FATAL_LINE.is_match(l)) {
                eprintln!("{line}");
            }
            Ok(false)
        }
    }
}
