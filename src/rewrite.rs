//! Node reference rewriting for inventory lines
//!
//! Resolved argument strings reference peer nodes by name (`master='node0'`,
//! shard lists embedding `node2`, endpoint URLs). Before a line is written to
//! the inventory those references must become live network addresses. The
//! rewrite runs whole-line regex passes in a fixed order; pass 1 repeats to a
//! fixed point because expanding one compound field can expose another match.
//!
//! Address lookups happen lazily at rewrite time so earlier nodes are already
//! running and resolvable. An unresolvable reference is logged and replaced
//! with an empty string; inventory generation never aborts on one bad
//! reference.

use anyhow::Result;
use lazy_static::lazy_static;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use regex::{Captures, Regex};

/// Password provisioned for the monitoring server's admin account
pub const ADMIN_PASSWORD: &str = "verysecretpassword1^";

/// Credentials provisioned for the object-storage endpoint
pub const MINIO_USER: &str = "UIdgE4sXPBTcBB4eEawU";
pub const MINIO_PASS: &str = "0Ss3B0VuG+mKQkpyLLKVMg8RrwwaUn3k";

/// Resolves node names to live addresses and container host names
pub trait AddressLookup {
    /// Network address of a running node, queried from the backend
    fn node_ip(&self, node: &str) -> Result<String>;

    /// Container host name of a node (reachable inside the namespace network)
    fn node_hostname(&self, node: &str) -> String;
}

lazy_static! {
    // Multi-value fields embedding a node name inside a larger quoted value
    static ref COMPOUND_RE: Regex = Regex::new(
        r"(extra_mongos_shard|extra_mongos_cfg|extra_haproxy_pg|extra_patroni_standby)='([^']*)(node[0-9]+)([^']*)'"
    ).unwrap();
    static ref PMM_RE: Regex = Regex::new(r"(extra_pmm_url)='(node[0-9]+)'").unwrap();
    static ref S3_RE: Regex =
        Regex::new(r"(extra_minio_url|extra_pbm_s3_url)='(node[0-9]+)(/[^']*)?'").unwrap();
    static ref NODE_REF_RE: Regex = Regex::new(r"='(node[0-9]+)'").unwrap();
}

/// Rewrite every node-name placeholder in `line` to its resolved address
///
/// Idempotent: applying it to its own output changes nothing.
pub fn rewrite_node_refs(line: &str, lookup: &dyn AddressLookup) -> String {
    let mut content = line.to_string();

    // Pass 1: compound list fields, repeated until nothing changes
    loop {
        let next = COMPOUND_RE
            .replace_all(&content, |caps: &Captures<'_>| {
                let ip = ip_or_empty(lookup, &caps[3]);
                format!("{}='{}{}{}'", &caps[1], &caps[2], ip, &caps[4])
            })
            .into_owned();
        if next == content {
            break;
        }
        content = next;
    }

    // Pass 2: monitoring endpoint gains scheme and credentials
    let content = PMM_RE
        .replace_all(&content, |caps: &Captures<'_>| {
            let ip = ip_or_empty(lookup, &caps[2]);
            format!(
                "{}='https://admin:{}@{}'",
                &caps[1],
                query_escape(ADMIN_PASSWORD),
                ip
            )
        })
        .into_owned();

    // Pass 3: object-storage endpoints are reached through the container
    // host name, not the resolved address
    let content = S3_RE
        .replace_all(&content, |caps: &Captures<'_>| {
            let bucket = caps.get(3).map_or("", |m| m.as_str());
            format!(
                "{}='https://{}:{}@{}:9000{}'",
                &caps[1],
                query_escape(MINIO_USER),
                query_escape(MINIO_PASS),
                lookup.node_hostname(&caps[2]),
                bucket
            )
        })
        .into_owned();

    // Pass 4: generic fallback for any remaining bare reference
    NODE_REF_RE
        .replace_all(&content, |caps: &Captures<'_>| {
            format!("='{}'", ip_or_empty(lookup, &caps[1]))
        })
        .into_owned()
}

fn ip_or_empty(lookup: &dyn AddressLookup, node: &str) -> String {
    match lookup.node_ip(node) {
        Ok(ip) => ip,
        Err(e) => {
            log::error!("can't resolve address for {node}: {e}");
            String::new()
        }
    }
}

fn query_escape(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}
