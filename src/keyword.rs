//! Deploy directive parsing
//!
//! One directive is a single token of the form
//! `cmd[:subarg[=val][,subarg[=val]...]]`, e.g.
//! `percona-server-mongodb:version=5.0,master=node1`. Parsing is total:
//! malformed input degrades to a verbatim command with default arguments,
//! it never fails.

use ruledb::Catalog;
use std::collections::BTreeMap;

/// Commands whose entire remainder after `:` is the version, verbatim.
///
/// These carry node lists rather than a sub-argument grammar.
pub const VERBATIM_VERSION_COMMANDS: [&str; 3] = ["mongos-shard", "mongos-cfg", "haproxy-pg"];

/// A parsed deploy directive: canonical command plus sub-argument map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub cmd: String,
    pub args: BTreeMap<String, String>,
}

impl Directive {
    /// Parse one raw deploy keyword, resolving command and sub-argument
    /// aliases through the catalog.
    ///
    /// Alias lookups that fail (catalog unreadable) leave the word as-is;
    /// resolution strictness belongs to the rule resolver, not the parser.
    pub fn parse(catalog: &Catalog, keyword: &str) -> Self {
        let (raw_cmd, rest) = match keyword.split_once(':') {
            Some((cmd, rest)) => (cmd, rest),
            None => (keyword, ""),
        };

        let cmd = catalog
            .keyword_alias(raw_cmd)
            .unwrap_or_else(|_| raw_cmd.to_string());

        let mut args = BTreeMap::new();

        if VERBATIM_VERSION_COMMANDS.contains(&cmd.as_str()) {
            args.insert("version".to_string(), rest.to_string());
            return Self { cmd, args };
        }

        for (i, pair) in rest.split(',').enumerate() {
            if i == 0 {
                let version = if is_version_token(pair) { pair } else { "latest" };
                args.insert("version".to_string(), version.to_string());
            }

            let (raw_key, value) = match pair.split_once('=') {
                Some((key, value)) => (key, Some(value)),
                None => (pair, None),
            };

            let key = catalog
                .subcmd_alias(raw_key)
                .unwrap_or_else(|_| raw_key.to_string());

            // Last occurrence wins on duplicate keys within one directive
            args.insert(key, value.unwrap_or("").to_string());
        }

        Self { cmd, args }
    }

    /// Argument map as handed to the rule resolver: an implicit `latest`
    /// version is dropped so only explicit versions constrain rule rows.
    pub fn rule_args(&self) -> BTreeMap<String, String> {
        let mut args = self.args.clone();
        if args.get("version").is_some_and(|v| v == "latest") {
            args.remove("version");
        }
        args
    }
}

/// Whether a leading sub-argument token denotes a version
///
/// `node…` references, `main`/`vmain` branch builds, and anything starting
/// with a digit (after an optional leading `v`) qualify.
pub fn is_version_token(token: &str) -> bool {
    if token.starts_with("node") {
        return true;
    }
    let token = token.strip_prefix('v').unwrap_or(token);
    if token.starts_with("main") {
        return true;
    }
    token.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Parse an option string like `node0=el8,node1=el9` into a map
///
/// Pieces without exactly one `=` are skipped.
pub fn parse_option_map(input: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for pair in input.split(',') {
        let parts: Vec<&str> = pair.split('=').collect();
        if parts.len() == 2 {
            map.insert(parts[0].to_string(), parts[1].to_string());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruledb::Catalog;

    fn catalog() -> Catalog {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog
            .import_sql(
                "INSERT INTO keyword_aliases VALUES
                    ('percona-server', 'ps'),
                    ('percona-server-mongodb', 'psmdb');
                 INSERT INTO subcmd_aliases VALUES
                    ('master', 'leader');",
            )
            .unwrap();
        catalog
    }

    #[test]
    fn parses_command_with_key_values() {
        let d = Directive::parse(&catalog(), "mysql:version=8.0,master=node1");
        assert_eq!(d.cmd, "mysql");
        assert_eq!(d.args.get("version").unwrap(), "8.0");
        assert_eq!(d.args.get("master").unwrap(), "node1");
    }

    #[test]
    fn injects_latest_when_no_version_token() {
        let d = Directive::parse(&catalog(), "mysql:master=node1,gtid");
        assert_eq!(d.args.get("version").unwrap(), "latest");
        // Bare keys become boolean-style flags
        assert_eq!(d.args.get("gtid").unwrap(), "");
    }

    #[test]
    fn leading_version_token_variants() {
        for (raw, want) in [
            ("mysql:8.0", "8.0"),
            ("mysql:v8.0.36", "v8.0.36"),
            ("mysql:main", "main"),
            ("mysql:vmain", "vmain"),
            ("haproxy:node2", "node2"),
        ] {
            let d = Directive::parse(&catalog(), raw);
            assert_eq!(d.args.get("version").unwrap(), want, "for {raw}");
        }
    }

    #[test]
    fn resolves_command_and_subcmd_aliases() {
        let d = Directive::parse(&catalog(), "ps:leader=node0");
        assert_eq!(d.cmd, "percona-server");
        assert_eq!(d.args.get("master").unwrap(), "node0");
        // Canonical names pass through unchanged
        let d = Directive::parse(&catalog(), "percona-server:master=node0");
        assert_eq!(d.cmd, "percona-server");
        assert!(d.args.contains_key("master"));
    }

    #[test]
    fn verbatim_version_commands_skip_subargument_grammar() {
        let d = Directive::parse(&catalog(), "haproxy-pg:node1,node2,node3");
        assert_eq!(d.cmd, "haproxy-pg");
        assert_eq!(d.args.get("version").unwrap(), "node1,node2,node3");
        assert_eq!(d.args.len(), 1);

        let d = Directive::parse(&catalog(), "mongos-shard:rs0/node1,node2");
        assert_eq!(d.args.get("version").unwrap(), "rs0/node1,node2");
    }

    #[test]
    fn parser_is_total_on_garbage() {
        let d = Directive::parse(&catalog(), ":::,,==");
        assert_eq!(d.cmd, "");
        let d = Directive::parse(&catalog(), "mysql");
        assert_eq!(d.cmd, "mysql");
        assert_eq!(d.args.get("version").unwrap(), "latest");
    }

    #[test]
    fn duplicate_keys_last_wins() {
        let d = Directive::parse(&catalog(), "mysql:master=node1,master=node2");
        assert_eq!(d.args.get("master").unwrap(), "node2");
    }

    #[test]
    fn rule_args_drops_implicit_latest() {
        let d = Directive::parse(&catalog(), "mysql:master=node1");
        assert!(!d.rule_args().contains_key("version"));
        let d = Directive::parse(&catalog(), "mysql:8.0");
        assert_eq!(d.rule_args().get("version").unwrap(), "8.0");
    }

    #[test]
    fn parse_option_map_skips_malformed_pairs() {
        let map = parse_option_map("node0=el8,node1,node2=el9,x=y=z");
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("node0").unwrap(), "el8");
        assert_eq!(map.get("node2").unwrap(), "el9");
    }
}
