//! # Ruledb
//!
//! Versioned deployment rule tables over SQLite.
//!
//! A [`Catalog`] maps `(command, sub-argument, version)` triples to resolved
//! command-line arguments for the provisioning backends. Two parallel rule
//! tables exist: one for traditional host provisioning and one for Kubernetes
//! operator provisioning. The catalog also carries keyword/sub-argument alias
//! tables and the deploy examples shown by the help surface.
//!
//! The catalog is read-only for the lifetime of one invocation; rows are
//! maintained by an external fetch-and-replace updater (see
//! [`Catalog::import_sql`]).
//!
//! ## Example
//!
//! ```no_run
//! use ruledb::{Catalog, RuleTable};
//! use std::collections::BTreeMap;
//! use std::path::Path;
//!
//! let catalog = Catalog::open(Path::new("/path/to/versions.db"))?;
//!
//! let mut args = BTreeMap::new();
//! args.insert("version".to_string(), "8.0".to_string());
//! let resolved = catalog.resolve(RuleTable::Host, "mysql", &args)?;
//! println!("{resolved}");
//! # Ok::<(), ruledb::Error>(())
//! ```

mod error;

pub use error::{Error, Result};

use rusqlite::{Connection, params};
use std::collections::BTreeMap;
use std::path::Path;

/// Which of the two parallel rule tables to resolve against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTable {
    /// Traditional host provisioning (`ansible_arguments`)
    Host,
    /// Kubernetes operator provisioning (`k8s_arguments`)
    Operator,
}

impl RuleTable {
    fn table_name(self) -> &'static str {
        match self {
            Self::Host => "ansible_arguments",
            Self::Operator => "k8s_arguments",
        }
    }
}

/// Which alias namespace to look a word up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AliasTable {
    Keyword,
    Subcmd,
}

impl AliasTable {
    fn table_name(self) -> &'static str {
        match self {
            Self::Keyword => "keyword_aliases",
            Self::Subcmd => "subcmd_aliases",
        }
    }
}

/// One deploy example from the help tables
#[derive(Debug, Clone)]
pub struct DeployExample {
    pub cmd: String,
    pub deploy: String,
}

/// The rule catalog database
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Open a catalog database at the given path
    ///
    /// Creates the database file and an empty schema if they don't exist;
    /// rows come from the external updater.
    pub fn open(db_path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory catalog (used by callers' tests and dry runs)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS ansible_arguments (
                cmd TEXT NOT NULL,
                subcmd TEXT NOT NULL DEFAULT '',
                arg TEXT NOT NULL,
                arg_default TEXT NOT NULL DEFAULT '',
                version_filter TEXT NOT NULL DEFAULT '%',
                always_add INTEGER NOT NULL DEFAULT 0,
                orderno INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS k8s_arguments (
                cmd TEXT NOT NULL,
                subcmd TEXT NOT NULL DEFAULT '',
                arg TEXT NOT NULL,
                arg_default TEXT NOT NULL DEFAULT '',
                version_filter TEXT NOT NULL DEFAULT '%',
                always_add INTEGER NOT NULL DEFAULT 0,
                orderno INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS keyword_aliases (
                keyword TEXT NOT NULL,
                alias TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS subcmd_aliases (
                keyword TEXT NOT NULL,
                alias TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS help_examples (
                cmd TEXT NOT NULL,
                deploy TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS general_version (
                program TEXT NOT NULL,
                version TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_ansible_cmd ON ansible_arguments(cmd);
            CREATE INDEX IF NOT EXISTS idx_k8s_cmd ON k8s_arguments(cmd);
            ",
        )?;
        Ok(())
    }

    /// Load a SQL dump (rule rows, aliases, examples) into the catalog
    ///
    /// The dump format is what the external updater publishes; this only
    /// executes it.
    pub fn import_sql(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Resolve a command's argument map to its final argument string
    ///
    /// A rule row fires when it is marked `always_add` or the caller supplied
    /// its sub-argument. It is eligible when the caller's value for that
    /// sub-argument (if any) or the top-level `version` value matches the
    /// row's `version_filter` LIKE-glob. The caller value wins over the row
    /// default when non-empty. Among firing rows with the same `arg`, the one
    /// with the highest `orderno` shadows the rest.
    ///
    /// An empty result is a valid resolution; only infrastructure failures
    /// are errors.
    pub fn resolve(
        &self,
        table: RuleTable,
        cmd: &str,
        args: &BTreeMap<String, String>,
    ) -> Result<String> {
        self.conn.execute_batch(
            "DROP TABLE IF EXISTS temp.provided_subcmd;
             CREATE TEMPORARY TABLE provided_subcmd(subcmd TEXT, val TEXT);",
        )?;

        {
            let mut insert = self
                .conn
                .prepare("INSERT INTO provided_subcmd(subcmd, val) VALUES (?1, ?2)")?;
            for (subcmd, val) in args {
                insert.execute(params![subcmd, val])?;
            }
        }

        // Bare columns under max(orderno) resolve to the max-orderno row,
        // which is what makes later rows shadow earlier ones per arg.
        let query = format!(
            "SELECT aa.arg || CASE COALESCE(NULLIF(ps.val,''), aa.arg_default)
                    WHEN '' THEN ''
                    ELSE '=''' || COALESCE(NULLIF(ps.val,''), aa.arg_default) || ''''
                    END AS arg_val
             FROM {} aa
             LEFT JOIN provided_subcmd ps ON aa.subcmd = ps.subcmd
             WHERE aa.cmd = ?1
               AND (aa.always_add OR aa.subcmd = ps.subcmd)
               AND ((ps.val IS NOT NULL AND ps.val LIKE aa.version_filter)
                    OR ?2 LIKE aa.version_filter)
             GROUP BY arg
             HAVING orderno = max(orderno)
             ORDER BY arg",
            table.table_name()
        );

        let version = args.get("version").map_or("", String::as_str);

        let mut stmt = self.conn.prepare(&query)?;
        let tokens = stmt
            .query_map(params![cmd, version], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tokens.join(" "))
    }

    /// Resolve a deploy keyword through the command alias table
    ///
    /// Returns the input unchanged when no alias row matches, so resolution
    /// is idempotent on already-canonical keywords.
    pub fn keyword_alias(&self, word: &str) -> Result<String> {
        self.alias_lookup(AliasTable::Keyword, word)
    }

    /// Resolve a sub-argument name through the sub-argument alias table
    pub fn subcmd_alias(&self, word: &str) -> Result<String> {
        self.alias_lookup(AliasTable::Subcmd, word)
    }

    fn alias_lookup(&self, table: AliasTable, word: &str) -> Result<String> {
        let query = format!(
            "SELECT keyword FROM {} WHERE alias = ?1 ORDER BY 1 LIMIT 1",
            table.table_name()
        );
        match self.conn.query_row(&query, [word], |row| row.get(0)) {
            Ok(keyword) => Ok(keyword),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(word.to_string()),
            Err(e) => Err(e.into()),
        }
    }

    /// All known deploy keywords, host table first, then operator-only ones
    pub fn keywords(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT cmd, 1 ord FROM ansible_arguments
             UNION
             SELECT DISTINCT cmd, 2 ord FROM k8s_arguments
             ORDER BY ord, cmd",
        )?;
        let keywords = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keywords)
    }

    /// Aliases registered for a keyword
    pub fn aliases_for(&self, keyword: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT alias FROM keyword_aliases WHERE keyword = ?1 ORDER BY 1")?;
        let aliases = stmt
            .query_map([keyword], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(aliases)
    }

    /// Sub-arguments accepted by a keyword, across both rule tables
    pub fn subcommands_for(&self, keyword: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT subcmd FROM ansible_arguments WHERE cmd = ?1
             UNION
             SELECT DISTINCT subcmd FROM k8s_arguments WHERE cmd = ?1",
        )?;
        let subcmds = stmt
            .query_map([keyword], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(subcmds)
    }

    /// Deploy examples, optionally filtered to one keyword
    pub fn deploy_examples(&self, keyword: Option<&str>) -> Result<Vec<DeployExample>> {
        let (query, params): (&str, Vec<&str>) = match keyword {
            Some(kw) => (
                "SELECT cmd, deploy FROM help_examples WHERE cmd = ?1 ORDER BY cmd, deploy",
                vec![kw],
            ),
            None => (
                "SELECT cmd, deploy FROM help_examples ORDER BY cmd, deploy",
                vec![],
            ),
        };
        let mut stmt = self.conn.prepare(query)?;
        let examples = stmt
            .query_map(rusqlite::params_from_iter(params), |row| {
                Ok(DeployExample {
                    cmd: row.get(0)?,
                    deploy: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(examples)
    }

    /// The catalog's published schema version for a program, if recorded
    pub fn schema_version(&self, program: &str) -> Result<Option<String>> {
        match self.conn.query_row(
            "SELECT version FROM general_version WHERE program = ?1
             ORDER BY version DESC LIMIT 1",
            [program],
            |row| row.get(0),
        ) {
            Ok(version) => Ok(Some(version)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn seeded() -> Catalog {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog
            .import_sql(
                "
                INSERT INTO ansible_arguments VALUES
                    ('mysql', 'version', 'extra_mysql_version', '8.0.36', '%', 1, 0),
                    ('mysql', 'master', 'extra_master_ip', '', '%', 0, 0),
                    ('mysql', 'sql-mode', 'extra_mysql_sql_mode', 'ANSI', '%', 0, 0),
                    ('mysql', 'rocksdb', 'extra_mysql_rocksdb', 'yes', '8%', 0, 0);

                INSERT INTO k8s_arguments VALUES
                    ('percona-xtradb-operator', 'version', '--version', '1.14.0', '%', 1, 0),
                    ('percona-xtradb-operator', '', '--operator=pxc', '', '%', 1, 0);

                INSERT INTO keyword_aliases VALUES
                    ('percona-server', 'ps'),
                    ('percona-server-mongodb', 'psmdb');

                INSERT INTO subcmd_aliases VALUES
                    ('master', 'leader'),
                    ('master', 'primary');
                ",
            )
            .unwrap();
        catalog
    }

    #[test]
    fn test_open_creates_db() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("versions.db");

        let catalog = Catalog::open(&db_path).unwrap();
        assert!(db_path.exists());
        assert!(catalog.keywords().unwrap().is_empty());
    }

    #[test]
    fn test_resolve_always_add_uses_default() {
        let catalog = seeded();
        let resolved = catalog.resolve(RuleTable::Host, "mysql", &args(&[])).unwrap();
        assert_eq!(resolved, "extra_mysql_version='8.0.36'");
    }

    #[test]
    fn test_resolve_caller_value_wins_over_default() {
        let catalog = seeded();
        let resolved = catalog
            .resolve(RuleTable::Host, "mysql", &args(&[("version", "5.7.44")]))
            .unwrap();
        assert_eq!(resolved, "extra_mysql_version='5.7.44'");
    }

    #[test]
    fn test_resolve_supplied_subcmd_fires_row() {
        let catalog = seeded();
        let resolved = catalog
            .resolve(
                RuleTable::Host,
                "mysql",
                &args(&[("version", "8.0"), ("master", "node0")]),
            )
            .unwrap();
        assert!(resolved.contains("extra_master_ip='node0'"));
        assert!(resolved.contains("extra_mysql_version='8.0'"));
    }

    #[test]
    fn test_resolve_flag_without_value_uses_default() {
        let catalog = seeded();
        // Boolean-style flag: key present with empty value
        let resolved = catalog
            .resolve(RuleTable::Host, "mysql", &args(&[("sql-mode", "")]))
            .unwrap();
        assert!(resolved.contains("extra_mysql_sql_mode='ANSI'"));
    }

    #[test]
    fn test_resolve_version_filter_excludes() {
        let catalog = seeded();
        let resolved = catalog
            .resolve(
                RuleTable::Host,
                "mysql",
                &args(&[("version", "5.7.44"), ("rocksdb", "")]),
            )
            .unwrap();
        assert!(!resolved.contains("rocksdb"));

        let resolved = catalog
            .resolve(
                RuleTable::Host,
                "mysql",
                &args(&[("version", "8.0.36"), ("rocksdb", "")]),
            )
            .unwrap();
        assert!(resolved.contains("extra_mysql_rocksdb='yes'"));
    }

    #[test]
    fn test_resolve_max_orderno_overrides() {
        let catalog = seeded();
        // Same (cmd, subcmd, arg) with a later orderno shadows the earlier
        // default regardless of insertion order.
        catalog
            .import_sql(
                "INSERT INTO ansible_arguments VALUES
                    ('mysql', 'version', 'extra_mysql_version', '8.4.0', '%', 1, 5);",
            )
            .unwrap();
        let resolved = catalog.resolve(RuleTable::Host, "mysql", &args(&[])).unwrap();
        assert_eq!(resolved, "extra_mysql_version='8.4.0'");
    }

    #[test]
    fn test_resolve_bare_arg_when_value_empty() {
        let catalog = seeded();
        let resolved = catalog
            .resolve(RuleTable::Operator, "percona-xtradb-operator", &args(&[]))
            .unwrap();
        // Row with empty default and no caller value renders the arg alone
        assert!(resolved.contains("--operator=pxc"));
        assert!(!resolved.contains("--operator=pxc="));
        assert!(resolved.contains("--version='1.14.0'"));
    }

    #[test]
    fn test_resolve_unknown_cmd_is_empty_not_error() {
        let catalog = seeded();
        let resolved = catalog
            .resolve(RuleTable::Host, "no-such-thing", &args(&[]))
            .unwrap();
        assert_eq!(resolved, "");
    }

    #[test]
    fn test_alias_resolution_and_idempotency() {
        let catalog = seeded();
        assert_eq!(catalog.keyword_alias("ps").unwrap(), "percona-server");
        // Already-canonical input passes through unchanged
        assert_eq!(
            catalog.keyword_alias("percona-server").unwrap(),
            "percona-server"
        );
        assert_eq!(catalog.subcmd_alias("leader").unwrap(), "master");
        assert_eq!(catalog.subcmd_alias("master").unwrap(), "master");
        // Unknown words pass through
        assert_eq!(catalog.keyword_alias("mariadb").unwrap(), "mariadb");
    }

    #[test]
    fn test_keywords_and_help_queries() {
        let catalog = seeded();
        let keywords = catalog.keywords().unwrap();
        assert_eq!(keywords, vec!["mysql", "percona-xtradb-operator"]);

        let aliases = catalog.aliases_for("percona-server").unwrap();
        assert_eq!(aliases, vec!["ps"]);

        let subcmds = catalog.subcommands_for("mysql").unwrap();
        assert!(subcmds.contains(&"master".to_string()));
        assert!(subcmds.contains(&"version".to_string()));
    }

    #[test]
    fn test_deploy_examples_filter() {
        let catalog = seeded();
        catalog
            .import_sql(
                "INSERT INTO help_examples VALUES
                    ('mysql', 'dbstand deploy mysql:8.0'),
                    ('mysql', 'dbstand deploy mysql node1 mysql:master=node0'),
                    ('pg', 'dbstand deploy pg:16');",
            )
            .unwrap();
        assert_eq!(catalog.deploy_examples(None).unwrap().len(), 3);
        let mysql_only = catalog.deploy_examples(Some("mysql")).unwrap();
        assert_eq!(mysql_only.len(), 2);
        assert!(mysql_only.iter().all(|e| e.cmd == "mysql"));
    }

    #[test]
    fn test_schema_version() {
        let catalog = seeded();
        assert_eq!(catalog.schema_version("dbstand").unwrap(), None);
        catalog
            .import_sql("INSERT INTO general_version VALUES ('dbstand', '0.1.0');")
            .unwrap();
        assert_eq!(
            catalog.schema_version("dbstand").unwrap(),
            Some("0.1.0".to_string())
        );
    }

    #[test]
    fn test_resolve_repeated_calls_reuse_connection() {
        let catalog = seeded();
        // The temp provided_subcmd table must not leak between calls.
        let first = catalog
            .resolve(RuleTable::Host, "mysql", &args(&[("master", "node0")]))
            .unwrap();
        let second = catalog.resolve(RuleTable::Host, "mysql", &args(&[])).unwrap();
        assert!(first.contains("extra_master_ip"));
        assert!(!second.contains("extra_master_ip"));
    }
}
