//! Re-create the version rule database
//!
//! Rule rows are published as a SQL dump by an external updater; this
//! command replaces the local database with a fresh schema and, when a dump
//! is given, loads it.

use anyhow::{Context as _, Result};
use ruledb::Catalog;

use crate::paths;
use crate::ui;

pub fn run(file: Option<&str>) -> Result<()> {
    let db_path = paths::database_path()?;
    if db_path.exists() {
        std::fs::remove_file(&db_path)
            .with_context(|| format!("could not remove {}", db_path.display()))?;
    }

    let catalog = Catalog::open(&db_path)?;
    if let Some(file) = file {
        let dump = std::fs::read_to_string(paths::expand(file))
            .with_context(|| format!("could not read dump {file}"))?;
        catalog.import_sql(&dump).context("could not load dump")?;
        ui::success(&format!("loaded rule dump from {file}"));
    } else {
        ui::info("created an empty rule database; load a published dump to populate it");
    }

    match catalog.schema_version("dbstand")? {
        Some(version) => ui::kv("catalog version", &version),
        None => ui::kv("catalog version", "not recorded"),
    }
    Ok(())
}
