//! Centralized path resolution
//!
//! Everything dbstand writes lives under two roots: the config directory
//! (rule database, inventory files, ssh keys) and the cache directory
//! (persistent volume data handed to containers).
//!
//! # Environment Variables
//!
//! - `DBSTAND_CONFIG_DIR` - Override config directory
//! - `DBSTAND_CACHE_DIR` - Override cache directory
//!
//! # Path Resolution Priority
//!
//! 1. The environment variable override
//! 2. `XDG_CONFIG_HOME/dbstand` (or `XDG_CACHE_HOME/dbstand`)
//! 3. Platform default: `~/.config/dbstand` / `~/.cache/dbstand`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "DBSTAND_CONFIG_DIR";

/// Environment variable for cache directory override
pub const ENV_CACHE_DIR: &str = "DBSTAND_CACHE_DIR";

/// Get the dbstand config directory path, creating it if missing
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!("using config dir from {}: {}", ENV_CONFIG_DIR, path.display());
        return ensure_dir(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("dbstand");
        log::debug!("using XDG_CONFIG_HOME: {}", path.display());
        return ensure_dir(path);
    }

    let home = dirs::home_dir().context("could not determine home directory")?;
    ensure_dir(home.join(".config").join("dbstand"))
}

/// Get the dbstand cache directory path, creating it if missing
pub fn cache_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CACHE_DIR) {
        let path = expand(&dir);
        log::debug!("using cache dir from {}: {}", ENV_CACHE_DIR, path.display());
        return ensure_dir(path);
    }

    if let Ok(xdg_cache) = std::env::var("XDG_CACHE_HOME") {
        let path = PathBuf::from(xdg_cache).join("dbstand");
        log::debug!("using XDG_CACHE_HOME: {}", path.display());
        return ensure_dir(path);
    }

    let home = dirs::home_dir().context("could not determine home directory")?;
    ensure_dir(home.join(".cache").join("dbstand"))
}

/// Path of the rule database
pub fn database_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("versions.db"))
}

/// Directory holding generated credentials (ssh key pair, cluster key files)
pub fn secret_dir() -> Result<PathBuf> {
    ensure_dir(config_dir()?.join("secret"))
}

/// Private ssh key distributed to every provisioned container
pub fn ssh_key_path() -> Result<PathBuf> {
    Ok(secret_dir()?.join("id_rsa"))
}

/// Inventory file for a namespace
///
/// The default namespace uses the bare file name; named namespaces get a
/// dotted suffix so they can coexist.
pub fn inventory_file(namespace: &str) -> Result<PathBuf> {
    Ok(config_dir()?.join(inventory_file_name(namespace)))
}

pub fn inventory_file_name(namespace: &str) -> String {
    if namespace.is_empty() {
        "ansible_hosts_run".to_string()
    } else {
        format!("ansible_hosts_run.{namespace}")
    }
}

/// Host directory bind-mounted into containers for persistent data
pub fn data_dir() -> Result<PathBuf> {
    ensure_dir(cache_dir()?.join("data"))
}

/// Host directory backing the in-cluster NFS share
pub fn nfs_data_dir() -> Result<PathBuf> {
    ensure_dir(data_dir()?.join("nfs"))
}

/// Registry mirror configuration handed to k3d when image caching is on
pub fn registry_mirror_file() -> Result<PathBuf> {
    Ok(cache_dir()?.join("registry-mirror.yaml"))
}

/// Expand ~ and environment variables in a path string
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf> {
    std::fs::create_dir_all(&path)
        .with_context(|| format!("could not create directory: {}", path.display()))?;
    Ok(path)
}

// ============================================================================
// Tests
// ============================================================================

/// Run `f` with an environment variable temporarily set
///
/// Shared by every test module that redirects the config or cache root; one
/// process-wide lock keeps those tests from mutating the environment
/// concurrently.
///
/// # Safety
/// Uses unsafe env::set_var/remove_var behind the lock.
#[cfg(test)]
pub(crate) fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
where
    F: FnOnce() -> R,
{
    use std::sync::Mutex;
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let original = std::env::var(key).ok();
    // SAFETY: Tests that read these variables hold ENV_LOCK
    unsafe { std::env::set_var(key, value) };
    let result = f();
    match original {
        // SAFETY: Restoration happens under the same lock
        Some(v) => unsafe { std::env::set_var(key, v) },
        None => unsafe { std::env::remove_var(key) },
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_dir_env_override() {
        let tmp = tempfile::TempDir::new().unwrap();
        let want = tmp.path().join("conf");
        with_env_var(ENV_CONFIG_DIR, want.to_str().unwrap(), || {
            let result = config_dir().unwrap();
            assert_eq!(result, want);
            assert!(result.is_dir());
        });
    }

    #[test]
    fn cache_dir_env_override() {
        let tmp = tempfile::TempDir::new().unwrap();
        let want = tmp.path().join("cache");
        with_env_var(ENV_CACHE_DIR, want.to_str().unwrap(), || {
            assert_eq!(cache_dir().unwrap(), want);
        });
    }

    #[test]
    fn database_lives_in_config_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        with_env_var(ENV_CONFIG_DIR, tmp.path().to_str().unwrap(), || {
            assert_eq!(database_path().unwrap(), tmp.path().join("versions.db"));
        });
    }

    #[test]
    fn inventory_name_per_namespace() {
        assert_eq!(inventory_file_name(""), "ansible_hosts_run");
        assert_eq!(inventory_file_name("t1"), "ansible_hosts_run.t1");
    }

    #[test]
    fn expand_with_tilde() {
        let result = expand("~/test/path");
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join("test").join("path"));
    }

    #[test]
    fn expand_absolute() {
        assert_eq!(expand("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn expand_with_env_var() {
        with_env_var("DBSTAND_TEST_VAR", "test_value", || {
            let result = expand("/path/$DBSTAND_TEST_VAR/file");
            assert_eq!(result, PathBuf::from("/path/test_value/file"));
        });
    }
}
