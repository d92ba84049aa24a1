//! Generated credentials shared with provisioned nodes
//!
//! The ssh key pair is created once and bind-mounted into every container so
//! the playbook can reach nodes over ssh. The mongodb key file is only
//! generated when a replica-set directive needs it.

use crate::paths;
use crate::runner::{self, COMMAND_TIMEOUT};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Create the ssh key pair if it does not exist yet
pub fn ensure_ssh_key() -> Result<PathBuf> {
    ssh_key_at(&paths::ssh_key_path()?)
}

fn ssh_key_at(key_path: &Path) -> Result<PathBuf> {
    if key_path.exists() {
        return Ok(key_path.to_path_buf());
    }

    log::info!("generating ssh key pair at {}", key_path.display());
    let argv = vec![
        "ssh-keygen".to_string(),
        "-t".to_string(),
        "rsa".to_string(),
        "-b".to_string(),
        "2048".to_string(),
        "-f".to_string(),
        key_path.display().to_string(),
        "-N".to_string(),
        String::new(),
        "-q".to_string(),
    ];
    runner::run_capture(&argv, COMMAND_TIMEOUT).context("ssh key generation failed")?;
    Ok(key_path.to_path_buf())
}

/// Create the shared mongodb cluster key file if it does not exist yet
pub fn ensure_mongo_keyfile() -> Result<PathBuf> {
    mongo_keyfile_at(&paths::secret_dir()?)
}

fn mongo_keyfile_at(secret_dir: &Path) -> Result<PathBuf> {
    let key_path = secret_dir.join("mongodb.key");
    if key_path.exists() {
        return Ok(key_path);
    }

    log::info!("generating mongodb key file at {}", key_path.display());
    let argv = vec![
        "openssl".to_string(),
        "rand".to_string(),
        "-base64".to_string(),
        "756".to_string(),
    ];
    let key = runner::run_capture(&argv, COMMAND_TIMEOUT).context("key generation failed")?;
    std::fs::write(&key_path, key)
        .with_context(|| format!("could not write {}", key_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(key_path)
}
