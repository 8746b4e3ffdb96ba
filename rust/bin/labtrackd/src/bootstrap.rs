//! Startup checks and the bootstrap admin account.
//!
//! `root` has no profile row: its password hash lives in the server config
//! and a successful login yields an `admin` token with subject `root`.

use crate::config::ServerConfig;

/// Subject and login name of the bootstrap admin.
pub const ROOT_USER: &str = "root";

/// Refuse to start on a config that cannot authenticate anyone.
pub fn verify_config(config: &ServerConfig) -> anyhow::Result<()> {
    if config.root.password_hash.is_empty() {
        anyhow::bail!(
            "No root password hash found in configuration.\n\
             Run `labtrack context create <name>` to set up the server first."
        );
    }
    if config.jwt.secret.is_empty() {
        anyhow::bail!("JWT secret is empty in configuration.");
    }
    if config.storage.data_dir.is_empty() {
        anyhow::bail!("Storage data_dir is empty in configuration.");
    }
    Ok(())
}

/// Verify a root login attempt against the stored argon2id hash.
pub fn verify_root_password(password: &str, hash: &str) -> bool {
    lab::service::profile::verify_password(password, hash)
}
