//! Root password management for local deployments.

use std::path::Path;

use anyhow::Result;

use super::context::hash_root_password;
use crate::config::ClientConfig;

/// Change the root password in the server config of the current (or
/// named) context. The server picks it up on restart.
pub fn chpwd(
    context_name: Option<&str>,
    old_password: &str,
    new_password: &str,
    client_config_path: &Path,
) -> Result<()> {
    let config = ClientConfig::load(client_config_path)?;

    let target = context_name.unwrap_or(&config.current_context);
    if target.is_empty() {
        anyhow::bail!("No context specified and no current context set.");
    }

    let ctx = config
        .contexts
        .iter()
        .find(|c| c.name == target)
        .ok_or_else(|| anyhow::anyhow!("Context \"{}\" not found.", target))?;

    if ctx.config_path.is_empty() {
        anyhow::bail!(
            "Context \"{}\" has no local config_path set. Cannot change root password for remote servers.",
            target
        );
    }

    replace_root_hash(Path::new(&ctx.config_path), old_password, new_password)?;

    println!("Root password updated for context \"{}\".", target);
    println!("NOTE: Restart labtrackd for the change to take effect.");
    Ok(())
}

/// Verify `old_password` against the file's `[root] password_hash` and
/// write a fresh hash of `new_password`.
fn replace_root_hash(config_path: &Path, old_password: &str, new_password: &str) -> Result<()> {
    let server_toml = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", config_path.display(), e))?;
    let mut server_config: toml::Value = toml::from_str(&server_toml)?;

    let current_hash = server_config
        .get("root")
        .and_then(|r| r.get("password_hash"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("No root.password_hash in server config"))?;

    {
        use argon2::Argon2;
        use password_hash::{PasswordHash, PasswordVerifier};
        let parsed = PasswordHash::new(current_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash in config: {}", e))?;
        if Argon2::default()
            .verify_password(old_password.as_bytes(), &parsed)
            .is_err()
        {
            anyhow::bail!("Current root password is incorrect.");
        }
    }

    let new_hash = hash_root_password(new_password)?;
    if let Some(table) = server_config.get_mut("root").and_then(|r| r.as_table_mut()) {
        table.insert("password_hash".to_string(), toml::Value::String(new_hash));
    }

    std::fs::write(config_path, toml::to_string_pretty(&server_config)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::context::server_config_toml;

    #[test]
    fn replaces_hash_only_with_correct_password() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev.toml");
        let hash = hash_root_password("old-password").unwrap();
        std::fs::write(&path, server_config_toml(&hash, "/tmp/lt", "abcd", "0.0.0.0:8080")).unwrap();

        assert!(replace_root_hash(&path, "wrong-password", "new-password").is_err());
        replace_root_hash(&path, "old-password", "new-password").unwrap();

        let value: toml::Value = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let new_hash = value["root"]["password_hash"].as_str().unwrap();
        assert_ne!(new_hash, hash);
        assert_eq!(value["storage"]["data_dir"].as_str(), Some("/tmp/lt"));
        assert!(replace_root_hash(&path, "new-password", "third-password").is_ok());
    }
}
