//! Server configuration file.
//!
//! ```toml
//! [root]
//! password_hash = "$argon2id$..."
//!
//! [storage]
//! data_dir = "/var/lib/labtrack/main"
//!
//! [jwt]
//! secret = "..."
//! expire_secs = 86400
//!
//! [server]
//! listen = "0.0.0.0:8080"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Directory searched when `-c` names a context instead of a file.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/labtrack";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub root: RootConfig,
    pub storage: StorageConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub server: ListenConfig,
}

/// Bootstrap admin account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootConfig {
    /// argon2id PHC string.
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Events kept for change-feed subscribers.
    #[serde(default = "default_change_buffer")]
    pub change_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_expire_secs")]
    pub expire_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_change_buffer() -> usize {
    1024
}

fn default_expire_secs() -> u64 {
    86400
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

impl ServerConfig {
    /// A bare name resolves to `/etc/labtrack/<name>.toml`; anything that
    /// looks like a path is used as is.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            PathBuf::from(DEFAULT_CONFIG_DIR).join(format!("{}.toml", name_or_path))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
        let config: ServerConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_context_name() {
        assert_eq!(
            ServerConfig::resolve_path("main"),
            PathBuf::from("/etc/labtrack/main.toml")
        );
        assert_eq!(
            ServerConfig::resolve_path("./dev.toml"),
            PathBuf::from("./dev.toml")
        );
    }

    #[test]
    fn load_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev.toml");
        std::fs::write(
            &path,
            r#"
[root]
password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"

[storage]
data_dir = "/tmp/labtrack"

[jwt]
secret = "s3cret"
"#,
        )
        .unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.storage.data_dir, "/tmp/labtrack");
        assert_eq!(config.storage.change_buffer, 1024);
        assert_eq!(config.jwt.expire_secs, 86400);
        assert_eq!(config.server.listen, "0.0.0.0:8080");
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ServerConfig::load(&dir.path().join("absent.toml")).is_err());
    }
}
