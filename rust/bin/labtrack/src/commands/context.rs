//! Context management commands.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::{ClientConfig, Context, Theme};

/// Hash a password with argon2id for the server config.
pub fn hash_root_password(password: &str) -> Result<String> {
    use argon2::Argon2;
    use password_hash::rand_core::OsRng;
    use password_hash::{PasswordHasher, SaltString};

    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {}", e))?
        .to_string())
}

/// Server config TOML for a new deployment.
pub fn server_config_toml(password_hash: &str, data_dir: &str, jwt_secret: &str, listen: &str) -> String {
    format!(
        r#"[root]
password_hash = "{password_hash}"

[storage]
data_dir = "{data_dir}"

[jwt]
secret = "{jwt_secret}"
expire_secs = 86400

[server]
listen = "{listen}"
"#
    )
}

/// Create a new context: generate server config + register in client config.
pub fn create(
    name: &str,
    config_dir: &str,
    data_dir: &str,
    listen: &str,
    password: &str,
    client_config_path: &Path,
) -> Result<()> {
    let password_hash = hash_root_password(password)?;

    let jwt_secret: String = {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        (0..32).map(|_| format!("{:02x}", rng.gen::<u8>())).collect()
    };

    let server_config = server_config_toml(&password_hash, data_dir, &jwt_secret, listen);

    let config_path = PathBuf::from(config_dir).join(format!("{}.toml", name));
    std::fs::create_dir_all(config_dir)?;
    std::fs::write(&config_path, &server_config)?;
    std::fs::create_dir_all(data_dir)?;

    let port = listen.rsplit(':').next().unwrap_or("8080");
    let mut client_config = ClientConfig::load(client_config_path)?;
    client_config.upsert_context(Context {
        name: name.to_string(),
        config_path: config_path.to_string_lossy().to_string(),
        server: format!("http://localhost:{}", port),
        token: String::new(),
    });
    if client_config.current_context.is_empty() {
        client_config.current_context = name.to_string();
    }
    client_config.save(client_config_path)?;

    println!("Context \"{}\" created.", name);
    println!("  Config: {}", config_path.display());
    println!("  Data:   {}", data_dir);
    println!("Start the server with: labtrackd -c {}", config_path.display());

    Ok(())
}

pub fn list(client_config_path: &Path) -> Result<()> {
    let config = ClientConfig::load(client_config_path)?;

    if config.contexts.is_empty() {
        println!("No contexts configured.");
        println!("Run: labtrack context create <name>");
        return Ok(());
    }

    println!("{:2} {:20} {:40} {:6}", "", "NAME", "SERVER", "LOGIN");
    for ctx in &config.contexts {
        let marker = if ctx.name == config.current_context { "*" } else { " " };
        let server = if ctx.server.is_empty() { "-" } else { &ctx.server };
        let login = if ctx.token.is_empty() { "no" } else { "yes" };
        println!("{:2} {:20} {:40} {:6}", marker, ctx.name, server, login);
    }

    Ok(())
}

pub fn use_context(name: &str, client_config_path: &Path) -> Result<()> {
    let mut config = ClientConfig::load(client_config_path)?;

    if !config.contexts.iter().any(|c| c.name == name) {
        anyhow::bail!(
            "Context \"{}\" not found. Run `labtrack context list` to see available contexts.",
            name
        );
    }

    config.current_context = name.to_string();
    config.save(client_config_path)?;
    println!("Switched to context \"{}\".", name);
    Ok(())
}

/// Set properties on a context, creating it when missing.
pub fn set(name: &str, server: Option<&str>, client_config_path: &Path) -> Result<()> {
    let mut config = ClientConfig::load(client_config_path)?;

    if config.get_mut(name).is_none() {
        config.upsert_context(Context {
            name: name.to_string(),
            config_path: String::new(),
            server: String::new(),
            token: String::new(),
        });
        if config.current_context.is_empty() {
            config.current_context = name.to_string();
        }
    }
    let ctx = config
        .get_mut(name)
        .ok_or_else(|| anyhow::anyhow!("Context \"{}\" not found.", name))?;
    if let Some(s) = server {
        ctx.server = s.to_string();
    }

    config.save(client_config_path)?;
    println!("Context \"{}\" updated.", name);
    Ok(())
}

/// Delete a context (doesn't delete the server config file).
pub fn delete(name: &str, client_config_path: &Path) -> Result<()> {
    let mut config = ClientConfig::load(client_config_path)?;

    if !config.remove_context(name) {
        anyhow::bail!("Context \"{}\" not found.", name);
    }

    config.save(client_config_path)?;
    println!("Context \"{}\" deleted.", name);
    Ok(())
}

/// Show or persist the table theme.
pub fn theme(value: Option<&str>, client_config_path: &Path) -> Result<()> {
    let mut config = ClientConfig::load(client_config_path)?;
    match value {
        None => println!("{}", config.theme.as_str()),
        Some(v) => {
            config.theme = Theme::parse(v)?;
            config.save(client_config_path)?;
            println!("Theme set to {}.", config.theme.as_str());
        }
    }
    Ok(())
}
