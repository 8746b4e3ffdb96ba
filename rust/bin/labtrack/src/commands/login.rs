//! Login / logout commands.

use anyhow::Result;

use super::client::error_message;
use crate::config::ClientConfig;

/// Login to the current context's server and store the token.
pub fn login(email: &str, password: &str, client_config_path: &std::path::Path) -> Result<()> {
    let mut config = ClientConfig::load(client_config_path)?;
    let ctx = config.require_current()?.clone();

    if ctx.server.is_empty() {
        anyhow::bail!(
            "No server URL set for context \"{}\". Run `labtrack context set {} --server <url>`.",
            ctx.name,
            ctx.name
        );
    }

    let url = format!("{}/auth/login", ctx.server.trim_end_matches('/'));
    let body = serde_json::json!({
        "email": email,
        "password": password,
    });

    let resp = reqwest::blocking::Client::new()
        .post(&url)
        .json(&body)
        .send()
        .map_err(|e| anyhow::anyhow!("failed to connect to server: {}", e))?;

    let status = resp.status();
    let data: serde_json::Value = resp.json().unwrap_or_default();
    if !status.is_success() {
        anyhow::bail!("Login failed. {}", error_message(status.as_u16(), &data));
    }

    let token = data["access_token"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("No access_token in response"))?;

    let ctx_mut = config
        .get_mut(&ctx.name)
        .ok_or_else(|| anyhow::anyhow!("Context disappeared"))?;
    ctx_mut.token = token.to_string();
    config.save(client_config_path)?;

    println!(
        "Logged in as {} ({}).",
        email,
        data["role"].as_str().unwrap_or("unknown role")
    );
    println!("Token saved to context \"{}\".", ctx.name);
    Ok(())
}

/// Logout: clear token from current context.
pub fn logout(client_config_path: &std::path::Path) -> Result<()> {
    let mut config = ClientConfig::load(client_config_path)?;

    let current_name = config.current_context.clone();
    if current_name.is_empty() {
        anyhow::bail!("No current context.");
    }

    let ctx = config
        .get_mut(&current_name)
        .ok_or_else(|| anyhow::anyhow!("Current context not found."))?;

    ctx.token = String::new();
    config.save(client_config_path)?;
    println!("Logged out from context \"{}\".", current_name);
    Ok(())
}
