//! Generic resource CRUD commands.
//!
//! `labtrack get assets`, `labtrack create lab -f lab.json`, etc.
//! Translates resource names to REST API paths.

use anyhow::Result;
use serde_json::Value;

use super::client::Api;
use super::output::{render_table, Column};
use crate::config::{ClientConfig, Theme};

/// A resource the CLI knows how to address and tabulate.
#[derive(Debug, Clone, Copy)]
pub struct Resource {
    pub singular: &'static str,
    pub path: &'static str,
    pub columns: &'static [Column],
}

const PROFILES: Resource = Resource {
    singular: "profile",
    path: "/lab/profiles",
    columns: &[("ID", "id"), ("EMAIL", "email"), ("ROLE", "role"), ("LAB", "labId")],
};

const LABS: Resource = Resource {
    singular: "lab",
    path: "/lab/labs",
    columns: &[
        ("ID", "id"),
        ("CODE", "labIdentifier"),
        ("NAME", "name"),
        ("DEPARTMENT", "department"),
        ("INCHARGE", "inchargeId"),
    ],
};

const ASSETS: Resource = Resource {
    singular: "asset",
    path: "/lab/assets",
    columns: &[
        ("ID", "id"),
        ("ASSET", "assetId"),
        ("NAME", "name"),
        ("LAB", "allocatedLab"),
        ("QTY", "quantity"),
        ("TOTAL", "totalAmount"),
        ("STATUS", "status"),
        ("APPROVED", "approved"),
    ],
};

const TRANSFERS: Resource = Resource {
    singular: "transfer",
    path: "/lab/transfers",
    columns: &[
        ("ID", "id"),
        ("ASSET", "assetId"),
        ("FROM", "fromLab"),
        ("TO", "toLab"),
        ("STATUS", "status"),
    ],
};

const LAB_ISSUES: Resource = Resource {
    singular: "lab-issue",
    path: "/lab/lab-issues",
    columns: &[
        ("ID", "id"),
        ("TITLE", "title"),
        ("LAB", "labId"),
        ("PRIORITY", "priority"),
        ("STATUS", "status"),
    ],
};

const ASSET_ISSUES: Resource = Resource {
    singular: "asset-issue",
    path: "/lab/asset-issues",
    columns: &[
        ("ID", "id"),
        ("TITLE", "title"),
        ("ASSET", "assetId"),
        ("PRIORITY", "priority"),
        ("STATUS", "status"),
    ],
};

const ACTIVITY: Resource = Resource {
    singular: "activity",
    path: "/lab/activity",
    columns: &[
        ("TIME", "createdAt"),
        ("USER", "userEmail"),
        ("ACTION", "actionType"),
        ("ENTITY", "entityType"),
        ("SEVERITY", "severity"),
        ("OK", "success"),
    ],
};

pub const NOTIFICATIONS: Resource = Resource {
    singular: "notification",
    path: "/lab/notifications",
    columns: &[
        ("ID", "id"),
        ("KIND", "kind"),
        ("TITLE", "title"),
        ("READ", "read"),
        ("TIME", "createdAt"),
    ],
};

/// Map a singular/plural resource name to its API resource.
pub fn resource_path(resource: &str) -> Result<Resource> {
    match resource.to_lowercase().as_str() {
        "profile" | "profiles" | "user" | "users" => Ok(PROFILES),
        "lab" | "labs" => Ok(LABS),
        "asset" | "assets" => Ok(ASSETS),
        "transfer" | "transfers" => Ok(TRANSFERS),
        "lab-issue" | "lab-issues" | "labissue" | "labissues" => Ok(LAB_ISSUES),
        "asset-issue" | "asset-issues" | "assetissue" | "assetissues" => Ok(ASSET_ISSUES),
        "activity" | "activities" | "log" | "logs" => Ok(ACTIVITY),
        "notification" | "notifications" => Ok(NOTIFICATIONS),
        _ => Err(anyhow::anyhow!("Unknown resource type: {}", resource)),
    }
}

/// Turn `key=value` filter arguments plus paging into query pairs.
pub fn list_query(
    filters: &[String],
    search: Option<&str>,
    limit: Option<usize>,
    offset: Option<usize>,
) -> Result<Vec<(String, String)>> {
    let mut query = Vec::new();
    for f in filters {
        let (k, v) = f
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Filter \"{}\" must look like key=value.", f))?;
        query.push((k.trim().to_string(), v.trim().to_string()));
    }
    if let Some(q) = search {
        query.push(("q".to_string(), q.to_string()));
    }
    if let Some(l) = limit {
        query.push(("limit".to_string(), l.to_string()));
    }
    if let Some(o) = offset {
        query.push(("offset".to_string(), o.to_string()));
    }
    Ok(query)
}

/// Print a list response as JSON or as a themed table.
pub fn print_list(body: &Value, resource: &Resource, output_json: bool, theme: Theme) -> Result<()> {
    if output_json {
        println!("{}", serde_json::to_string_pretty(body)?);
        return Ok(());
    }
    let items = body["items"].as_array().cloned().unwrap_or_default();
    if items.is_empty() {
        println!("No {} found.", resource.singular);
        return Ok(());
    }
    println!("{}", render_table(&items, resource.columns, theme));
    println!("({} of {})", items.len(), body["total"].as_u64().unwrap_or(items.len() as u64));
    Ok(())
}

/// GET a resource (list or get by ID).
pub fn get(
    resource: &str,
    id: Option<&str>,
    output_json: bool,
    query: &[(String, String)],
    client_config_path: &std::path::Path,
) -> Result<()> {
    let config = ClientConfig::load(client_config_path)?;
    let ctx = config.require_current()?;
    let res = resource_path(resource)?;
    let api = Api::new(ctx)?;

    match id {
        Some(id) => {
            let body = api.get(&format!("{}/{}", res.path, id))?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        None => {
            let body = api.get_with(res.path, query)?;
            print_list(&body, &res, output_json, config.theme)?;
        }
    }
    Ok(())
}

pub fn create(
    resource: &str,
    json_body: &str,
    client_config_path: &std::path::Path,
) -> Result<()> {
    let config = ClientConfig::load(client_config_path)?;
    let ctx = config.require_current()?;
    let res = resource_path(resource)?;
    let api = Api::new(ctx)?;

    let body: Value = serde_json::from_str(json_body)
        .map_err(|e| anyhow::anyhow!("Invalid JSON: {}", e))?;
    let result = api.post(res.path, &body)?;

    println!("{} created.", res.singular);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub fn delete(
    resource: &str,
    id: &str,
    client_config_path: &std::path::Path,
) -> Result<()> {
    let config = ClientConfig::load(client_config_path)?;
    let ctx = config.require_current()?;
    let res = resource_path(resource)?;
    let api = Api::new(ctx)?;

    api.delete(&format!("{}/{}", res.path, id))?;
    println!("{} {} deleted.", res.singular, id);
    Ok(())
}

/// UPDATE a resource (PATCH, JSON merge semantics).
pub fn update(
    resource: &str,
    id: &str,
    json_body: &str,
    client_config_path: &std::path::Path,
) -> Result<()> {
    let config = ClientConfig::load(client_config_path)?;
    let ctx = config.require_current()?;
    let res = resource_path(resource)?;
    let api = Api::new(ctx)?;

    let body: Value = serde_json::from_str(json_body)
        .map_err(|e| anyhow::anyhow!("Invalid JSON: {}", e))?;
    let result = api.patch(&format!("{}/{}", res.path, id), &body)?;

    println!("{} {} updated.", res.singular, id);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// STATUS: check server health.
pub fn status(client_config_path: &std::path::Path) -> Result<()> {
    let config = ClientConfig::load(client_config_path)?;
    let ctx = config.require_current()?;

    println!("Context:   {}", ctx.name);
    println!("Server:    {}", if ctx.server.is_empty() { "-" } else { &ctx.server });
    println!("Theme:     {}", config.theme.as_str());

    if ctx.server.is_empty() {
        println!("Status:    no server configured");
        return Ok(());
    }

    let api = Api::new(ctx)?;
    match api.get("/health") {
        Ok(_) => println!("Status:    connected"),
        Err(e) => println!("Status:    disconnected ({})", e),
    }
    if !ctx.token.is_empty() {
        match api.get("/lab/me") {
            Ok(me) => println!(
                "User:      {} ({})",
                me["email"].as_str().unwrap_or("-"),
                me["role"].as_str().unwrap_or("-")
            ),
            Err(e) => println!("User:      token rejected ({})", e),
        }
    }
    Ok(())
}
