//! Workflow commands: approvals, transfers, issue status, notifications
//! and the server-side procedures.

use anyhow::Result;
use serde_json::{json, Value};

use super::client::Api;
use super::resource::{print_list, NOTIFICATIONS};
use crate::config::ClientConfig;

fn api(client_config_path: &std::path::Path) -> Result<(ClientConfig, Api)> {
    let config = ClientConfig::load(client_config_path)?;
    let api = Api::new(config.require_current()?)?;
    Ok((config, api))
}

/// Record an approval on an asset. `slot` (`hod` | `lab_incharge`)
/// matters only when an admin approves.
pub fn approve(asset_id: &str, slot: Option<&str>, client_config_path: &std::path::Path) -> Result<()> {
    let (_, api) = api(client_config_path)?;
    let body = match slot {
        Some(s) => json!({ "as": s }),
        None => json!({}),
    };
    let asset = api.post(&format!("/lab/assets/{}/@approve", asset_id), &body)?;

    let flag = |k: &str| if asset[k].is_null() { "pending" } else { "done" };
    println!("Asset {}:", asset["assetId"].as_str().unwrap_or(asset_id));
    println!("  HOD approval:          {}", flag("approvedBy"));
    println!("  Lab Incharge approval: {}", flag("approvedByLabIncharge"));
    println!(
        "  Approved:              {}",
        if asset["approved"].as_bool().unwrap_or(false) { "yes" } else { "no" }
    );
    Ok(())
}

pub fn receive(transfer_id: &str, client_config_path: &std::path::Path) -> Result<()> {
    let (_, api) = api(client_config_path)?;
    let t = api.post(&format!("/lab/transfers/{}/@receive", transfer_id), &json!({}))?;
    println!(
        "Transfer {} received: asset {} is now in lab {}.",
        transfer_id,
        t["assetId"].as_str().unwrap_or("-"),
        t["toLab"].as_str().unwrap_or("-")
    );
    Ok(())
}

/// Move a lab or asset issue forward.
pub fn issue_status(
    kind: &str,
    id: &str,
    status: &str,
    resolution: Option<&str>,
    client_config_path: &std::path::Path,
) -> Result<()> {
    let path = match kind {
        "lab" => "/lab/lab-issues",
        "asset" => "/lab/asset-issues",
        other => anyhow::bail!("Unknown issue kind \"{}\" (expected lab or asset).", other),
    };
    let (_, api) = api(client_config_path)?;
    let mut body = json!({ "status": status });
    if let Some(r) = resolution {
        body["resolution"] = Value::String(r.to_string());
    }
    let issue = api.post(&format!("{}/{}/@status", path, id), &body)?;
    println!(
        "Issue \"{}\" is now {}.",
        issue["title"].as_str().unwrap_or(id),
        issue["status"].as_str().unwrap_or(status)
    );
    Ok(())
}

pub fn notifications(unread: bool, output_json: bool, client_config_path: &std::path::Path) -> Result<()> {
    let (config, api) = api(client_config_path)?;
    let mut query = vec![("limit".to_string(), "100".to_string())];
    if unread {
        query.push(("unread".to_string(), "true".to_string()));
    }
    let body = api.get_with(NOTIFICATIONS.path, &query)?;
    print_list(&body, &NOTIFICATIONS, output_json, config.theme)
}

/// Mark one notification, or all of them, as read.
pub fn read(id: Option<&str>, all: bool, client_config_path: &std::path::Path) -> Result<()> {
    let (_, api) = api(client_config_path)?;
    match (id, all) {
        (_, true) => {
            let body = api.post("/lab/notifications/@read-all", &json!({}))?;
            println!("{} notification(s) marked read.", body["updated"].as_u64().unwrap_or(0));
        }
        (Some(id), false) => {
            api.post(&format!("/lab/notifications/{}/@read", id), &json!({ "read": true }))?;
            println!("Notification {} marked read.", id);
        }
        (None, false) => anyhow::bail!("Give a notification id or --all."),
    }
    Ok(())
}

pub fn stats(days: Option<u32>, output_json: bool, client_config_path: &std::path::Path) -> Result<()> {
    let (_, api) = api(client_config_path)?;
    let body = match days {
        Some(d) => json!({ "days": d }),
        None => json!({}),
    };
    let stats = api.post("/lab/rpc/get_activity_stats", &body)?;
    if output_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Last {} day(s)", stats["days"]);
    println!("  Total:  {}", stats["total"]);
    println!("  Failed: {}", stats["failed"]);
    print_counts("By action", &stats["byAction"]);
    print_counts("By entity", &stats["byEntityType"]);
    print_counts("By severity", &stats["bySeverity"]);
    if let Some(top) = stats["topUsers"].as_array() {
        println!("  Top users:");
        for u in top {
            let who = u["userEmail"].as_str().or_else(|| u["userId"].as_str()).unwrap_or("-");
            println!("    {:30} {}", who, u["count"]);
        }
    }
    Ok(())
}

fn print_counts(label: &str, counts: &Value) {
    if let Some(map) = counts.as_object() {
        println!("  {}:", label);
        for (k, v) in map {
            println!("    {:30} {}", k, v);
        }
    }
}

/// Ask the server whether a user (default: the caller) may act on a lab.
pub fn can(
    lab_id: &str,
    action: &str,
    user_id: Option<&str>,
    client_config_path: &std::path::Path,
) -> Result<()> {
    let (_, api) = api(client_config_path)?;
    let mut body = json!({ "labId": lab_id, "action": action });
    if let Some(u) = user_id {
        body["userId"] = Value::String(u.to_string());
    }
    let result = api.post("/lab/rpc/check_lab_permission", &body)?;
    let allowed = result["allowed"].as_bool().unwrap_or(false);
    println!("{}", if allowed { "allowed" } else { "denied" });
    Ok(())
}
