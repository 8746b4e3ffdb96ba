//! `labtrack watch`: follow the server's change feed.

use std::time::Duration;

use anyhow::Result;
use serde_json::Value;

use super::client::Api;
use crate::config::ClientConfig;

const POLL_SECS: u64 = 30;

/// Long-poll `/lab/changes` and print one line per event. Without
/// `since`, starts from the current end of the feed.
pub fn watch(since: Option<u64>, client_config_path: &std::path::Path) -> Result<()> {
    let config = ClientConfig::load(client_config_path)?;
    // Request timeout must outlast the server-side wait.
    let api = Api::with_timeout(
        config.require_current()?,
        Some(Duration::from_secs(POLL_SECS + 15)),
    )?;

    let mut since = match since {
        Some(s) => s,
        None => poll(&api, 0, 0)?["latest"].as_u64().unwrap_or(0),
    };
    println!("Watching for changes after #{} (Ctrl-C to stop)...", since);

    loop {
        let batch = poll(&api, since, POLL_SECS)?;
        if batch["resync"].as_bool().unwrap_or(false) {
            println!("-- missed events; refetch state --");
        }
        for event in batch["events"].as_array().into_iter().flatten() {
            println!("{}", format_event(event));
        }
        since = batch["latest"].as_u64().unwrap_or(since);
    }
}

fn poll(api: &Api, since: u64, timeout: u64) -> Result<Value> {
    api.get_with(
        "/lab/changes",
        &[
            ("since".to_string(), since.to_string()),
            ("timeout".to_string(), timeout.to_string()),
        ],
    )
}

pub fn format_event(event: &Value) -> String {
    format!(
        "#{:<6} {:<6} {}/{}  {}",
        event["seq"].as_u64().unwrap_or(0),
        event["op"].as_str().unwrap_or("?"),
        event["table"].as_str().unwrap_or("?"),
        event["id"].as_str().unwrap_or("?"),
        event["at"].as_str().unwrap_or("")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_line() {
        let e = serde_json::json!({
            "seq": 42,
            "table": "assets",
            "op": "update",
            "id": "abc",
            "at": "2026-01-05T10:00:00Z"
        });
        assert_eq!(
            format_event(&e),
            "#42     update assets/abc  2026-01-05T10:00:00Z"
        );
    }
}
