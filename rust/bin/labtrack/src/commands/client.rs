//! HTTP client bound to the current context.

use std::time::Duration;

use anyhow::Result;
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;

use crate::config::Context;

pub struct Api {
    client: Client,
    base_url: String,
}

impl Api {
    pub fn new(ctx: &Context) -> Result<Self> {
        Self::with_timeout(ctx, Some(Duration::from_secs(30)))
    }

    /// `None` disables the request timeout (long-poll).
    pub fn with_timeout(ctx: &Context, timeout: Option<Duration>) -> Result<Self> {
        if ctx.server.is_empty() {
            anyhow::bail!(
                "No server URL set for context \"{}\". Run `labtrack context set {} --server <url>`.",
                ctx.name,
                ctx.name
            );
        }

        let mut headers = reqwest::header::HeaderMap::new();
        if !ctx.token.is_empty() {
            let val = format!("Bearer {}", ctx.token);
            headers.insert(
                reqwest::header::AUTHORIZATION,
                reqwest::header::HeaderValue::from_str(&val)?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: ctx.server.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn get(&self, path: &str) -> Result<Value> {
        send(self.client.get(self.url(path)))
    }

    pub fn get_with(&self, path: &str, query: &[(String, String)]) -> Result<Value> {
        send(self.client.get(self.url(path)).query(query))
    }

    pub fn post(&self, path: &str, body: &Value) -> Result<Value> {
        send(self.client.post(self.url(path)).json(body))
    }

    pub fn patch(&self, path: &str, body: &Value) -> Result<Value> {
        send(self.client.patch(self.url(path)).json(body))
    }

    pub fn delete(&self, path: &str) -> Result<Value> {
        send(self.client.delete(self.url(path)))
    }
}

fn send(req: RequestBuilder) -> Result<Value> {
    let resp = req
        .send()
        .map_err(|e| anyhow::anyhow!("failed to connect to server: {}", e))?;
    let status = resp.status();
    let body: Value = resp.json().unwrap_or_default();

    if !status.is_success() {
        anyhow::bail!("{}", error_message(status.as_u16(), &body));
    }
    Ok(body)
}

/// `Error (404 NOT_FOUND): assets/x not found`
pub fn error_message(status: u16, body: &Value) -> String {
    let code = body["code"].as_str().unwrap_or("UNKNOWN");
    let message = body["message"].as_str().unwrap_or("unknown error");
    format!("Error ({} {}): {}", status, code, message)
}
