//! Thin blocking HTTP helpers for talking to a running weaver server.
//!
//! Non-2xx responses are turned into anyhow errors carrying the server's
//! `error` message when the body has one.

use anyhow::{anyhow, Context, Result};

fn url(server: &str, path: &str) -> String {
    format!("{}{}", server.trim_end_matches('/'), path)
}

/// Extract the server's error message from a ureq status error.
fn status_error(err: ureq::Error, path: &str) -> anyhow::Error {
    match err {
        ureq::Error::Status(code, response) => {
            let body: serde_json::Value = response
                .into_json()
                .unwrap_or(serde_json::Value::Null);
            let msg = body["error"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string());
            anyhow!("server returned {code} for {path}: {msg}")
        }
        other => anyhow!(other).context(format!("request to {path} failed")),
    }
}

pub fn get(server: &str, path: &str) -> Result<serde_json::Value> {
    ureq::get(&url(server, path))
        .call()
        .map_err(|e| status_error(e, path))?
        .into_json()
        .context("invalid JSON in server response")
}

pub fn post(server: &str, path: &str, body: serde_json::Value) -> Result<serde_json::Value> {
    ureq::post(&url(server, path))
        .send_json(body)
        .map_err(|e| status_error(e, path))?
        .into_json()
        .context("invalid JSON in server response")
}

pub fn delete(server: &str, path: &str) -> Result<serde_json::Value> {
    ureq::delete(&url(server, path))
        .call()
        .map_err(|e| status_error(e, path))?
        .into_json()
        .context("invalid JSON in server response")
}
