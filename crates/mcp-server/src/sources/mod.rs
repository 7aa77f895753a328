//! Web-backed query sources.
//!
//! Each submodule talks to one upstream service and renders plain text.
//! The Elasticsearch helpers here are shared by the nixos and flakes
//! sources and by channel discovery.

use once_cell::sync::Lazy;
use serde_json::Value;
use std::time::Duration;

use crate::config::{NIXOS_API, NIXOS_AUTH_PASS, NIXOS_AUTH_USER, USER_AGENT};
use crate::error::{QueryError, Result};

pub mod cache_status;
pub mod flakes;
pub mod nixhub;
pub mod nixos;

static HTTP: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(15))
        .build()
        .unwrap_or_default()
});

pub(crate) fn client() -> &'static reqwest::Client {
    &HTTP
}

/// POST to an index's `_search` endpoint and return the raw response body.
pub(crate) async fn es_search_raw(index: &str, body: &Value) -> Result<Value> {
    let resp = HTTP
        .post(format!("{NIXOS_API}/{index}/_search"))
        .basic_auth(NIXOS_AUTH_USER, Some(NIXOS_AUTH_PASS))
        .json(body)
        .send()
        .await
        .map_err(|e| QueryError::from_reqwest("NixOS search", e))?;

    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(QueryError::NotFound(format!("Index '{index}' not found")));
    }
    let resp = resp
        .error_for_status()
        .map_err(|e| QueryError::Api(e.to_string()))?;
    resp.json()
        .await
        .map_err(|e| QueryError::Api(e.to_string()))
}

/// Query an index and return the hit documents.
pub(crate) async fn es_query(index: &str, query: &Value, size: usize) -> Result<Vec<Value>> {
    let body = serde_json::json!({"query": query, "size": size});
    let data = es_search_raw(index, &body).await?;
    let hits = data
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    Ok(hits)
}

/// Document count for a query against an index.
pub(crate) async fn es_count(index: &str, query: &Value) -> Result<u64> {
    let resp = HTTP
        .post(format!("{NIXOS_API}/{index}/_count"))
        .basic_auth(NIXOS_AUTH_USER, Some(NIXOS_AUTH_PASS))
        .json(&serde_json::json!({"query": query}))
        .send()
        .await
        .map_err(|e| QueryError::from_reqwest("NixOS search", e))?
        .error_for_status()
        .map_err(|e| QueryError::Api(e.to_string()))?;

    let data: Value = resp
        .json()
        .await
        .map_err(|e| QueryError::Api(e.to_string()))?;
    Ok(data.get("count").and_then(Value::as_u64).unwrap_or(0))
}

/// Field accessor for `_source` documents.
pub(crate) fn source_str<'a>(hit: &'a Value, field: &str) -> &'a str {
    hit.get("_source")
        .and_then(|s| s.get(field))
        .and_then(Value::as_str)
        .unwrap_or("")
}
