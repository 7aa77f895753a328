//! Community flake search via the shared group index on search.nixos.org.
//!
//! The index stores one document per exported package, so results are
//! grouped back into flakes keyed by owner/repo (or URL) before display.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde_json::{json, Value};

use crate::config::FLAKE_INDEX;
use crate::error::{QueryError, Result};
use crate::format::{clip, thousands};
use crate::sources::{es_count, es_search_raw, source_str};

struct FlakeGroup {
    name: String,
    description: String,
    owner: String,
    repo: String,
    url: String,
    packages: BTreeSet<String>,
}

pub async fn search(query: &str, limit: usize) -> Result<String> {
    let q = if query.trim().is_empty() || query == "*" {
        json!({"match_all": {}})
    } else {
        json!({
            "bool": {
                "should": [
                    {"match": {"flake_name": {"query": query, "boost": 3}}},
                    {"match": {"flake_description": {"query": query, "boost": 2}}},
                    {"match": {"package_pname": {"query": query, "boost": 1.5}}},
                    {"match": {"package_description": query}},
                    {"wildcard": {"flake_name": {"value": format!("*{query}*"), "boost": 2.5}}},
                    {"wildcard": {"package_pname": {"value": format!("*{query}*"), "boost": 1}}},
                    {"prefix": {"flake_name": {"value": query, "boost": 2}}},
                ],
                "minimum_should_match": 1,
            }
        })
    };
    let body = json!({
        "query": {"bool": {"filter": [{"term": {"type": "package"}}], "must": [q]}},
        // Over-fetch so grouping by flake still fills the requested limit.
        "size": limit * 5,
        "track_total_hits": true,
    });

    let data = es_search_raw(FLAKE_INDEX, &body).await.map_err(|e| match e {
        QueryError::NotFound(_) => QueryError::InvalidInput(
            "Flake indices not found. Flake search may be temporarily unavailable.".to_string(),
        ),
        other => other,
    })?;

    let hits = data
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let total = data
        .get("hits")
        .and_then(|h| h.get("total"))
        .and_then(|t| t.get("value"))
        .and_then(Value::as_u64)
        .unwrap_or(0);

    if hits.is_empty() {
        return Ok(format!("No flakes found matching '{query}'"));
    }

    // Insertion order tracks relevance, so keep keys in a Vec alongside the map.
    let mut order: Vec<String> = Vec::new();
    let mut groups: BTreeMap<String, FlakeGroup> = BTreeMap::new();

    for hit in &hits {
        let flake_name = source_str(hit, "flake_name").trim().to_string();
        let pname = source_str(hit, "package_pname").to_string();
        if flake_name.is_empty() && pname.is_empty() {
            continue;
        }
        let resolved = hit
            .get("_source")
            .and_then(|s| s.get("flake_resolved"))
            .cloned()
            .unwrap_or(Value::Null);
        let owner = resolved.get("owner").and_then(Value::as_str).unwrap_or("");
        let repo = resolved.get("repo").and_then(Value::as_str).unwrap_or("");
        let url = resolved.get("url").and_then(Value::as_str).unwrap_or("");

        let (key, display_name) = if !owner.is_empty() && !repo.is_empty() {
            let name = if !flake_name.is_empty() {
                flake_name.clone()
            } else if !repo.is_empty() {
                repo.to_string()
            } else {
                pname.clone()
            };
            (format!("{owner}/{repo}"), name)
        } else if !url.is_empty() {
            let tail = url
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or("")
                .trim_end_matches(".git");
            let name = if !flake_name.is_empty() {
                flake_name.clone()
            } else if !tail.is_empty() {
                tail.to_string()
            } else {
                pname.clone()
            };
            (url.to_string(), name)
        } else if !flake_name.is_empty() {
            (flake_name.clone(), flake_name.clone())
        } else {
            continue;
        };

        let group = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            let description = {
                let flake_desc = source_str(hit, "flake_description");
                if flake_desc.is_empty() {
                    source_str(hit, "package_description")
                } else {
                    flake_desc
                }
            };
            FlakeGroup {
                name: display_name,
                description: description.to_string(),
                owner: owner.to_string(),
                repo: repo.to_string(),
                url: url.to_string(),
                packages: BTreeSet::new(),
            }
        });
        let attr = source_str(hit, "package_attr_name");
        if !attr.is_empty() {
            group.packages.insert(attr.to_string());
        }
    }

    let mut lines = Vec::new();
    if total as usize > groups.len() {
        lines.push(format!(
            "Found {} matches ({} unique flakes) for '{query}':\n",
            thousands(total),
            groups.len()
        ));
    } else {
        lines.push(format!("Found {} flakes matching '{query}':\n", groups.len()));
    }

    for key in &order {
        let Some(flake) = groups.get(key) else { continue };
        lines.push(format!("* {}", flake.name));
        if !flake.owner.is_empty() && !flake.repo.is_empty() {
            lines.push(format!("  Repository: {}/{}", flake.owner, flake.repo));
        } else if !flake.url.is_empty() {
            lines.push(format!("  URL: {}", flake.url));
        }
        if !flake.description.is_empty() {
            lines.push(format!("  {}", clip(&flake.description, 200)));
        }
        if !flake.packages.is_empty() {
            let shown: Vec<&str> = flake.packages.iter().take(5).map(String::as_str).collect();
            if flake.packages.len() > 5 {
                lines.push(format!(
                    "  Packages: {}, ... ({} total)",
                    shown.join(", "),
                    flake.packages.len()
                ));
            } else {
                lines.push(format!("  Packages: {}", shown.join(", ")));
            }
        }
        lines.push(String::new());
    }
    Ok(lines.join("\n").trim().to_string())
}

pub async fn stats() -> Result<String> {
    let total = es_count(FLAKE_INDEX, &json!({"term": {"type": "package"}}))
        .await
        .map_err(|_| QueryError::InvalidInput("Flake indices not found".to_string()))?;
    Ok(format!(
        "NixOS Flakes Statistics:\n* Available packages: {}",
        thousands(total)
    ))
}
