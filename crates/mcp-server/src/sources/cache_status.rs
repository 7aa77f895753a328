//! Binary cache presence checks against cache.nixos.org.
//!
//! Store paths come from the NixHub resolve endpoint; each one is probed
//! with a HEAD on its narinfo, followed by a GET for size details when it
//! exists.

use serde_json::Value;

use crate::config::CACHE_NIXOS_ORG;
use crate::error::{QueryError, Result};
use crate::sources::{client, nixhub};

use nixscope_flake_store::format_size;

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct NarInfo {
    pub file_size: Option<u64>,
    pub nar_size: Option<u64>,
    pub compression: Option<String>,
}

pub(crate) fn parse_narinfo(text: &str) -> NarInfo {
    let mut info = NarInfo::default();
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_lowercase().as_str() {
            "filesize" => info.file_size = value.parse().ok(),
            "narsize" => info.nar_size = value.parse().ok(),
            "compression" => info.compression = Some(value.to_string()),
            _ => {}
        }
    }
    info
}

/// The 32-character base32 hash between `/nix/store/` and the first dash.
pub(crate) fn store_hash(store_path: &str) -> Option<&str> {
    let name = store_path.strip_prefix("/nix/store/")?;
    let hash = name.split('-').next()?;
    (hash.len() == 32).then_some(hash)
}

async fn probe_system(system: &str, store_path: &str) -> Vec<String> {
    let mut lines = vec![format!("System: {system}")];

    if store_path.is_empty() {
        lines.push("  Store path: Not available".to_string());
        lines.push("  Status: UNKNOWN".to_string());
        lines.push(String::new());
        return lines;
    }
    lines.push(format!("  Store path: {store_path}"));

    let Some(hash) = store_hash(store_path) else {
        lines.push("  Status: UNKNOWN (invalid store path)".to_string());
        lines.push(String::new());
        return lines;
    };

    let url = format!("{CACHE_NIXOS_ORG}/{hash}.narinfo");
    match client().head(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            // HEAD said it exists; fetch the body for sizes.
            let body = match client().get(&url).send().await {
                Ok(full) if full.status().is_success() => full.text().await.ok(),
                _ => None,
            };
            lines.push("  Status: CACHED".to_string());
            if let Some(text) = body {
                let narinfo = parse_narinfo(&text);
                if let Some(size) = narinfo.file_size {
                    lines.push(format!("  Download size: {}", format_size(size)));
                }
                if let Some(size) = narinfo.nar_size {
                    lines.push(format!("  Unpacked size: {}", format_size(size)));
                }
                if let Some(compression) = narinfo.compression {
                    lines.push(format!("  Compression: {compression}"));
                }
            }
        }
        Ok(resp) if resp.status() == reqwest::StatusCode::NOT_FOUND => {
            lines.push("  Status: NOT CACHED".to_string());
        }
        Ok(resp) => {
            lines.push(format!("  Status: UNKNOWN (HTTP {})", resp.status().as_u16()));
        }
        Err(_) => {
            lines.push("  Status: UNKNOWN (cache check failed)".to_string());
        }
    }
    lines.push(String::new());
    lines
}

pub async fn check(name: &str, version: &str, system_filter: &str) -> Result<String> {
    let resolved = nixhub::resolve(name, version).await?;

    let pkg_name = resolved.get("name").and_then(Value::as_str).unwrap_or(name);
    let pkg_version = resolved
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or(version);
    let systems_data = resolved
        .get("systems")
        .and_then(Value::as_object)
        .ok_or_else(|| QueryError::Api("Invalid systems data from NixHub".to_string()))?;

    let mut systems: Vec<(String, String)> = systems_data
        .iter()
        .map(|(sys_name, sys_info)| {
            let path = nixhub::default_output_path(sys_info).unwrap_or_default();
            (sys_name.clone(), path)
        })
        .collect();

    if systems.is_empty() {
        return Err(QueryError::NotFound(format!(
            "No systems found for {name}@{pkg_version}"
        )));
    }

    if !system_filter.is_empty() {
        let all: Vec<&String> = systems_data.keys().collect();
        systems.retain(|(sys_name, _)| sys_name == system_filter);
        if systems.is_empty() {
            let available: Vec<&str> = all.iter().map(|s| s.as_str()).collect();
            return Err(QueryError::NotFound(format!(
                "System '{system_filter}' not available. Available: {}",
                available.join(", ")
            )));
        }
    }

    let mut lines = vec![format!("Binary Cache Status: {pkg_name}@{pkg_version}"), String::new()];

    for (sys_name, path) in &systems {
        lines.extend(probe_system(sys_name, path).await);
    }
    Ok(lines.join("\n").trim().to_string())
}
