//! Discovery and resolution of search.nixos.org channel indices.
//!
//! Channel names like `unstable` or `25.11` map to Elasticsearch index
//! names like `latest-44-nixos-unstable`, and the generation number changes
//! whenever the upstream deployment rolls over. Discovery probes the
//! plausible generation/version grid with `_count` requests and keeps the
//! indices that actually hold documents; when nothing answers, a static
//! fallback table is used and flagged as such.
//!
//! Resolution is cached for the process lifetime. This cache holds channel
//! identifiers only; flake-input locations are never cached anywhere.

use std::collections::BTreeMap;

use tokio::sync::OnceCell;

use crate::config::{CHANNEL_GENERATIONS, CHANNEL_VERSIONS, FALLBACK_CHANNELS};
use crate::format::thousands;
use crate::sources;

#[derive(Debug, Clone)]
pub struct ChannelState {
    /// index name -> document count, for every live index found.
    pub available: BTreeMap<String, u64>,
    /// channel name -> index name.
    pub resolved: BTreeMap<String, String>,
    pub using_fallback: bool,
}

static CHANNELS: OnceCell<ChannelState> = OnceCell::const_new();

pub async fn state() -> &'static ChannelState {
    CHANNELS.get_or_init(discover).await
}

/// Resolved index for a channel name, if the channel exists.
pub async fn index_for(channel: &str) -> Option<String> {
    state().await.resolved.get(channel).cloned()
}

async fn discover() -> ChannelState {
    let mut available = BTreeMap::new();
    for &generation in CHANNEL_GENERATIONS {
        for &version in CHANNEL_VERSIONS {
            let pattern = format!("latest-{generation}-nixos-{version}");
            match sources::es_count(&pattern, &serde_json::json!({"match_all": {}})).await {
                Ok(count) if count > 0 => {
                    available.insert(pattern, count);
                }
                Ok(_) => {}
                Err(err) => {
                    log::debug!("channel probe {pattern} failed: {err}");
                }
            }
        }
    }

    let (resolved, using_fallback) = resolve_from(&available);
    ChannelState {
        available,
        resolved,
        using_fallback,
    }
}

/// Pure resolution step: pick `unstable`, per-version channels, `stable`
/// (highest version, ties broken by document count) and `beta` out of the
/// discovered indices. Falls back to the static table when nothing was
/// discovered.
pub fn resolve_from(available: &BTreeMap<String, u64>) -> (BTreeMap<String, String>, bool) {
    if available.is_empty() {
        return (fallback_table(), true);
    }

    let mut resolved = BTreeMap::new();

    if let Some(pattern) = available.keys().find(|p| p.contains("unstable")) {
        resolved.insert("unstable".to_string(), pattern.clone());
    }

    // (major, minor, version string, index, count) for every stable index.
    let mut stable_candidates: Vec<(u32, u32, String, String, u64)> = Vec::new();
    for (pattern, &count) in available {
        if pattern.contains("unstable") {
            continue;
        }
        let parts: Vec<&str> = pattern.split('-').collect();
        if parts.len() < 4 {
            continue;
        }
        let version = parts[3];
        if let Some((major, minor)) = parse_version(version) {
            stable_candidates.push((major, minor, version.to_string(), pattern.clone(), count));
        }
    }

    if !stable_candidates.is_empty() {
        stable_candidates.sort_by(|a, b| (b.0, b.1, b.4).cmp(&(a.0, a.1, a.4)));
        let (_, _, version, pattern, _) = stable_candidates[0].clone();
        resolved.insert("stable".to_string(), pattern.clone());
        resolved.insert(version, pattern);

        // For each version keep the index with the most documents.
        let mut best: BTreeMap<String, (String, u64)> = BTreeMap::new();
        for (_, _, version, pattern, count) in &stable_candidates {
            let keep = match best.get(version) {
                Some((_, existing)) => count > existing,
                None => true,
            };
            if keep {
                best.insert(version.clone(), (pattern.clone(), *count));
            }
        }
        for (version, (pattern, _)) in best {
            resolved.insert(version, pattern);
        }
    }

    if let Some(stable) = resolved.get("stable").cloned() {
        resolved.insert("beta".to_string(), stable);
    }

    if resolved.is_empty() {
        return (fallback_table(), true);
    }
    (resolved, false)
}

fn fallback_table() -> BTreeMap<String, String> {
    FALLBACK_CHANNELS
        .iter()
        .map(|(name, index)| (name.to_string(), index.to_string()))
        .collect()
}

fn parse_version(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// "Available channels: ..." hint for invalid-channel errors.
pub async fn suggestions(invalid: &str) -> String {
    let state = state().await;
    let available: Vec<&String> = state.resolved.keys().collect();
    let invalid_lower = invalid.to_lowercase();

    let mut matches: Vec<&str> = available
        .iter()
        .filter(|ch| {
            let lower = ch.to_lowercase();
            lower.contains(&invalid_lower) || invalid_lower.contains(&lower)
        })
        .map(|ch| ch.as_str())
        .collect();

    if matches.is_empty() {
        let mut common: Vec<&str> = ["unstable", "stable", "beta"]
            .into_iter()
            .filter(|name| state.resolved.contains_key(*name))
            .collect();
        common.extend(
            available
                .iter()
                .filter(|ch| parse_version(ch).is_some())
                .take(2)
                .map(|ch| ch.as_str()),
        );
        matches = common;
        if matches.is_empty() {
            matches = available.iter().take(4).map(|ch| ch.as_str()).collect();
        }
    }

    format!("Available channels: {}", matches.join(", "))
}

/// `action=channels` output: every resolved channel with its index,
/// availability, and document count.
pub async fn list_channels() -> String {
    let state = state().await;
    let mut lines = Vec::new();

    if state.using_fallback {
        lines.push("WARNING: Using fallback channels (API discovery failed)\n".to_string());
    }

    lines.push("NixOS Channels:\n".to_string());
    for (name, index) in &state.resolved {
        let status = if state.available.contains_key(index) {
            "Available"
        } else {
            "Unavailable"
        };
        let docs = state
            .available
            .get(index)
            .map(|&count| format!("{} documents", thousands(count)))
            .unwrap_or_else(|| "Unknown".to_string());

        let label = if name == "stable" {
            match index.split('-').nth(3) {
                Some(version) => format!("* {name} (current: {version})"),
                None => format!("* {name}"),
            }
        } else {
            format!("* {name}")
        };
        lines.push(format!("{label} -> {index}"));
        lines.push(format!("  Status: {status} ({docs})"));
        lines.push(String::new());
    }

    lines.push("Note: 'stable' always points to current stable release.".to_string());
    lines.join("\n").trim().to_string()
}
