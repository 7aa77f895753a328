//! NixHub (search.devbox.sh) package metadata: search, details, and
//! version history. Also the resolve endpoint used for binary cache checks.

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::config::NIXHUB_API;
use crate::error::{QueryError, Result};
use crate::format::clip;
use crate::sources::client;

static COMMIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-fA-F0-9]{40}$").expect("regex for nixpkgs commit hashes"));

async fn get_json(path: &str, params: &[(&str, &str)]) -> Result<Value> {
    let resp = client()
        .get(format!("{NIXHUB_API}/{path}"))
        .query(params)
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| QueryError::from_reqwest("NixHub", e))?;

    let status = resp.status();
    if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::NOT_FOUND {
        let name = params
            .iter()
            .find(|(k, _)| *k == "name" || *k == "q")
            .map(|(_, v)| *v)
            .unwrap_or("");
        return Err(QueryError::NotFound(format!("Package '{name}' not found")));
    }
    if status.is_server_error() {
        return Err(QueryError::ServiceUnavailable("NixHub"));
    }
    let resp = resp
        .error_for_status()
        .map_err(|e| QueryError::Api(format!("NixHub API error: {e}")))?;
    resp.json()
        .await
        .map_err(|e| QueryError::Api(format!("NixHub API error: {e}")))
}

/// `v2/resolve` for a name/version pair. Used for flake refs, store paths,
/// and binary cache probes.
pub(crate) async fn resolve(name: &str, version: &str) -> Result<Value> {
    let version = if version.is_empty() { "latest" } else { version };
    get_json("v2/resolve", &[("name", name), ("version", version)]).await
}

/// `v1/pkg`: array of version records, newest first.
async fn pkg_releases(name: &str) -> Result<Vec<Value>> {
    let data = get_json("v1/pkg", &[("name", name)]).await?;
    match data {
        Value::Array(releases) if !releases.is_empty() => Ok(releases),
        _ => Err(QueryError::NotFound(format!("Package '{name}' not found"))),
    }
}

fn format_date(last_updated: &Value) -> Option<String> {
    let dt: DateTime<Utc> = match last_updated {
        Value::Number(n) => {
            let epoch = n.as_i64()?;
            Utc.timestamp_opt(epoch, 0).single()?
        }
        Value::String(s) => DateTime::parse_from_rfc3339(&s.replace('Z', "+00:00"))
            .ok()?
            .with_timezone(&Utc),
        _ => return None,
    };
    Some(dt.format("%Y-%m-%d").to_string())
}

/// Programs are identical across systems; take the first non-empty list.
fn programs_from(record: &Value) -> Vec<String> {
    record
        .get("systems")
        .and_then(Value::as_object)
        .and_then(|systems| {
            systems.values().find_map(|sys| {
                let progs: Vec<String> = sys
                    .get("programs")?
                    .as_array()?
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect();
                (!progs.is_empty()).then_some(progs)
            })
        })
        .unwrap_or_default()
}

fn programs_line(programs: &[String]) -> Option<String> {
    if programs.is_empty() {
        return None;
    }
    let shown = programs[..programs.len().min(10)].join(", ");
    if programs.len() > 10 {
        Some(format!("Programs: {shown} ... ({} total)", programs.len()))
    } else {
        Some(format!("Programs: {shown}"))
    }
}

fn first_attr_path(release: &Value) -> Option<String> {
    release
        .get("systems")
        .and_then(Value::as_object)
        .and_then(|systems| {
            systems.values().find_map(|sys| {
                sys.get("attr_paths")?
                    .as_array()?
                    .first()?
                    .as_str()
                    .map(String::from)
            })
        })
}

fn format_release(release: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    let version = release
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    lines.push(format!("* {version}"));

    if let Some(updated) = release.get("last_updated").and_then(format_date) {
        lines.push(format!("  Updated: {updated}"));
    }

    let systems: Vec<&str> = release
        .get("platforms")
        .and_then(Value::as_array)
        .map(|platforms| {
            platforms
                .iter()
                .filter_map(|p| match p {
                    Value::String(s) => Some(s.as_str()),
                    Value::Object(m) => m.get("system").and_then(Value::as_str),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    if !systems.is_empty() {
        let has_linux = systems.iter().any(|s| s.contains("linux"));
        let has_darwin = systems.iter().any(|s| s.contains("darwin"));
        let label = match (has_linux, has_darwin) {
            (true, true) => "Linux and macOS".to_string(),
            (true, false) => "Linux".to_string(),
            (false, true) => "macOS".to_string(),
            (false, false) => {
                let mut sorted: Vec<&str> = systems.clone();
                sorted.sort_unstable();
                sorted.dedup();
                sorted.join(", ")
            }
        };
        lines.push(format!("  Platforms: {label}"));
    }

    let commit = release
        .get("commit_hash")
        .and_then(Value::as_str)
        .unwrap_or("");
    if COMMIT_RE.is_match(commit) {
        lines.push(format!("  Nixpkgs commit: {commit}"));
        if let Some(attr) = first_attr_path(release) {
            lines.push(format!("  Attribute: {attr}"));
        }
    }
    lines
}

pub async fn search(query: &str, limit: usize) -> Result<String> {
    let data = get_json("v2/search", &[("q", query)]).await?;

    let packages = data
        .get("results")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if packages.is_empty() {
        return Ok(format!("No packages found on NixHub matching '{query}'"));
    }

    let total = data
        .get("total_results")
        .and_then(Value::as_u64)
        .unwrap_or(packages.len() as u64);
    let shown = &packages[..packages.len().min(limit)];

    let mut lines = vec![format!(
        "Found {} of {total} packages on NixHub matching '{query}':\n",
        shown.len()
    )];
    for pkg in shown {
        let name = pkg.get("name").and_then(Value::as_str).unwrap_or("");
        let version = pkg.get("version").and_then(Value::as_str).unwrap_or("");
        let summary = pkg
            .get("summary")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| pkg.get("description").and_then(Value::as_str))
            .unwrap_or("");

        lines.push(format!("* {name}"));
        if !version.is_empty() {
            lines.push(format!("  Version: {version}"));
        }
        if !summary.is_empty() {
            lines.push(format!("  {}", clip(summary, 200)));
        }
        if let Some(updated) = pkg.get("last_updated").and_then(format_date) {
            lines.push(format!("  Updated: {updated}"));
        }
        lines.push(String::new());
    }
    Ok(lines.join("\n").trim().to_string())
}

pub async fn info(name: &str) -> Result<String> {
    let releases = pkg_releases(name).await?;
    let latest = &releases[0];

    let version = latest
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or("latest");

    // Flake ref and per-system store paths come from resolve; absence is
    // not an error, the rest of the record still renders.
    let mut flake_ref = String::new();
    let mut store_paths: Vec<(String, String)> = Vec::new();
    if let Ok(resolved) = resolve(name, version).await {
        if let Some(systems) = resolved.get("systems").and_then(Value::as_object) {
            for (sys_name, sys_info) in systems {
                if flake_ref.is_empty() {
                    if let Some(fi) = sys_info.get("flake_installable") {
                        let ref_obj = fi.get("ref").cloned().unwrap_or(Value::Null);
                        let attr_path = fi.get("attr_path").and_then(Value::as_str).unwrap_or("");
                        if ref_obj.get("type").and_then(Value::as_str) == Some("github") {
                            let owner = ref_obj.get("owner").and_then(Value::as_str).unwrap_or("");
                            let repo = ref_obj.get("repo").and_then(Value::as_str).unwrap_or("");
                            let rev = ref_obj.get("rev").and_then(Value::as_str).unwrap_or("");
                            let rev_short: String = rev.chars().take(8).collect();
                            if !owner.is_empty() && !repo.is_empty() {
                                flake_ref = format!("github:{owner}/{repo}/{rev_short}#{attr_path}");
                            }
                        }
                    }
                }
                if let Some(path) = default_output_path(sys_info) {
                    store_paths.push((sys_name.clone(), path));
                }
            }
        }
    }
    store_paths.sort();

    let mut lines = vec![format!(
        "Package: {}",
        latest.get("name").and_then(Value::as_str).unwrap_or(name)
    )];
    lines.push(format!("Version: {version}"));

    let summary = latest.get("summary").and_then(Value::as_str).unwrap_or("");
    if !summary.is_empty() {
        lines.push(format!("Summary: {summary}"));
    }
    let description = latest
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("");
    if !description.is_empty() && description != summary {
        lines.push(format!("Description: {}", clip(description, 500)));
    }
    lines.push(String::new());

    let license = latest.get("license").and_then(Value::as_str).unwrap_or("");
    if !license.is_empty() {
        lines.push(format!("License: {license}"));
    }
    let homepage = latest.get("homepage").and_then(Value::as_str).unwrap_or("");
    if !homepage.is_empty() {
        lines.push(format!("Homepage: {homepage}"));
    }
    if let Some(line) = programs_line(&programs_from(latest)) {
        lines.push(line);
    }
    let platforms: Vec<&str> = latest
        .get("platforms")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if !platforms.is_empty() {
        let mut sorted = platforms;
        sorted.sort_unstable();
        lines.push(format!("Platforms: {}", sorted.join(", ")));
    }

    if !flake_ref.is_empty() {
        lines.push(String::new());
        lines.push("Flake Reference:".to_string());
        lines.push(format!("  {flake_ref}"));
    }
    if !store_paths.is_empty() {
        lines.push(String::new());
        lines.push("Store Paths:".to_string());
        for (sys_name, path) in &store_paths {
            lines.push(format!("  {sys_name}: {path}"));
        }
    }
    Ok(lines.join("\n"))
}

pub(crate) fn default_output_path(sys_info: &Value) -> Option<String> {
    let outputs = sys_info.get("outputs")?.as_array()?;
    let default = outputs
        .iter()
        .find(|o| o.get("default").and_then(Value::as_bool) == Some(true))
        .or_else(|| outputs.first())?;
    default
        .get("path")
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
        .map(String::from)
}

/// Version history for the `nix_versions` tool.
pub async fn versions(package: &str, version: &str, limit: usize) -> Result<String> {
    let releases = pkg_releases(package).await?;

    if !version.is_empty() {
        for release in &releases {
            if release.get("version").and_then(Value::as_str) == Some(version) {
                let mut lines = vec![format!("Found {package} version {version}\n")];
                let commit = release
                    .get("commit_hash")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                if COMMIT_RE.is_match(commit) {
                    lines.push(format!("Nixpkgs commit: {commit}"));
                    if let Some(attr) = first_attr_path(release) {
                        lines.push(format!("  Attribute: {attr}"));
                    }
                }
                return Ok(lines.join("\n"));
            }
        }
        let available: Vec<&str> = releases
            .iter()
            .take(limit)
            .filter_map(|r| r.get("version").and_then(Value::as_str))
            .collect();
        return Ok(format!(
            "Version {version} not found for {package}\nAvailable: {}",
            available.join(", ")
        ));
    }

    let latest = &releases[0];
    let mut lines = vec![format!("Package: {package}")];
    let license = latest.get("license").and_then(Value::as_str).unwrap_or("");
    if !license.is_empty() {
        lines.push(format!("License: {license}"));
    }
    let homepage = latest.get("homepage").and_then(Value::as_str).unwrap_or("");
    if !homepage.is_empty() {
        lines.push(format!("Homepage: {homepage}"));
    }
    if let Some(line) = programs_line(&programs_from(latest)) {
        lines.push(line);
    }
    lines.push(format!("Total versions: {}", releases.len()));
    lines.push(String::new());

    let shown = &releases[..releases.len().min(limit)];
    lines.push(format!(
        "Recent versions ({} of {}):\n",
        shown.len(),
        releases.len()
    ));
    for release in shown {
        lines.extend(format_release(release));
        lines.push(String::new());
    }
    Ok(lines.join("\n").trim().to_string())
}
