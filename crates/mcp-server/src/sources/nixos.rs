//! Package, option, and program queries against search.nixos.org.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::channels;
use crate::error::{QueryError, Result};
use crate::sources::{es_count, es_query, source_str};

/// Option descriptions arrive wrapped in `<rendered-html>` with inline
/// markup; strip it down to plain text.
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("regex for html tags"));

fn strip_html(text: &str) -> String {
    if !text.contains("<rendered-html>") {
        return text.to_string();
    }
    let text = text
        .replace("<rendered-html>", "")
        .replace("</rendered-html>", "");
    TAG_RE.replace_all(&text, "").trim().to_string()
}

async fn resolve_channel(channel: &str) -> Result<String> {
    match channels::index_for(channel).await {
        Some(index) => Ok(index),
        None => Err(QueryError::InvalidInput(format!(
            "Invalid channel '{channel}'. {}",
            channels::suggestions(channel).await
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Packages,
    Options,
    Programs,
}

pub async fn search(query: &str, search_type: SearchType, limit: usize, channel: &str) -> Result<String> {
    let index = resolve_channel(channel).await?;

    let q = match search_type {
        SearchType::Packages => json!({
            "bool": {
                "must": [{"term": {"type": "package"}}],
                "should": [
                    {"match": {"package_pname": {"query": query, "boost": 3}}},
                    {"match": {"package_description": query}},
                ],
                "minimum_should_match": 1,
            }
        }),
        SearchType::Options => json!({
            "bool": {
                "must": [{"term": {"type": "option"}}],
                "should": [
                    {"wildcard": {"option_name": format!("*{query}*")}},
                    {"match": {"option_description": query}},
                ],
                "minimum_should_match": 1,
            }
        }),
        SearchType::Programs => json!({
            "bool": {
                "must": [{"term": {"type": "package"}}],
                "should": [
                    {"match": {"package_programs": {"query": query, "boost": 2}}},
                    {"match": {"package_pname": query}},
                ],
                "minimum_should_match": 1,
            }
        }),
    };

    let hits = es_query(&index, &q, limit).await?;
    let label = match search_type {
        SearchType::Packages => "packages",
        SearchType::Options => "options",
        SearchType::Programs => "programs",
    };
    if hits.is_empty() {
        return Ok(format!("No {label} found matching '{query}'"));
    }

    let mut lines = vec![format!("Found {} {label} matching '{query}':\n", hits.len())];
    for hit in &hits {
        match search_type {
            SearchType::Packages => {
                let name = source_str(hit, "package_pname");
                let version = source_str(hit, "package_pversion");
                let desc = source_str(hit, "package_description");
                lines.push(format!("* {name} ({version})"));
                if !desc.is_empty() {
                    lines.push(format!("  {desc}"));
                }
                lines.push(String::new());
            }
            SearchType::Options => {
                let name = source_str(hit, "option_name");
                let opt_type = source_str(hit, "option_type");
                let desc = strip_html(source_str(hit, "option_description"));
                lines.push(format!("* {name}"));
                if !opt_type.is_empty() {
                    lines.push(format!("  Type: {opt_type}"));
                }
                if !desc.is_empty() {
                    lines.push(format!("  {desc}"));
                }
                lines.push(String::new());
            }
            SearchType::Programs => {
                let pkg_name = source_str(hit, "package_pname");
                let programs = hit
                    .get("_source")
                    .and_then(|s| s.get("package_programs"))
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let query_lower = query.to_lowercase();
                for prog in programs.iter().filter_map(Value::as_str) {
                    if prog.to_lowercase() == query_lower {
                        lines.push(format!("* {prog} (provided by {pkg_name})"));
                        lines.push(String::new());
                    }
                }
            }
        }
    }
    Ok(lines.join("\n").trim().to_string())
}

pub async fn info(name: &str, is_package: bool, channel: &str) -> Result<String> {
    let index = resolve_channel(channel).await?;

    let (doc_type, field) = if is_package {
        ("package", "package_pname")
    } else {
        ("option", "option_name")
    };
    let q = json!({
        "bool": {"must": [{"term": {"type": doc_type}}, {"term": {field: name}}]}
    });
    let hits = es_query(&index, &q, 1).await?;
    let hit = hits.first().ok_or_else(|| {
        let label = if is_package { "Package" } else { "Option" };
        QueryError::NotFound(format!("{label} '{name}' not found"))
    })?;

    let mut lines = Vec::new();
    if is_package {
        lines.push(format!("Package: {}", source_str(hit, "package_pname")));
        lines.push(format!("Version: {}", source_str(hit, "package_pversion")));
        let desc = source_str(hit, "package_description");
        if !desc.is_empty() {
            lines.push(format!("Description: {desc}"));
        }
        let homepage = hit
            .get("_source")
            .and_then(|s| s.get("package_homepage"))
            .and_then(Value::as_array)
            .and_then(|a| a.first())
            .and_then(Value::as_str)
            .unwrap_or("");
        if !homepage.is_empty() {
            lines.push(format!("Homepage: {homepage}"));
        }
        let licenses: Vec<&str> = hit
            .get("_source")
            .and_then(|s| s.get("package_license_set"))
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if !licenses.is_empty() {
            lines.push(format!("License: {}", licenses.join(", ")));
        }
    } else {
        lines.push(format!("Option: {}", source_str(hit, "option_name")));
        let opt_type = source_str(hit, "option_type");
        if !opt_type.is_empty() {
            lines.push(format!("Type: {opt_type}"));
        }
        let desc = strip_html(source_str(hit, "option_description"));
        if !desc.is_empty() {
            lines.push(format!("Description: {desc}"));
        }
        let default = source_str(hit, "option_default");
        if !default.is_empty() {
            lines.push(format!("Default: {default}"));
        }
        let example = source_str(hit, "option_example");
        if !example.is_empty() {
            lines.push(format!("Example: {example}"));
        }
    }
    Ok(lines.join("\n"))
}

pub async fn stats(channel: &str) -> Result<String> {
    let index = resolve_channel(channel).await?;

    let pkg_count = es_count(&index, &json!({"term": {"type": "package"}}))
        .await
        .unwrap_or(0);
    let opt_count = es_count(&index, &json!({"term": {"type": "option"}}))
        .await
        .unwrap_or(0);

    if pkg_count == 0 && opt_count == 0 {
        return Err(QueryError::InvalidInput(
            "Failed to retrieve statistics".to_string(),
        ));
    }
    Ok(format!(
        "NixOS Statistics ({channel}):\n* Packages: {}\n* Options: {}",
        crate::format::thousands(pkg_count),
        crate::format::thousands(opt_count)
    ))
}
