//! Plain-text surface over the flake-store browser.
//!
//! Queries use the `input` or `input:path` shape from the tool contract;
//! results and errors render as text the same way the web sources do.

use nixscope_flake_store::{
    format_size, BrowseRequest, BrowseResult, BrowseService, EntryKind,
};

/// Split `input[:path]`, dropping any leading slashes on the path side.
fn parse_query(query: &str) -> (&str, &str) {
    match query.split_once(':') {
        Some((input, path)) => (input, path.trim_start_matches('/')),
        None => (query, ""),
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

pub async fn list(service: &BrowseService) -> String {
    match service.handle(BrowseRequest::List).await {
        Ok(BrowseResult::Inputs {
            flake_path,
            inputs,
            suppressed,
        }) => {
            if inputs.is_empty() {
                return "No inputs found for this flake.".to_string();
            }
            let mut lines = vec![format!("Flake inputs ({} found):", inputs.len())];
            if let Some(path) = flake_path {
                lines.push(format!("Flake path: {}", path.display()));
            }
            lines.push(String::new());

            let mut sorted = inputs;
            sorted.sort_by(|a, b| a.name.cmp(&b.name));
            for input in &sorted {
                lines.push(format!("* {}", input.name));
                lines.push(format!("  {}", input.store_path.display()));
                lines.push(String::new());
            }
            for (key, qualified) in &suppressed {
                lines.push(format!("Note: '{key}' is ambiguous; use '{qualified}'"));
            }
            lines.join("\n").trim().to_string()
        }
        Ok(_) => unreachable!("list request yields an inputs result"),
        Err(err) => err.render(),
    }
}

pub async fn ls(service: &BrowseService, query: &str) -> String {
    let (input, path) = parse_query(query);
    let request = BrowseRequest::Ls {
        input: input.to_string(),
        path: path.to_string(),
    };
    match service.handle(request).await {
        Ok(BrowseResult::Listing { input, path, entries }) => {
            if entries.is_empty() {
                return format!(
                    "Directory '{}' in {input} is empty.",
                    display_path(&path)
                );
            }
            let dirs = entries
                .iter()
                .filter(|e| e.kind == EntryKind::Dir)
                .count();
            let files = entries.len() - dirs;
            let display = if path.is_empty() {
                input
            } else {
                format!("{input}:{path}")
            };
            let mut lines = vec![
                format!("Contents of {display} ({dirs} dirs, {files} files):"),
                String::new(),
            ];
            for entry in entries.iter().filter(|e| e.kind == EntryKind::Dir) {
                lines.push(format!("  {}/", entry.name));
            }
            for entry in entries.iter().filter(|e| e.kind == EntryKind::File) {
                match entry.size {
                    Some(size) => lines.push(format!("  {} ({})", entry.name, format_size(size))),
                    None => lines.push(format!("  {}", entry.name)),
                }
            }
            lines.join("\n")
        }
        Ok(_) => unreachable!("ls request yields a listing result"),
        Err(err) => err.render(),
    }
}

pub async fn read(service: &BrowseService, query: &str, limit: usize) -> String {
    if !query.contains(':') {
        return nixscope_flake_store::BrowseError::InvalidInput(
            "Read requires 'input:path' format (e.g., 'nixpkgs:flake.nix')".to_string(),
        )
        .render();
    }
    let (input, path) = parse_query(query);
    let request = BrowseRequest::Read {
        input: input.to_string(),
        path: path.to_string(),
        limit,
    };
    match service.handle(request).await {
        Ok(BrowseResult::FileContent { input, path, content }) => {
            let mut lines = vec![
                format!("File: {input}:{path}"),
                format!("Size: {}", format_size(content.size)),
                String::new(),
            ];
            if content.truncated {
                lines.push(format!(
                    "(Showing {} of {} lines)",
                    content.lines.len(),
                    content.total_lines
                ));
                lines.push(String::new());
            }
            lines.extend(content.lines);
            lines.join("\n")
        }
        Ok(_) => unreachable!("read request yields file content"),
        Err(err) => err.render(),
    }
}
