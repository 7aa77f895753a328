//! MCP tool surface: the `nix` dispatch tool and `nix_versions`.
//!
//! Every tool returns plain text. Failures render as `Error (CODE): message`
//! inside a normal text result so agents always get something quotable.

use once_cell::sync::Lazy;
use regex::Regex;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::schemars;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::Deserialize;

use nixscope_flake_store::{BrowseService, DEFAULT_LINE_LIMIT, MAX_LINE_LIMIT};

use crate::channels;
use crate::config::{DEFAULT_QUERY_LIMIT, KNOWN_SOURCES, MAX_QUERY_LIMIT, SUPPORTED_SOURCES};
use crate::flake;
use crate::format::error;
use crate::sources::{cache_status, flakes, nixhub, nixos};

static PACKAGE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9\-_.]+$").expect("regex for package names"));

fn default_source() -> String {
    "nixos".to_string()
}

fn default_type() -> String {
    "packages".to_string()
}

fn default_channel() -> String {
    "unstable".to_string()
}

fn default_limit() -> usize {
    DEFAULT_QUERY_LIMIT
}

fn default_version() -> String {
    "latest".to_string()
}

fn default_versions_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct NixRequest {
    #[schemars(description = "search|info|stats|channels|flake-inputs|cache")]
    pub action: String,

    /// Search term, name, or `input[:path]` for flake-inputs.
    #[schemars(description = "Search term, name, or prefix. For flake-inputs: input_name or input:path")]
    #[serde(default)]
    pub query: String,

    /// Data source, or a flake directory for flake-inputs.
    #[schemars(description = "nixos|flakes|nixhub (or a flake directory for flake-inputs)")]
    #[serde(default = "default_source")]
    pub source: String,

    #[schemars(description = "packages|options|programs|list|ls|read")]
    #[serde(default = "default_type", rename = "type")]
    pub query_type: String,

    #[schemars(description = "unstable|stable|25.05")]
    #[serde(default = "default_channel")]
    pub channel: String,

    #[schemars(description = "1-100 (or 1-2000 for flake-inputs read)")]
    #[serde(default = "default_limit")]
    pub limit: usize,

    #[schemars(description = "Version for cache action (default: latest)")]
    #[serde(default = "default_version")]
    pub version: String,

    #[schemars(description = "System for cache action (e.g., x86_64-linux). Empty for all.")]
    #[serde(default)]
    pub system: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct NixVersionsRequest {
    #[schemars(description = "Package name")]
    pub package: String,

    #[schemars(description = "Specific version to find")]
    #[serde(default)]
    pub version: String,

    #[schemars(description = "1-50")]
    #[serde(default = "default_versions_limit")]
    pub limit: usize,
}

#[derive(Clone)]
pub struct NixscopeService {
    tool_router: ToolRouter<Self>,
}

impl NixscopeService {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }
}

impl Default for NixscopeService {
    fn default() -> Self {
        Self::new()
    }
}

fn text(body: String) -> CallToolResult {
    CallToolResult::success(vec![Content::text(body)])
}

fn rendered(result: crate::error::Result<String>) -> String {
    result.unwrap_or_else(|err| err.render())
}

/// `Error (ERROR): Source '{source}' ...` for sources this server knows of
/// but does not serve.
fn unsupported_source(source: &str) -> String {
    error(&format!(
        "Source '{source}' is not supported. Supported sources: {}",
        SUPPORTED_SOURCES.join(", ")
    ))
}

async fn dispatch_nix(request: NixRequest) -> String {
    let NixRequest {
        action,
        query,
        source,
        query_type,
        channel,
        limit,
        version,
        system,
    } = request;

    // flake-inputs read pages by line, everything else by result count.
    if action == "flake-inputs" && query_type == "read" {
        if !(1..=MAX_LINE_LIMIT).contains(&limit) {
            return error(&format!("Limit must be 1-{MAX_LINE_LIMIT} for flake-inputs read"));
        }
    } else if !(1..=MAX_QUERY_LIMIT).contains(&limit) {
        return error(&format!("Limit must be 1-{MAX_QUERY_LIMIT}"));
    }

    match action.as_str() {
        "search" => {
            if query.is_empty() {
                return error("Query required for search");
            }
            match source.as_str() {
                "nixos" => {
                    let search_type = match query_type.as_str() {
                        "packages" => nixos::SearchType::Packages,
                        "options" => nixos::SearchType::Options,
                        "programs" => nixos::SearchType::Programs,
                        "flakes" => return rendered(flakes::search(&query, limit).await),
                        _ => return error("Type must be packages|options|programs|flakes"),
                    };
                    rendered(nixos::search(&query, search_type, limit, &channel).await)
                }
                "flakes" => rendered(flakes::search(&query, limit).await),
                "nixhub" => rendered(nixhub::search(&query, limit).await),
                s if KNOWN_SOURCES.contains(&s) => unsupported_source(s),
                _ => error("Source must be nixos|flakes|nixhub"),
            }
        }

        "info" => {
            if query.is_empty() {
                return error("Name required for info");
            }
            match source.as_str() {
                "nixos" => {
                    let is_package = match query_type.as_str() {
                        "package" | "packages" => true,
                        "option" | "options" => false,
                        _ => return error("Type must be package|option"),
                    };
                    rendered(nixos::info(&query, is_package, &channel).await)
                }
                "nixhub" => rendered(nixhub::info(&query).await),
                "flakes" => error("Info not available for flakes. Use search to find flakes."),
                s if KNOWN_SOURCES.contains(&s) => unsupported_source(s),
                _ => error("Source must be nixos|flakes|nixhub"),
            }
        }

        "stats" => match source.as_str() {
            "nixos" => rendered(nixos::stats(&channel).await),
            "flakes" => rendered(flakes::stats().await),
            "nixhub" => error("Stats not available for nixhub"),
            s if KNOWN_SOURCES.contains(&s) => unsupported_source(s),
            _ => error("Source must be nixos|flakes|nixhub"),
        },

        "options" => error(&format!(
            "Options browsing is not supported. Supported sources: {}",
            SUPPORTED_SOURCES.join(", ")
        )),

        "channels" => channels::list_channels().await,

        "flake-inputs" => {
            // Anything that is not a known source name is a flake directory.
            let flake_dir = if KNOWN_SOURCES.contains(&source.as_str()) {
                "."
            } else {
                source.as_str()
            };
            let service = BrowseService::new(flake_dir);

            // "packages" is the tool-wide default type and doubles as "list".
            match query_type.as_str() {
                "list" | "packages" => flake::list(&service).await,
                "ls" => {
                    if query.is_empty() {
                        return error("Query required for ls (input name or input:path)");
                    }
                    flake::ls(&service, &query).await
                }
                "read" => {
                    if query.is_empty() {
                        return error("Query required for read (input:path format)");
                    }
                    let read_limit = if limit == DEFAULT_QUERY_LIMIT {
                        DEFAULT_LINE_LIMIT
                    } else {
                        limit.min(MAX_LINE_LIMIT)
                    };
                    flake::read(&service, &query, read_limit).await
                }
                _ => error("Type must be list|ls|read for flake-inputs"),
            }
        }

        "cache" => {
            if query.is_empty() {
                return error("Package name required for cache action");
            }
            rendered(cache_status::check(&query, &version, &system).await)
        }

        _ => error("Action must be search|info|stats|options|channels|flake-inputs|cache"),
    }
}

async fn dispatch_nix_versions(request: NixVersionsRequest) -> String {
    let NixVersionsRequest {
        package,
        version,
        limit,
    } = request;

    if package.trim().is_empty() {
        return error("Package name required");
    }
    if !PACKAGE_NAME_RE.is_match(&package) {
        return error("Invalid package name");
    }
    if !(1..=50).contains(&limit) {
        return error("Limit must be 1-50");
    }
    rendered(nixhub::versions(&package, &version, limit).await)
}

#[tool_router]
impl NixscopeService {
    /// Package/option search, flake discovery, and local flake-input browsing.
    #[tool(
        description = "Query NixOS packages, options, and programs, community flakes, NixHub version data, binary cache status, or browse local flake inputs in the nix store (flake-inputs with type=list|ls|read)."
    )]
    pub async fn nix(
        &self,
        Parameters(request): Parameters<NixRequest>,
    ) -> std::result::Result<CallToolResult, McpError> {
        Ok(text(dispatch_nix(request).await))
    }

    /// Version history for a package, from NixHub.
    #[tool(description = "Get package version history from NixHub.io.")]
    pub async fn nix_versions(
        &self,
        Parameters(request): Parameters<NixVersionsRequest>,
    ) -> std::result::Result<CallToolResult, McpError> {
        Ok(text(dispatch_nix_versions(request).await))
    }
}

#[tool_handler]
impl ServerHandler for NixscopeService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Nixscope answers NixOS questions from live data. Use action='search' for \
                 packages/options/programs, action='info' for details, action='flake-inputs' \
                 with type=list|ls|read to browse flake input sources in the nix store, and \
                 nix_versions for package version history."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}
