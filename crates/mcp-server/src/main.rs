//! nixscope MCP Server
//!
//! Answers Nix ecosystem queries for AI agents over the MCP protocol:
//! package/option search via search.nixos.org, version history via NixHub,
//! binary-cache status via cache.nixos.org, and sandboxed browsing of a
//! local flake's input sources in the Nix store.
//!
//! ## Tools
//!
//! - `nix` - search/info/stats/channels/flake-inputs/cache in one action-based tool
//! - `nix_versions` - package version history from NixHub.io
//!
//! ## Usage
//!
//! Add to your MCP client configuration:
//! ```json
//! {
//!   "mcpServers": {
//!     "nixscope": {
//!       "command": "nixscope-mcp"
//!     }
//!   }
//! }
//! ```

use anyhow::Result;
use rmcp::transport::stdio;
use rmcp::ServiceExt;

use nixscope_mcp::tools::NixscopeService;

#[tokio::main]
async fn main() -> Result<()> {
    // Configure logging to stderr only (stdout is for MCP protocol)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    log::info!("Starting nixscope MCP server");

    let service = NixscopeService::new();
    let server = service.serve(stdio()).await?;

    server.waiting().await?;

    log::info!("nixscope MCP server stopped");
    Ok(())
}
