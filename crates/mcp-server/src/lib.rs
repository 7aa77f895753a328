//! MCP server front-end for nixscope.
//!
//! The binary in `main.rs` serves [`tools::NixscopeService`] over stdio;
//! everything else here is the dispatch layer, the web-API query modules,
//! and plain-text formatting.

pub mod channels;
pub mod config;
pub mod error;
pub mod flake;
pub mod format;
pub mod sources;
pub mod tools;
