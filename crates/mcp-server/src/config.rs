//! Endpoints, credentials, and limits for the query modules.

/// search.nixos.org Elasticsearch backend. The credentials are the public
/// read-only pair shipped in the official frontend.
pub const NIXOS_API: &str = "https://search.nixos.org/backend";
pub const NIXOS_AUTH_USER: &str = "aWVSALXpZv";
pub const NIXOS_AUTH_PASS: &str = "X8gPHnzL52wFEekuxsfQ9cSh";

/// Static channel mappings used when index discovery finds nothing.
pub const FALLBACK_CHANNELS: &[(&str, &str)] = &[
    ("unstable", "latest-44-nixos-unstable"),
    ("stable", "latest-44-nixos-25.11"),
    ("25.05", "latest-44-nixos-25.05"),
    ("25.11", "latest-44-nixos-25.11"),
    ("beta", "latest-44-nixos-25.11"),
];

/// Index generations and release versions probed during channel discovery.
pub const CHANNEL_GENERATIONS: &[u32] = &[43, 44, 45, 46];
pub const CHANNEL_VERSIONS: &[&str] = &["unstable", "25.05", "25.11", "26.05", "26.11"];

/// Flake packages live in a shared "group-manual" index, not per-channel ones.
pub const FLAKE_INDEX: &str = "latest-44-group-manual";

/// NixHub (search.devbox.sh) package metadata API.
pub const NIXHUB_API: &str = "https://search.devbox.sh";

/// Binary cache probed for narinfo presence.
pub const CACHE_NIXOS_ORG: &str = "https://cache.nixos.org";

pub const USER_AGENT: &str = concat!("nixscope-mcp/", env!("CARGO_PKG_VERSION"));

/// Source names the `nix` tool recognizes; anything else passed as `source`
/// for `action=flake-inputs` is treated as a flake directory.
pub const KNOWN_SOURCES: &[&str] = &[
    "nixos",
    "home-manager",
    "darwin",
    "flakes",
    "flakehub",
    "nixvim",
    "wiki",
    "nix-dev",
    "noogle",
    "nixhub",
];

/// Sources actually served by this build. The remainder of
/// [`KNOWN_SOURCES`] needs an HTML scraper and is rejected with a pointer
/// to these.
pub const SUPPORTED_SOURCES: &[&str] = &["nixos", "flakes", "nixhub"];

/// `nix` tool limit bounds for everything except flake-inputs read.
pub const MAX_QUERY_LIMIT: usize = 100;
pub const DEFAULT_QUERY_LIMIT: usize = 20;
