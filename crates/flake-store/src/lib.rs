//! Sandboxed, read-only browser over a flake's input sources in the Nix store.
//!
//! A flake's declared inputs each resolve to an immutable, content-addressed
//! directory under `/nix/store`. This crate discovers those locations by
//! invoking `nix flake archive --json`, then exposes three operations over
//! them: list the inputs, list a directory inside one, and read a text file
//! from one. Every caller-supplied path is validated by [`sandbox`] before it
//! touches the filesystem; nothing outside the store root is ever reachable.
//!
//! All state is request-scoped. The input table is rebuilt on every call so a
//! store path garbage-collected between calls can never be served stale.

pub mod browse;
pub mod discovery;
pub mod error;
pub mod inspect;
pub mod process;
pub mod sandbox;

pub use browse::{
    BrowseRequest, BrowseResult, BrowseService, DirEntryInfo, EntryKind, FlakeArchiveSource,
    InputSource, DEFAULT_STORE_ROOT,
};
pub use discovery::{FlakeInput, InputTable};
pub use error::{BrowseError, Result};
pub use inspect::{FileContent, DEFAULT_LINE_LIMIT, MAX_FILE_SIZE, MAX_LINE_LIMIT};
pub use sandbox::StorePath;

/// Human-readable size, matching `ls`/`read` header output.
pub fn format_size(size: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * 1024 * 1024;
    if size < KIB {
        format!("{size} B")
    } else if size < MIB {
        format!("{:.1} KB", size as f64 / KIB as f64)
    } else if size < GIB {
        format!("{:.1} MB", size as f64 / MIB as f64)
    } else {
        format!("{:.1} GB", size as f64 / GIB as f64)
    }
}
