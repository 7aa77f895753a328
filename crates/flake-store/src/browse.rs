//! The public operation surface: list inputs, list a directory, read a file.
//!
//! Each request is one linear pipeline: validate shape, discover inputs,
//! sandbox-resolve the target, perform the filesystem op, classify the
//! result. Any failure short-circuits to a typed [`BrowseError`]; no stage
//! retries and nothing persists between requests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::discovery::{self, FlakeInput, InputTable};
use crate::error::{BrowseError, Result};
use crate::inspect::{self, FileContent};
use crate::sandbox::{self, display_rel};

/// Default location of the trusted store root.
pub const DEFAULT_STORE_ROOT: &str = "/nix/store";
/// Wall-clock limit for one discovery run.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Names shown alongside an unknown-input error.
const SUGGESTION_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseRequest {
    List,
    Ls { input: String, path: String },
    Read { input: String, path: String, limit: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub kind: EntryKind,
    /// `None` for directories and for entries whose metadata was unreadable.
    pub size: Option<u64>,
}

#[derive(Debug, Clone)]
pub enum BrowseResult {
    Inputs {
        flake_path: Option<PathBuf>,
        inputs: Vec<FlakeInput>,
        /// Flattening collisions: `(key, qualified name it would have named)`.
        suppressed: Vec<(String, String)>,
    },
    Listing {
        input: String,
        path: String,
        entries: Vec<DirEntryInfo>,
    },
    FileContent {
        input: String,
        path: String,
        content: FileContent,
    },
}

/// Where the input table comes from. The production source shells out to
/// `nix flake archive`; tests substitute a fixture-backed source.
#[async_trait]
pub trait InputSource: Send + Sync {
    async fn discover(&self) -> Result<InputTable>;
}

/// Discovery via `nix flake archive --json` in a flake directory.
pub struct FlakeArchiveSource {
    flake_dir: PathBuf,
    timeout: Duration,
}

impl FlakeArchiveSource {
    pub fn new(flake_dir: impl Into<PathBuf>) -> Self {
        Self {
            flake_dir: flake_dir.into(),
            timeout: DISCOVERY_TIMEOUT,
        }
    }
}

#[async_trait]
impl InputSource for FlakeArchiveSource {
    async fn discover(&self) -> Result<InputTable> {
        discovery::discover(&self.flake_dir, self.timeout).await
    }
}

/// Stateless browser over one flake's inputs. Holds only configuration;
/// the input table is rebuilt for every request so no call can observe a
/// store path that was garbage-collected after an earlier call.
#[derive(Clone)]
pub struct BrowseService {
    source: Arc<dyn InputSource>,
    store_root: PathBuf,
}

impl BrowseService {
    pub fn new(flake_dir: impl Into<PathBuf>) -> Self {
        Self::with_source(Arc::new(FlakeArchiveSource::new(flake_dir)))
    }

    pub fn with_source(source: Arc<dyn InputSource>) -> Self {
        Self {
            source,
            store_root: canonical_root(PathBuf::from(DEFAULT_STORE_ROOT)),
        }
    }

    /// Override the trusted store root. Store roots other than the real one
    /// only make sense for tests against fixture trees.
    pub fn with_store_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.store_root = canonical_root(root.into());
        self
    }

    pub async fn handle(&self, request: BrowseRequest) -> Result<BrowseResult> {
        match request {
            BrowseRequest::List => self.list().await,
            BrowseRequest::Ls { input, path } => self.ls(&input, &path).await,
            BrowseRequest::Read { input, path, limit } => self.read(&input, &path, limit).await,
        }
    }

    pub async fn list(&self) -> Result<BrowseResult> {
        let table = self.discover().await?;
        Ok(BrowseResult::Inputs {
            flake_path: table.flake_path().map(Path::to_path_buf),
            inputs: table.inputs().cloned().collect(),
            suppressed: table.suppressed().to_vec(),
        })
    }

    pub async fn ls(&self, input_name: &str, rel: &str) -> Result<BrowseResult> {
        let table = self.discover().await?;
        let input = lookup(&table, input_name)?;
        let resolved = sandbox::resolve(&self.store_root, input, rel).await?;

        let meta = tokio::fs::metadata(resolved.as_path()).await?;
        if !meta.is_dir() {
            return Err(BrowseError::NotADirectory(format!(
                "{} in {}",
                display_rel(rel),
                input.name
            )));
        }

        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(resolved.as_path()).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            match entry.metadata().await {
                Ok(meta) if meta.is_dir() => entries.push(DirEntryInfo {
                    name,
                    kind: EntryKind::Dir,
                    size: None,
                }),
                Ok(meta) => entries.push(DirEntryInfo {
                    name,
                    kind: EntryKind::File,
                    size: Some(meta.len()),
                }),
                Err(_) => entries.push(DirEntryInfo {
                    name,
                    kind: EntryKind::File,
                    size: None,
                }),
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(BrowseResult::Listing {
            input: input.name.clone(),
            path: rel.to_string(),
            entries,
        })
    }

    pub async fn read(&self, input_name: &str, rel: &str, limit: usize) -> Result<BrowseResult> {
        if rel.is_empty() {
            return Err(BrowseError::InvalidInput(
                "File path required (e.g., 'nixpkgs:flake.nix')".to_string(),
            ));
        }

        let table = self.discover().await?;
        let input = lookup(&table, input_name)?;
        let resolved = sandbox::resolve(&self.store_root, input, rel)
            .await
            .map_err(|err| match err {
                BrowseError::NotFound(_) => {
                    BrowseError::NotFound(format!("File not found: {} in {}", rel, input_name))
                }
                other => other,
            })?;

        let meta = tokio::fs::metadata(resolved.as_path()).await?;
        if meta.is_dir() {
            return Err(BrowseError::NotAFile(rel.to_string()));
        }

        let content = inspect::inspect(&resolved, rel, limit).await?;
        Ok(BrowseResult::FileContent {
            input: input.name.clone(),
            path: rel.to_string(),
            content,
        })
    }

    async fn discover(&self) -> Result<InputTable> {
        self.source.discover().await
    }
}

/// The store root itself may be reached through a symlink; containment
/// checks compare canonical paths, so store the resolved form. A root that
/// does not exist is kept as configured and fails at resolve time.
fn canonical_root(root: PathBuf) -> PathBuf {
    std::fs::canonicalize(&root).unwrap_or(root)
}

fn lookup<'t>(table: &'t InputTable, name: &str) -> Result<&'t FlakeInput> {
    table.get(name).ok_or_else(|| {
        let (names, total) = table.available_names(SUGGESTION_LIMIT);
        let mut available = names.join(", ");
        if total > SUGGESTION_LIMIT {
            available.push_str(&format!(" ... and {} more", total - SUGGESTION_LIMIT));
        }
        BrowseError::NotFound(format!("Input '{name}' not found. Available: {available}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_with_empty_path_is_invalid_input() {
        let svc = BrowseService::new("/tmp/nowhere");
        let err = svc.read("nixpkgs", "", 10).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn store_root_symlinks_are_resolved_up_front() {
        let real = tempfile::tempdir().unwrap();
        let parent = tempfile::tempdir().unwrap();
        let link = parent.path().join("store");
        std::os::unix::fs::symlink(real.path(), &link).unwrap();

        let svc = BrowseService::new(".").with_store_root(link);
        assert_eq!(svc.store_root, real.path().canonicalize().unwrap());
    }

    #[tokio::test]
    async fn non_flake_directory_is_rejected_before_running_nix() {
        let dir = tempfile::tempdir().unwrap();
        let svc = BrowseService::new(dir.path());
        let err = svc.list().await.unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
        assert!(err.to_string().contains("no flake.nix found"));
    }
}
