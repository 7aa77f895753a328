//! Path containment proofs for the store browser.
//!
//! Every `ls`/`read` target goes through [`resolve`] before any other
//! filesystem access. A [`StorePath`] can only be produced here, so holding
//! one is proof that the path was canonicalized and verified to lie under
//! both the owning input's store location and the global store root.
//!
//! Rejections are deliberately uninformative. Revealing which check failed,
//! or whether anything exists at a rejected path, would turn the sandbox
//! into an existence oracle for the rest of the filesystem.

use std::path::{Component, Path, PathBuf};

use crate::discovery::FlakeInput;
use crate::error::{BrowseError, Result};

/// An absolute path proven to lie inside the store root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePath {
    path: PathBuf,
}

impl StorePath {
    pub fn as_path(&self) -> &Path {
        &self.path
    }
}

/// Resolve `rel` against `input`'s store location and prove containment.
///
/// The checks run in two layers: a purely lexical rejection of `..`
/// segments, absolute prefixes, and NUL bytes (no filesystem access needed
/// to detect traversal attempts), then a component-by-component walk that
/// canonicalizes each step and checks it against the input's location and
/// against `store_root` before descending further. `Path::starts_with`
/// compares whole components, so `/nix/store/abc-x` is not treated as a
/// prefix of `/nix/store/abc-xyz`.
///
/// The walk order matters: containment of every existing ancestor is
/// proven before any missing entry is reported. A symlink that leaves the
/// sandbox fails as [`BrowseError::SecurityViolation`] at the symlink
/// itself, whether or not its target exists, so the error kind never
/// reflects filesystem state outside the store. [`BrowseError::NotFound`]
/// is reserved for entries missing under a parent already proven
/// in-sandbox.
pub async fn resolve(store_root: &Path, input: &FlakeInput, rel: &str) -> Result<StorePath> {
    reject_lexically(rel)?;

    let not_found = || {
        BrowseError::NotFound(format!(
            "Path not found: {} in {}",
            display_rel(rel),
            input.name
        ))
    };

    let location = tokio::fs::canonicalize(&input.store_path)
        .await
        .map_err(|_| not_found())?;
    if !location.starts_with(store_root) {
        return Err(BrowseError::SecurityViolation);
    }

    let mut current = location.clone();
    for component in Path::new(rel).components() {
        let Component::Normal(name) = component else {
            // CurDir only; everything else was rejected lexically.
            continue;
        };
        let next = current.join(name);
        match tokio::fs::canonicalize(&next).await {
            Ok(resolved) => {
                if !resolved.starts_with(&location) || !resolved.starts_with(store_root) {
                    return Err(BrowseError::SecurityViolation);
                }
                current = resolved;
            }
            Err(_) => {
                // An entry that exists but will not canonicalize is a
                // dangling symlink; its target may be anywhere, so fail
                // closed without confirming either way.
                if tokio::fs::symlink_metadata(&next).await.is_ok() {
                    return Err(BrowseError::SecurityViolation);
                }
                return Err(not_found());
            }
        }
    }

    Ok(StorePath { path: current })
}

/// Lexical fast path: no filesystem interaction, no detail in the error.
fn reject_lexically(rel: &str) -> Result<()> {
    if rel.contains('\0') {
        return Err(BrowseError::SecurityViolation);
    }
    let path = Path::new(rel);
    if path.is_absolute() {
        return Err(BrowseError::SecurityViolation);
    }
    for component in path.components() {
        match component {
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(BrowseError::SecurityViolation);
            }
            Component::Normal(_) | Component::CurDir => {}
        }
    }
    Ok(())
}

pub(crate) fn display_rel(rel: &str) -> &str {
    if rel.is_empty() {
        "/"
    } else {
        rel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(store_path: &Path) -> FlakeInput {
        FlakeInput {
            name: "nixpkgs".to_string(),
            store_path: store_path.to_path_buf(),
            group: None,
        }
    }

    #[tokio::test]
    async fn parent_segments_are_rejected_before_touching_disk() {
        // The input location does not exist, so a filesystem-dependent check
        // could not produce SECURITY_VIOLATION here.
        let missing = input(Path::new("/definitely/not/here"));
        for rel in ["../../etc/passwd", "a/../../b", "..", "a/.."] {
            let err = resolve(Path::new("/nix/store"), &missing, rel)
                .await
                .unwrap_err();
            assert_eq!(err.code(), "SECURITY_VIOLATION", "rel = {rel}");
        }
    }

    #[tokio::test]
    async fn absolute_paths_and_nul_bytes_are_rejected() {
        let missing = input(Path::new("/definitely/not/here"));
        for rel in ["/etc/passwd", "/", "a\0b"] {
            let err = resolve(Path::new("/nix/store"), &missing, rel)
                .await
                .unwrap_err();
            assert_eq!(err.code(), "SECURITY_VIOLATION", "rel = {rel:?}");
        }
    }

    #[tokio::test]
    async fn valid_paths_resolve_under_the_input_location() {
        let root = tempfile::tempdir().unwrap();
        let store_root = root.path().canonicalize().unwrap();
        let location = store_root.join("abc-src");
        std::fs::create_dir_all(location.join("lib")).unwrap();
        std::fs::write(location.join("lib/default.nix"), "{}").unwrap();

        let inp = input(&location);
        let resolved = resolve(&store_root, &inp, "lib/default.nix").await.unwrap();
        assert!(resolved.as_path().starts_with(&location));

        let dir = resolve(&store_root, &inp, "").await.unwrap();
        assert_eq!(dir.as_path(), location.as_path());
    }

    #[tokio::test]
    async fn missing_targets_inside_the_store_are_not_found() {
        let root = tempfile::tempdir().unwrap();
        let store_root = root.path().canonicalize().unwrap();
        let location = store_root.join("abc-src");
        std::fs::create_dir_all(&location).unwrap();

        let err = resolve(&store_root, &input(&location), "nope.nix")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn symlinks_escaping_the_store_are_rejected() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret"), "shh").unwrap();

        let store_root = root.path().canonicalize().unwrap();
        let location = store_root.join("abc-src");
        std::fs::create_dir_all(&location).unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret"), location.join("link")).unwrap();

        let err = resolve(&store_root, &input(&location), "link")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SECURITY_VIOLATION");
    }

    #[tokio::test]
    async fn escaping_symlinks_reveal_nothing_about_outside_targets() {
        // A directory symlink out of the store must fail identically for
        // existing and missing names behind it.
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("exists.txt"), "data").unwrap();

        let store_root = root.path().canonicalize().unwrap();
        let location = store_root.join("abc-src");
        std::fs::create_dir_all(&location).unwrap();
        std::os::unix::fs::symlink(outside.path(), location.join("link")).unwrap();

        let inp = input(&location);
        for rel in ["link", "link/exists.txt", "link/missing.txt", "link/a/b"] {
            let err = resolve(&store_root, &inp, rel).await.unwrap_err();
            assert_eq!(err.code(), "SECURITY_VIOLATION", "rel = {rel}");
        }
    }

    #[tokio::test]
    async fn dangling_symlinks_fail_closed() {
        let root = tempfile::tempdir().unwrap();
        let store_root = root.path().canonicalize().unwrap();
        let location = store_root.join("abc-src");
        std::fs::create_dir_all(&location).unwrap();
        std::os::unix::fs::symlink("/no/such/target", location.join("link")).unwrap();

        let err = resolve(&store_root, &input(&location), "link")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SECURITY_VIOLATION");
    }

    #[tokio::test]
    async fn sibling_directories_are_not_component_prefixes() {
        // /store/abc must not grant access to /store/abc-extra.
        let root = tempfile::tempdir().unwrap();
        let store_root = root.path().canonicalize().unwrap();
        let location = store_root.join("abc");
        let sibling = store_root.join("abc-extra");
        std::fs::create_dir_all(&location).unwrap();
        std::fs::create_dir_all(&sibling).unwrap();
        std::fs::write(sibling.join("file"), "data").unwrap();
        std::os::unix::fs::symlink(sibling.join("file"), location.join("link")).unwrap();

        // The symlink target is inside the store root but outside this
        // input's location, so the dependency-local layer must reject it.
        let err = resolve(&store_root, &input(&location), "link")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SECURITY_VIOLATION");
    }
}
