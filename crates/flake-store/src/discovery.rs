//! Discovery of a flake's inputs and their store locations.
//!
//! `nix flake archive --json` reports the flake's inputs as a nested tree:
//! each input has a resolved store `path` and possibly its own `inputs`.
//! The tree is flattened pre-order into a flat table so a transitively
//! declared input stays addressable: every node is keyed by its qualified
//! dotted name (`flake-parts.nixpkgs-lib`), and its bare local name is added
//! as an alias when no earlier node claimed it. First discovery wins on
//! collisions; the losing key is recorded rather than silently dropped.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{BrowseError, Result};
use crate::process;

#[derive(Debug, Deserialize)]
struct ArchiveNode {
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    inputs: BTreeMap<String, ArchiveNode>,
}

/// One discovered flake input.
#[derive(Debug, Clone)]
pub struct FlakeInput {
    /// Qualified dotted name, unique within the table.
    pub name: String,
    /// Resolved location under the store root.
    pub store_path: PathBuf,
    /// Qualified name of the declaring input, `None` for top-level inputs.
    pub group: Option<String>,
}

/// Flat, ordered table of discovered inputs. Built fresh per request;
/// never cached across calls.
#[derive(Debug, Default)]
pub struct InputTable {
    entries: Vec<FlakeInput>,
    index: HashMap<String, usize>,
    /// `(key, qualified name of the input that lost it)` for every flattening
    /// collision, so nothing is silently dropped.
    suppressed: Vec<(String, String)>,
    flake_path: Option<PathBuf>,
}

impl InputTable {
    /// Look up an input by qualified name or local-name alias.
    pub fn get(&self, name: &str) -> Option<&FlakeInput> {
        self.index.get(name).map(|&idx| &self.entries[idx])
    }

    /// Inputs in discovery (pre-order) order, one entry per input.
    pub fn inputs(&self) -> impl Iterator<Item = &FlakeInput> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys that collided with an earlier discovery and were not inserted.
    pub fn suppressed(&self) -> &[(String, String)] {
        &self.suppressed
    }

    /// The flake's own store path, when the archive output reported one.
    pub fn flake_path(&self) -> Option<&Path> {
        self.flake_path.as_deref()
    }

    /// First `limit` addressable names, sorted, for "did you mean" output.
    pub fn available_names(&self, limit: usize) -> (Vec<String>, usize) {
        let mut names: Vec<String> = self.entries.iter().map(|i| i.name.clone()).collect();
        names.sort();
        let total = names.len();
        names.truncate(limit);
        (names, total)
    }

    fn insert(&mut self, key: &str, entry_idx: usize) {
        if self.index.contains_key(key) {
            let hidden = self.entries[entry_idx].name.clone();
            self.suppressed.push((key.to_string(), hidden));
        } else {
            self.index.insert(key.to_string(), entry_idx);
        }
    }

    fn add(&mut self, name: String, store_path: PathBuf, group: Option<String>) {
        let idx = self.entries.len();
        self.entries.push(FlakeInput {
            name: name.clone(),
            store_path,
            group,
        });
        self.insert(&name, idx);
    }

    /// Second flattening pass: expose each nested input under its bare local
    /// name where that key is still free. Qualified names were all claimed in
    /// the first pass, so a top-level input always owns its own name and ties
    /// between nested inputs go to the first one discovered.
    fn add_local_aliases(&mut self) {
        for idx in 0..self.entries.len() {
            let entry = &self.entries[idx];
            if entry.group.is_none() {
                continue;
            }
            let local = match entry.name.rsplit('.').next() {
                Some(local) => local.to_string(),
                None => continue,
            };
            self.insert(&local, idx);
        }
    }
}

/// Parse `nix flake archive --json` output into an [`InputTable`].
/// Empty input sets are valid; malformed JSON is a tool failure.
pub fn parse_archive(stdout: &[u8]) -> Result<InputTable> {
    let root: ArchiveNode = serde_json::from_slice(stdout).map_err(|err| {
        BrowseError::ToolFailed(format!("Failed to parse flake archive output: {err}"))
    })?;

    let mut table = InputTable {
        flake_path: root.path.clone(),
        ..InputTable::default()
    };
    flatten_into(&mut table, &root, None);
    table.add_local_aliases();
    Ok(table)
}

fn flatten_into(table: &mut InputTable, node: &ArchiveNode, prefix: Option<&str>) {
    for (name, child) in &node.inputs {
        let qualified = match prefix {
            Some(prefix) => format!("{prefix}.{name}"),
            None => name.clone(),
        };
        if let Some(path) = &child.path {
            table.add(qualified.clone(), path.clone(), prefix.map(str::to_string));
        }
        flatten_into(table, child, Some(&qualified));
    }
}

/// Run discovery for the flake at `flake_dir`.
pub async fn discover(flake_dir: &Path, timeout: Duration) -> Result<InputTable> {
    if !flake_dir.join("flake.nix").is_file() {
        return Err(BrowseError::InvalidInput(format!(
            "Not a flake directory: {} (no flake.nix found)",
            flake_dir.display()
        )));
    }

    let stdout = process::run_nix(&["flake", "archive", "--json"], Some(flake_dir), timeout).await?;
    parse_archive(&stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(json: &str) -> InputTable {
        parse_archive(json.as_bytes()).expect("valid archive json")
    }

    #[test]
    fn empty_inputs_are_a_valid_result() {
        let t = table(r#"{"path": "/nix/store/abc-src", "inputs": {}}"#);
        assert!(t.is_empty());
        assert_eq!(t.flake_path(), Some(Path::new("/nix/store/abc-src")));
    }

    #[test]
    fn simple_inputs_flatten_to_their_own_names() {
        let t = table(
            r#"{"inputs": {
                "nixpkgs": {"path": "/nix/store/abc"},
                "flake-utils": {"path": "/nix/store/def"}
            }}"#,
        );
        assert_eq!(t.len(), 2);
        assert_eq!(t.get("nixpkgs").unwrap().store_path, PathBuf::from("/nix/store/abc"));
        assert_eq!(t.get("flake-utils").unwrap().store_path, PathBuf::from("/nix/store/def"));
    }

    #[test]
    fn nested_inputs_get_qualified_names_and_local_aliases() {
        let t = table(
            r#"{"inputs": {
                "nixpkgs": {"path": "/nix/store/abc"},
                "flake-parts": {
                    "path": "/nix/store/ghi",
                    "inputs": {"nixpkgs-lib": {"path": "/nix/store/def"}}
                }
            }}"#,
        );
        let qualified = t.get("flake-parts.nixpkgs-lib").unwrap();
        assert_eq!(qualified.store_path, PathBuf::from("/nix/store/def"));
        assert_eq!(qualified.group.as_deref(), Some("flake-parts"));
        // The nested input is also reachable by its unambiguous local name.
        assert_eq!(t.get("nixpkgs-lib").unwrap().name, "flake-parts.nixpkgs-lib");
        assert!(t.suppressed().is_empty());
    }

    #[test]
    fn deeply_nested_inputs_keep_the_full_chain() {
        let t = table(
            r#"{"inputs": {
                "a": {
                    "path": "/nix/store/a",
                    "inputs": {"b": {
                        "path": "/nix/store/b",
                        "inputs": {"c": {"path": "/nix/store/c"}}
                    }}
                }
            }}"#,
        );
        assert_eq!(t.get("a.b.c").unwrap().store_path, PathBuf::from("/nix/store/c"));
        assert_eq!(t.get("c").unwrap().name, "a.b.c");
    }

    #[test]
    fn top_level_names_beat_nested_aliases() {
        let t = table(
            r#"{"inputs": {
                "home-manager": {
                    "path": "/nix/store/hm",
                    "inputs": {"nixpkgs": {"path": "/nix/store/other"}}
                },
                "nixpkgs": {"path": "/nix/store/abc"}
            }}"#,
        );
        assert_eq!(t.get("nixpkgs").unwrap().store_path, PathBuf::from("/nix/store/abc"));
        // The nested input stays reachable by its qualified name, and the
        // lost alias is recorded instead of silently dropped.
        assert_eq!(
            t.get("home-manager.nixpkgs").unwrap().store_path,
            PathBuf::from("/nix/store/other")
        );
        assert_eq!(
            t.suppressed(),
            [("nixpkgs".to_string(), "home-manager.nixpkgs".to_string())]
        );
    }

    #[test]
    fn alias_ties_between_nested_inputs_go_to_the_first_discovered() {
        let t = table(
            r#"{"inputs": {
                "alpha": {
                    "path": "/nix/store/a",
                    "inputs": {"shared": {"path": "/nix/store/s1"}}
                },
                "beta": {
                    "path": "/nix/store/b",
                    "inputs": {"shared": {"path": "/nix/store/s2"}}
                }
            }}"#,
        );
        assert_eq!(t.get("shared").unwrap().name, "alpha.shared");
        assert_eq!(
            t.suppressed(),
            [("shared".to_string(), "beta.shared".to_string())]
        );
    }

    #[test]
    fn flattening_is_idempotent() {
        let json = r#"{"inputs": {
            "nixpkgs": {"path": "/nix/store/abc"},
            "flake-parts": {
                "path": "/nix/store/ghi",
                "inputs": {"nixpkgs-lib": {"path": "/nix/store/def"}}
            }
        }}"#;
        let a = table(json);
        let b = table(json);
        let names_a: Vec<_> = a.inputs().map(|i| (&i.name, &i.store_path)).collect();
        let names_b: Vec<_> = b.inputs().map(|i| (&i.name, &i.store_path)).collect();
        assert_eq!(names_a, names_b);
    }

    #[test]
    fn malformed_json_is_a_tool_failure() {
        let err = parse_archive(b"not json").unwrap_err();
        assert_eq!(err.code(), "DEPENDENCY_TOOL_FAILED");
    }

    #[test]
    fn nodes_without_paths_are_skipped_but_children_kept() {
        let t = table(
            r#"{"inputs": {
                "follows-only": {"inputs": {"real": {"path": "/nix/store/r"}}}
            }}"#,
        );
        assert!(t.get("follows-only").is_none());
        assert_eq!(t.get("follows-only.real").unwrap().store_path, PathBuf::from("/nix/store/r"));
    }
}
