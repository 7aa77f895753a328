//! End-to-end browse pipeline tests against an on-disk fixture store.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use nixscope_flake_store::{
    BrowseError, BrowseRequest, BrowseResult, BrowseService, EntryKind, InputSource, InputTable,
    Result,
};
use tempfile::TempDir;

/// Fixture-backed discovery: serves a table parsed from archive JSON,
/// rebuilt on every call like the real source.
struct StaticSource {
    archive_json: String,
}

#[async_trait]
impl InputSource for StaticSource {
    async fn discover(&self) -> Result<InputTable> {
        nixscope_flake_store::discovery::parse_archive(self.archive_json.as_bytes())
    }
}

/// A fake store root containing two inputs, one of them nested.
fn fixture() -> (TempDir, BrowseService) {
    let root = TempDir::new().expect("tempdir");
    let store_root = root.path().canonicalize().expect("canonical root");

    let nixpkgs = store_root.join("abc-nixpkgs-src");
    std::fs::create_dir_all(nixpkgs.join("lib")).unwrap();
    std::fs::write(nixpkgs.join("flake.nix"), "{ outputs = _: { }; }\n").unwrap();
    std::fs::write(nixpkgs.join("lib/default.nix"), "x: x\n").unwrap();
    std::fs::write(nixpkgs.join("logo.png"), [0x89u8, b'P', b'N', b'G', 0x00, 0x1a]).unwrap();

    let nixpkgs_lib = store_root.join("def-nixpkgs-lib");
    std::fs::create_dir_all(&nixpkgs_lib).unwrap();
    std::fs::write(nixpkgs_lib.join("lib.nix"), "{}\n").unwrap();

    let archive_json = format!(
        r#"{{"path": "{flake}", "inputs": {{
            "nixpkgs": {{"path": "{nixpkgs}"}},
            "flake-parts": {{
                "path": "{nixpkgs}",
                "inputs": {{"nixpkgs-lib": {{"path": "{lib}"}}}}
            }}
        }}}}"#,
        flake = store_root.display(),
        nixpkgs = nixpkgs.display(),
        lib = nixpkgs_lib.display(),
    );

    let service = BrowseService::with_source(Arc::new(StaticSource { archive_json }))
        .with_store_root(&store_root);
    (root, service)
}

#[tokio::test]
async fn list_reports_all_flattened_inputs() {
    let (_root, svc) = fixture();
    match svc.handle(BrowseRequest::List).await.unwrap() {
        BrowseResult::Inputs {
            inputs, suppressed, ..
        } => {
            let names: Vec<&str> = inputs.iter().map(|i| i.name.as_str()).collect();
            assert_eq!(names, ["flake-parts", "flake-parts.nixpkgs-lib", "nixpkgs"]);
            assert!(suppressed.is_empty());
        }
        other => panic!("expected Inputs, got {other:?}"),
    }
}

#[tokio::test]
async fn ls_on_a_qualified_nested_input_lists_its_root() {
    let (_root, svc) = fixture();
    let result = svc
        .handle(BrowseRequest::Ls {
            input: "flake-parts.nixpkgs-lib".to_string(),
            path: String::new(),
        })
        .await
        .unwrap();
    match result {
        BrowseResult::Listing { entries, .. } => {
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].name, "lib.nix");
            assert_eq!(entries[0].kind, EntryKind::File);
            assert_eq!(entries[0].size, Some(3));
        }
        other => panic!("expected Listing, got {other:?}"),
    }
}

#[tokio::test]
async fn ls_orders_entries_and_marks_directories() {
    let (_root, svc) = fixture();
    match svc.ls("nixpkgs", "").await.unwrap() {
        BrowseResult::Listing { entries, .. } => {
            let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
            assert_eq!(names, ["flake.nix", "lib", "logo.png"]);
            assert_eq!(entries[1].kind, EntryKind::Dir);
            assert_eq!(entries[1].size, None);
        }
        other => panic!("expected Listing, got {other:?}"),
    }
}

#[tokio::test]
async fn ls_on_a_file_is_not_a_directory() {
    let (_root, svc) = fixture();
    let err = svc.ls("nixpkgs", "flake.nix").await.unwrap_err();
    assert_eq!(err.code(), "NOT_A_DIRECTORY");
}

#[tokio::test]
async fn ls_on_an_unknown_input_names_the_alternatives() {
    let (_root, svc) = fixture();
    let err = svc.ls("nixpkg", "").await.unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
    assert!(err.to_string().contains("Available: "));
    assert!(err.to_string().contains("nixpkgs"));
}

#[tokio::test]
async fn read_returns_text_content_untruncated() {
    let (_root, svc) = fixture();
    match svc.read("nixpkgs", "flake.nix", 2000).await.unwrap() {
        BrowseResult::FileContent { content, .. } => {
            assert_eq!(content.lines, ["{ outputs = _: { }; }"]);
            assert!(!content.truncated);
            assert_eq!(content.total_lines, 1);
        }
        other => panic!("expected FileContent, got {other:?}"),
    }
}

#[tokio::test]
async fn read_truncates_beyond_the_line_limit() {
    let (root, svc) = fixture();
    let store_root = root.path().canonicalize().unwrap();
    let body: String = (1..=12).map(|i| format!("line {i}\n")).collect();
    std::fs::write(store_root.join("abc-nixpkgs-src/long.txt"), body).unwrap();

    // Exactly at the limit: everything fits, not truncated.
    match svc.read("nixpkgs", "long.txt", 12).await.unwrap() {
        BrowseResult::FileContent { content, .. } => {
            assert_eq!(content.lines.len(), 12);
            assert!(!content.truncated);
        }
        other => panic!("expected FileContent, got {other:?}"),
    }

    // One below: truncated, with exactly `limit` lines returned.
    match svc.read("nixpkgs", "long.txt", 11).await.unwrap() {
        BrowseResult::FileContent { content, .. } => {
            assert_eq!(content.lines.len(), 11);
            assert!(content.truncated);
            assert_eq!(content.total_lines, 12);
        }
        other => panic!("expected FileContent, got {other:?}"),
    }
}

#[tokio::test]
async fn read_refuses_binary_files() {
    let (_root, svc) = fixture();
    let err = svc.read("nixpkgs", "logo.png", 100).await.unwrap_err();
    assert_eq!(err.code(), "BINARY_FILE");
}

#[tokio::test]
async fn read_refuses_oversized_files() {
    let (root, svc) = fixture();
    let store_root = root.path().canonicalize().unwrap();
    let big = vec![b'a'; (nixscope_flake_store::MAX_FILE_SIZE + 1) as usize];
    std::fs::write(store_root.join("abc-nixpkgs-src/big.txt"), big).unwrap();

    let err = svc.read("nixpkgs", "big.txt", 100).await.unwrap_err();
    assert_eq!(err.code(), "FILE_TOO_LARGE");
}

#[tokio::test]
async fn read_on_a_directory_is_not_a_file() {
    let (_root, svc) = fixture();
    let err = svc.read("nixpkgs", "lib", 100).await.unwrap_err();
    assert_eq!(err.code(), "NOT_A_FILE");
}

#[tokio::test]
async fn traversal_attempts_are_security_violations_not_io_errors() {
    let (_root, svc) = fixture();
    let err = svc.read("nixpkgs", "../../etc/passwd", 10).await.unwrap_err();
    assert!(matches!(err, BrowseError::SecurityViolation));
    // The message must not reveal filesystem state or the failing check.
    assert_eq!(err.render(), "Error (SECURITY_VIOLATION): Invalid path: path not permitted");
}

#[tokio::test]
async fn missing_files_inside_an_input_are_not_found() {
    let (_root, svc) = fixture();
    let err = svc.read("nixpkgs", "no-such.nix", 10).await.unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
    assert!(err.to_string().contains("File not found: no-such.nix in nixpkgs"));
}
