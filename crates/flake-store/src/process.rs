//! Async invocation of the `nix` command-line tool.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{BrowseError, Result};

/// How much of stderr is surfaced when the tool fails.
const STDERR_EXCERPT_LEN: usize = 500;

/// Run `nix` with the flakes feature set enabled and a hard wall-clock
/// timeout. Returns captured stdout on success.
///
/// Failure modes are kept distinct so callers can render actionable messages:
/// a missing `nix` binary is [`BrowseError::NixMissing`], a non-zero exit is
/// [`BrowseError::ToolFailed`] carrying a stderr excerpt, and an expired
/// timeout kills the child and returns [`BrowseError::Timeout`].
pub async fn run_nix(args: &[&str], cwd: Option<&Path>, timeout: Duration) -> Result<Vec<u8>> {
    let mut full_args = vec!["--extra-experimental-features", "nix-command flakes"];
    full_args.extend_from_slice(args);
    run_tool("nix", &full_args, cwd, timeout).await
}

async fn run_tool(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Guarantees cleanup on every exit path, including caller cancellation.
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let child = cmd.spawn().map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            BrowseError::NixMissing
        } else {
            BrowseError::Io(err)
        }
    })?;

    // On expiry the output future is dropped, which reaps the child via
    // kill_on_drop rather than leaving it running.
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            log::warn!("{program} {:?} timed out after {:?}", args, timeout);
            return Err(BrowseError::Timeout(timeout));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BrowseError::ToolFailed(tool_failure_message(&stderr)));
    }

    Ok(output.stdout)
}

fn tool_failure_message(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.to_lowercase().contains("experimental feature") {
        return "Flakes not enabled. Enable with: nix-command flakes experimental features"
            .to_string();
    }
    if stderr.contains("does not provide attribute") {
        return format!("Invalid flake: {}", excerpt(stderr));
    }
    format!("Failed to get flake inputs: {}", excerpt(stderr))
}

fn excerpt(stderr: &str) -> &str {
    match stderr.char_indices().nth(STDERR_EXCERPT_LEN) {
        Some((idx, _)) => &stderr[..idx],
        None => stderr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn experimental_feature_errors_get_an_actionable_message() {
        let msg = tool_failure_message("error: experimental feature 'flakes' is disabled");
        assert!(msg.contains("Flakes not enabled"));
    }

    #[test]
    fn generic_failures_carry_a_stderr_excerpt() {
        let msg = tool_failure_message("error: cannot fetch input");
        assert!(msg.contains("cannot fetch input"));
    }

    #[test]
    fn excerpts_are_bounded() {
        let long = "x".repeat(2000);
        assert_eq!(excerpt(&long).len(), STDERR_EXCERPT_LEN);
    }

    #[tokio::test]
    async fn missing_binary_reports_the_dependency() {
        let err = run_tool(
            "definitely-not-an-installed-tool",
            &[],
            None,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "DEPENDENCY_MISSING");
        assert!(err.to_string().contains("Install Nix to browse flake inputs"));
    }

    #[tokio::test]
    async fn nonzero_exit_surfaces_stderr() {
        let err = run_tool(
            "sh",
            &["-c", "echo boom >&2; exit 1"],
            None,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "DEPENDENCY_TOOL_FAILED");
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn expired_timeout_kills_the_child() {
        let started = std::time::Instant::now();
        let err = run_tool("sleep", &["30"], None, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TIMEOUT");
        // The child was reaped by the timeout, not waited to completion.
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn stdout_is_captured_on_success() {
        let out = run_tool("sh", &["-c", "printf hello"], None, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out, b"hello");
    }
}
