use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowseError>;

/// Every failure mode of the flake-input browser. Each variant maps to a
/// stable code string rendered to callers as `Error (CODE): message`.
#[derive(Error, Debug)]
pub enum BrowseError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("'{0}' is a directory. Use type='ls' to list contents.")]
    NotAFile(String),

    /// Deliberately uninformative: rejected paths must not leak which check
    /// failed or what exists on disk.
    #[error("Invalid path: path not permitted")]
    SecurityViolation,

    #[error("Binary file detected: {0}")]
    BinaryFile(String),

    #[error("File too large: {size} (max {max})")]
    FileTooLarge { size: String, max: String },

    #[error("Nix is not installed or not in PATH. Install Nix to browse flake inputs.")]
    NixMissing,

    #[error("{0}")]
    ToolFailed(String),

    #[error("Command timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BrowseError {
    pub fn code(&self) -> &'static str {
        match self {
            BrowseError::InvalidInput(_) => "INVALID_INPUT",
            BrowseError::NotFound(_) => "NOT_FOUND",
            BrowseError::NotADirectory(_) => "NOT_A_DIRECTORY",
            BrowseError::NotAFile(_) => "NOT_A_FILE",
            BrowseError::SecurityViolation => "SECURITY_VIOLATION",
            BrowseError::BinaryFile(_) => "BINARY_FILE",
            BrowseError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            BrowseError::NixMissing => "DEPENDENCY_MISSING",
            BrowseError::ToolFailed(_) => "DEPENDENCY_TOOL_FAILED",
            BrowseError::Timeout(_) => "TIMEOUT",
            BrowseError::Io(_) => "OS_ERROR",
        }
    }

    /// Plain-text rendering used by the tool layer.
    pub fn render(&self) -> String {
        format!("Error ({}): {}", self.code(), self)
    }
}
