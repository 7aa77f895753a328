//! Text/binary classification and bounded file reads.

use tokio::io::AsyncReadExt;

use crate::error::{BrowseError, Result};
use crate::format_size;
use crate::sandbox::StorePath;

/// Bytes sampled from the head of a file for binary classification.
const BINARY_SAMPLE: usize = 8192;
/// Fraction of control bytes in the sample above which a file is binary.
const NON_PRINTABLE_THRESHOLD: f64 = 0.30;
/// Largest file `read` will serve.
pub const MAX_FILE_SIZE: u64 = 1024 * 1024;
/// Line limit applied when the caller does not supply one.
pub const DEFAULT_LINE_LIMIT: usize = 500;
/// Absolute ceiling on caller-supplied line limits.
pub const MAX_LINE_LIMIT: usize = 2000;

/// A bounded text read. `truncated` distinguishes "this is everything"
/// from "there is more".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub lines: Vec<String>,
    pub total_lines: usize,
    pub truncated: bool,
    pub size: u64,
}

/// Read up to `limit` lines (clamped to [`MAX_LINE_LIMIT`]) from a sandboxed
/// file. Binary content is refused outright rather than partially decoded;
/// `display_name` only flavors error messages.
pub async fn inspect(path: &StorePath, display_name: &str, limit: usize) -> Result<FileContent> {
    let limit = limit.clamp(1, MAX_LINE_LIMIT);

    let meta = tokio::fs::metadata(path.as_path()).await?;
    let size = meta.len();
    if size > MAX_FILE_SIZE {
        return Err(BrowseError::FileTooLarge {
            size: format_size(size),
            max: format_size(MAX_FILE_SIZE),
        });
    }

    let mut file = tokio::fs::File::open(path.as_path()).await?;
    let mut sample = vec![0u8; BINARY_SAMPLE.min(size as usize)];
    let mut filled = 0;
    while filled < sample.len() {
        let n = file.read(&mut sample[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    sample.truncate(filled);

    if looks_binary(&sample) {
        return Err(BrowseError::BinaryFile(format!(
            "{display_name} ({})",
            format_size(size)
        )));
    }

    let mut rest = Vec::with_capacity(size as usize);
    file.read_to_end(&mut rest).await?;
    sample.extend_from_slice(&rest);
    let text = String::from_utf8_lossy(&sample);

    let mut lines = Vec::new();
    let mut total_lines = 0usize;
    for line in text.lines() {
        total_lines += 1;
        if lines.len() < limit {
            lines.push(line.to_string());
        }
    }

    Ok(FileContent {
        truncated: total_lines > limit,
        lines,
        total_lines,
        size,
    })
}

/// A NUL byte anywhere in the sample, or too many control characters,
/// marks the file as binary. Bytes >= 0x80 are left alone so UTF-8 text
/// is not misclassified.
fn looks_binary(sample: &[u8]) -> bool {
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0) {
        return true;
    }
    let control = sample
        .iter()
        .filter(|&&b| (b < 0x20 && b != b'\n' && b != b'\r' && b != b'\t') || b == 0x7f)
        .count();
    control as f64 / sample.len() as f64 > NON_PRINTABLE_THRESHOLD
}
