//! Input resolution: turn a user-supplied path or URL into bytes.
//!
//! Converters work on seekable in-memory streams, so both local files and
//! downloads are read fully. Nothing here looks at the content: the type is
//! decided later by the classifier from the bytes alone, which is why the
//! filename is kept only for display and output naming.

use crate::error::MarkItUpError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bytes of one input plus a display name.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    /// Final path segment of the file or URL, for output naming.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to its bytes.
///
/// URLs are downloaded with the given timeout; anything else is read as a
/// local file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, MarkItUpError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        let path = PathBuf::from(input);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| map_read_error(&path, e))?;
        debug!("Read {} bytes from {}", bytes.len(), path.display());
        Ok(ResolvedInput {
            name: file_name(&path),
            bytes,
        })
    }
}

/// Blocking variant for local paths.
pub fn read_local(path: &Path) -> Result<Vec<u8>, MarkItUpError> {
    std::fs::read(path).map_err(|e| map_read_error(path, e))
}

fn map_read_error(path: &Path, e: std::io::Error) -> MarkItUpError {
    match e.kind() {
        std::io::ErrorKind::NotFound => MarkItUpError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => MarkItUpError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => MarkItUpError::io(format!("reading {}", path.display()), e),
    }
}

/// Download a URL fully into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, MarkItUpError> {
    info!("Downloading: {}", url);

    let parsed = reqwest::Url::parse(url).map_err(|_| MarkItUpError::InvalidInput {
        input: url.to_string(),
    })?;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| MarkItUpError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let to_error = |e: reqwest::Error| {
        if e.is_timeout() {
            MarkItUpError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            MarkItUpError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(parsed.clone()).send().await.map_err(to_error)?;

    if !response.status().is_success() {
        return Err(MarkItUpError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(to_error)?;
    info!("Downloaded {} bytes from {}", bytes.len(), url);

    Ok(ResolvedInput {
        name: url_file_name(&parsed),
        bytes: bytes.to_vec(),
    })
}

fn url_file_name(url: &reqwest::Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back().map(str::to_string))
        .filter(|last| !last.is_empty())
        .unwrap_or_else(|| "download".to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
