//! Error types for the markitup library.
//!
//! Two distinct error types reflect two distinct failure layers:
//!
//! * [`MarkItUpError`] — **Fatal**: returned as `Err(MarkItUpError)` from every
//!   public entry point (dispatch, serialization, input resolution, CLI
//!   helpers). A caller either gets a complete result or one of these.
//!
//! * [`ConverterError`] — raised by a single format converter. The
//!   dispatcher never lets it escape unchanged: a missing optional dependency
//!   becomes [`MarkItUpError::MissingDependency`], anything else is wrapped
//!   into [`MarkItUpError::FileConversionFailed`] together with a
//!   [`FailedAttempt`] record naming the converter.
//!
//! Missing dependencies stay separate from failures because the input was
//! recognised correctly; only the installation lacks a capability, and the
//! caller may want to tell the user how to fix that rather than report a
//! broken file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the markitup library.
#[derive(Debug, Error)]
pub enum MarkItUpError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// Reading or seeking the input stream failed.
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ── Routing errors ────────────────────────────────────────────────────
    /// The input was classified, but no converter handles its category.
    #[error("Unsupported format: {message}")]
    UnsupportedFormat { message: String },

    /// The category is supported, but this build or environment lacks the
    /// optional capability needed to read it.
    #[error(
        "{converter} recognized the input as a potential {extension} file, but the \
         `{feature}` dependency needed to read {extension} files is not available.\n{hint}",
        hint = missing_dependency_hint(.feature)
    )]
    MissingDependency {
        converter: String,
        extension: String,
        feature: String,
    },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The routed converter ran and failed.
    #[error("{message}{details}", details = format_attempts(.attempts))]
    FileConversionFailed {
        message: String,
        attempts: Vec<FailedAttempt>,
    },

    // ── Serialization errors ──────────────────────────────────────────────
    /// Chunked output was requested but the converter produced no chunks.
    #[error(
        "Chunked output was requested but the {category} converter produced no chunks.\n\
         Disable chunking to serialise this document as flat Markdown."
    )]
    ChunkingUnavailable { category: String },

    /// The audio attachment was already read by an earlier serialization.
    #[error("Audio stream was already consumed by a previous to_blocks() call")]
    AudioAlreadyConsumed,

    /// Reading the audio attachment failed; the stream is left unconsumed.
    #[error("Failed to read audio stream: {source}")]
    AudioReadFailed {
        #[source]
        source: std::io::Error,
    },

    /// A chunk carries a modality the chunked serializer does not handle.
    #[error("Chunk {chunk_id} has modality '{modality}', which chunked serialization does not support")]
    UnsupportedChunkModality { chunk_id: u64, modality: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation or config-file parsing failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarkItUpError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        MarkItUpError::Io {
            context: context.into(),
            source,
        }
    }
}

fn missing_dependency_hint(feature: &str) -> String {
    match feature {
        "pdfium" => "Set PDFIUM_LIB_PATH=/path/to/libpdfium, or install pdfium where the \
                     system loader can find it."
            .to_string(),
        other => format!(
            "Rebuild with the `{other}` feature enabled, for example:\n  \
             cargo install markitup --features {other}"
        ),
    }
}

fn format_attempts(attempts: &[FailedAttempt]) -> String {
    attempts
        .iter()
        .map(|a| {
            format!(
                "\n - {} threw {} with message: {}",
                a.converter, a.error_kind, a.error_message
            )
        })
        .collect()
}

/// One converter invocation that failed.
///
/// Routing is 1:1, so a [`MarkItUpError::FileConversionFailed`] currently
/// carries exactly one attempt; the list shape leaves room for fallback
/// converters without changing the error surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedAttempt {
    pub converter: String,
    pub error_kind: String,
    pub error_message: String,
}

impl FailedAttempt {
    pub fn new(converter: &str, error: &ConverterError) -> Self {
        Self {
            converter: converter.to_string(),
            error_kind: error.error_kind().to_string(),
            error_message: error.to_string(),
        }
    }
}

/// An error raised by a single format converter.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// An optional capability (cargo feature or shared library) is absent.
    #[error("{converter} needs the `{feature}` dependency to read {extension} files")]
    MissingDependency {
        converter: &'static str,
        extension: &'static str,
        feature: &'static str,
    },

    /// Reading the input stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document structure is invalid for its declared format.
    #[error("malformed document: {0}")]
    Malformed(String),

    /// A third-party parsing backend reported an error.
    #[error("{backend} error: {detail}")]
    Backend {
        backend: &'static str,
        detail: String,
    },
}

impl ConverterError {
    pub fn missing_dependency(
        converter: &'static str,
        extension: &'static str,
        feature: &'static str,
    ) -> Self {
        ConverterError::MissingDependency {
            converter,
            extension,
            feature,
        }
    }

    pub fn backend(backend: &'static str, detail: impl std::fmt::Display) -> Self {
        ConverterError::Backend {
            backend,
            detail: detail.to_string(),
        }
    }

    /// Short machine-friendly name of the failure class.
    pub fn error_kind(&self) -> &'static str {
        match self {
            ConverterError::MissingDependency { .. } => "MissingDependency",
            ConverterError::Io(_) => "Io",
            ConverterError::Malformed(_) => "Malformed",
            ConverterError::Backend { .. } => "Backend",
        }
    }
}
