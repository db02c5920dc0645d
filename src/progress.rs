//! Progress-callback trait for per-document batch events.
//!
//! Pass an [`Arc<dyn ConversionProgressCallback>`] through
//! [`crate::config::BatchConfig::progress`] to receive events while
//! [`crate::stream::convert_stream`] works through a list of inputs.
//!
//! # Example
//!
//! ```rust
//! use markitup::{BatchConfig, ConversionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, input: &str, markdown_len: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}: {input} ({markdown_len} bytes of markdown)");
//!     }
//! }
//!
//! let batch = BatchConfig::default().progress(Arc::new(CountingCallback {
//!     completed: AtomicUsize::new(0),
//! }));
//! ```

use std::sync::Arc;

/// Called by the batch pipeline as it processes each input.
///
/// Documents are converted concurrently, so every method may be called from
/// several threads at once. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before any input is resolved.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called when an input starts resolving (download or file read).
    fn on_document_start(&self, input: &str) {
        let _ = input;
    }

    /// Called when an input converted successfully.
    ///
    /// `markdown_len` is the byte length of the produced Markdown.
    fn on_document_complete(&self, input: &str, markdown_len: usize) {
        let _ = (input, markdown_len);
    }

    /// Called when an input was rejected or failed to convert.
    fn on_document_error(&self, input: &str, error: &str) {
        let _ = (input, error);
    }

    /// Called once after every input has been attempted.
    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let _ = (total_documents, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
