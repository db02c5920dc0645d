//! # markitup
//!
//! Convert documents (PDF, Word, PowerPoint, Excel, HTML, CSV, plain text,
//! images, audio) to Markdown, and serialise the result into an ordered list
//! of multi-modal content blocks ready for an LLM message.
//!
//! ## Pipeline Overview
//!
//! ```text
//! bytes
//!  │
//!  ├─ 1. Classify  content signature → mimetype → Category (no extensions)
//!  ├─ 2. Route     closed Category → converter registry, or a rejection
//!  ├─ 3. Convert   format converter → Markdown with data-URI image tokens
//!  │               (+ optional chunks, title, audio attachment)
//!  └─ 4. Serialise to_blocks(): text / image / media blocks, in order,
//!                  images resized and re-encoded as WebP on the way out
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use markitup::{ContentBlock, ConversionConfig, MarkItUp};
//!
//! let config = ConversionConfig::builder().build().unwrap();
//! let (mut result, info) = MarkItUp::new(config)
//!     .convert_bytes(b"# Notes\n\nFirst point.")
//!     .unwrap();
//! assert_eq!(info.category.as_str(), "text");
//!
//! let blocks = result.to_blocks().unwrap();
//! assert!(matches!(&blocks[0], ContentBlock::Text { .. }));
//! ```
//!
//! Paths and URLs go through the async entry points
//! ([`convert_input`], [`convert_to_file`], [`convert_stream`]).
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | The `markitup` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `pdf`    | on      | PDF through pdfium (`pdfium-render`); the library is bound at runtime |
//! | `office` | on      | DOCX / PPTX (`zip` + `quick-xml`) and XLSX / XLS (`calamine`) |
//! | `html`   | on      | HTML through `scraper` |
//!
//! A converter whose feature is compiled out still routes; it reports
//! [`MarkItUpError::MissingDependency`] naming the feature to enable.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod blocks;
pub mod classify;
pub mod config;
pub mod convert;
pub mod converters;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use blocks::{BlockMetadata, ContentBlock, ImageSource};
pub use classify::{classify_bytes, classify_stream, Category, StreamInfo};
pub use config::{BatchConfig, ConversionConfig, ConversionConfigBuilder, Modality};
pub use convert::{convert_input, convert_sync, convert_to_file, inspect, MarkItUp};
pub use converters::DocumentConverter;
pub use error::{ConverterError, FailedAttempt, MarkItUpError};
pub use output::{AudioStream, BoundingBox, Chunk, ChunkModality, ConversionResult};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_batch, convert_stream, DocumentOutcome, DocumentStream};
