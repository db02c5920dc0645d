//! Pipeline stages around the format converters.
//!
//! Each submodule implements one transformation step and is independently
//! testable.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ (classify + converter) ──▶ normalize ──▶ chunk ──▶ serialize
//! (path/URL)                           (cleanup)    (opt.)    (blocks)
//!                                                               │
//!                                                   datauri ◀───┤
//!                                                   encode  ◀───┘
//! ```
//!
//! 1. [`input`]     — read a local path or download a URL into memory
//! 2. [`normalize`] — deterministic cleanup of converter Markdown
//! 3. [`chunk`]     — split Markdown into single-modality chunks when the
//!    caller asks for chunked output
//! 4. [`serialize`] — turn a `ConversionResult` into ordered content blocks,
//!    using [`datauri`] to find image tokens and [`encode`] to resize and
//!    re-encode them

pub mod chunk;
pub mod datauri;
pub mod encode;
pub mod input;
pub mod normalize;
pub mod serialize;
