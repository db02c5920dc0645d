//! Format converters: one per supported [`Category`](crate::Category).
//!
//! Every converter implements [`DocumentConverter`]: given a positioned stream
//! and its [`StreamInfo`], return Markdown (with images inlined as base64
//! data-URI tokens) or fail with a [`ConverterError`]. Converters get the
//! active [`ConversionConfig`] at construction and decide from it whether to
//! embed images and whether to attach chunks.
//!
//! Backends behind cargo features (`pdf`, `office`, `html`) compile to a stub
//! that reports [`ConverterError::MissingDependency`] when the feature is off,
//! so routing stays identical across builds.

use crate::classify::StreamInfo;
use crate::config::ConversionConfig;
use crate::error::ConverterError;
use crate::output::ConversionResult;
use crate::pipeline::{chunk, datauri, encode, normalize};
use std::io::{Read, Seek};

mod audio;
mod csv;
mod docx;
mod html;
mod image;
#[cfg(feature = "office")]
mod ooxml;
mod pdf;
mod pptx;
mod text;
mod xlsx;

pub use audio::AudioConverter;
pub use csv::CsvConverter;
pub use docx::DocxConverter;
pub use html::HtmlConverter;
pub use image::ImageConverter;
pub use pdf::PdfConverter;
pub use pptx::PptxConverter;
pub use text::PlainTextConverter;
pub use xlsx::{XlsConverter, XlsxConverter};

/// A readable, seekable byte stream. Implemented for every `Read + Seek`.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// The uniform contract every format converter implements.
pub trait DocumentConverter: Send + Sync {
    /// Converter name used in error reports, e.g. `"DocxConverter"`.
    fn name(&self) -> &'static str;

    /// Convert the stream from its current position to the end.
    fn convert(
        &self,
        stream: &mut dyn ReadSeek,
        info: &StreamInfo,
    ) -> Result<ConversionResult, ConverterError>;
}

/// Read the rest of the stream into memory.
pub(crate) fn read_all(stream: &mut dyn ReadSeek) -> Result<Vec<u8>, ConverterError> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Normalize `markdown` and wrap it in a result, attaching generic chunks
/// when chunked output was requested.
pub(crate) fn finish(markdown: &str, config: &ConversionConfig) -> ConversionResult {
    let markdown = normalize::normalize_markdown(markdown);
    let mut result = ConversionResult::new(markdown, config.clone());
    if config.chunk {
        let chunks = chunk::chunk_markdown(&result.markdown, config.chunk_size);
        result = result.with_chunks(chunks);
    }
    result
}

/// Like [`finish`] for documents made of pages (slides, sheets): chunks carry
/// the zero-based section index as their page id. `trailer` is appended to
/// the Markdown only.
#[cfg_attr(not(feature = "office"), allow(dead_code))]
pub(crate) fn finish_sections(
    sections: &[String],
    trailer: Option<&str>,
    config: &ConversionConfig,
) -> ConversionResult {
    let sections: Vec<String> = sections
        .iter()
        .map(|s| normalize::normalize_markdown(s))
        .collect();
    let mut markdown = sections.join("\n");
    if let Some(trailer) = trailer {
        markdown.push('\n');
        markdown.push_str(trailer);
    }

    let mut result = ConversionResult::new(normalize::normalize_markdown(&markdown), config.clone());
    if config.chunk {
        let mut chunker = chunk::Chunker::new(config.chunk_size);
        for (index, section) in sections.iter().enumerate() {
            chunker.push_markdown(section, Some(index as u32));
        }
        result = result.with_chunks(chunker.finish());
    }
    result
}

/// Collects images a converter finds, either as data-URI tokens or, with the
/// image modality off, as a count for the omission placeholder.
#[derive(Debug)]
pub(crate) struct ImageSink {
    enabled: bool,
    omitted: usize,
}

impl ImageSink {
    pub(crate) fn new(config: &ConversionConfig) -> Self {
        Self {
            enabled: config.image_enabled(),
            omitted: 0,
        }
    }

    /// Token for raw image bytes, or `None` (counted) when images are off.
    pub(crate) fn embed(&mut self, alt: &str, media_type: &str, bytes: &[u8]) -> Option<String> {
        if !self.enabled {
            self.omitted += 1;
            return None;
        }
        Some(datauri::make_token(alt, media_type, &encode::encode_bytes(bytes)))
    }

    /// Token for an already base64-encoded payload.
    pub(crate) fn embed_b64(&mut self, alt: &str, media_type: &str, payload_b64: &str) -> Option<String> {
        if !self.enabled {
            self.omitted += 1;
            return None;
        }
        Some(datauri::make_token(alt, media_type, payload_b64))
    }

    /// The omission placeholder, if any image was dropped.
    pub(crate) fn placeholder(&self) -> Option<String> {
        (self.omitted > 0).then(|| datauri::omitted_placeholder(self.omitted))
    }

    pub(crate) fn omitted(&self) -> usize {
        self.omitted
    }
}

/// Render rows as a GitHub-flavoured Markdown table; the first row is the
/// header. Rows are padded to the widest row.
pub(crate) fn markdown_table(rows: &[Vec<String>]) -> String {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return String::new();
    }
    let render_row = |row: &[String]| -> String {
        let mut line = String::from("|");
        for i in 0..width {
            let cell = row.get(i).map(String::as_str).unwrap_or("");
            line.push(' ');
            line.push_str(&escape_cell(cell));
            line.push_str(" |");
        }
        line
    };

    let mut out = Vec::with_capacity(rows.len() + 1);
    out.push(render_row(&rows[0]));
    out.push(format!("|{}", " --- |".repeat(width)));
    for row in &rows[1..] {
        out.push(render_row(row));
    }
    out.join("\n")
}

fn escape_cell(cell: &str) -> String {
    cell.trim()
        .replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
}
