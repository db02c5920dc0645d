//! Dispatch: classify a stream, route its category to one converter, run it.
//!
//! ```text
//! stream ─ classify ─► StreamInfo ─ route ─► Route::Converter ─ convert ─► ConversionResult
//!                                        └─► Route::Reject ─► UnsupportedFormat
//! ```
//!
//! [`MarkItUp`] is the synchronous core. The free functions below it add
//! path/URL resolution and run the core on tokio's blocking pool, since every
//! converter is CPU-bound and synchronous.

use crate::classify::{classify_stream, Category, StreamInfo};
use crate::config::{BatchConfig, ConversionConfig};
use crate::converters::{
    AudioConverter, CsvConverter, DocumentConverter, DocxConverter, HtmlConverter,
    ImageConverter, PdfConverter, PlainTextConverter, PptxConverter, XlsConverter,
    XlsxConverter,
};
use crate::error::{ConverterError, FailedAttempt, MarkItUpError};
use crate::output::ConversionResult;
use crate::pipeline::input;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::{debug, info, warn};

/// Constructor for a converter, given the active configuration.
pub type ConverterCtor = fn(&ConversionConfig) -> Box<dyn DocumentConverter>;

/// Where a category goes.
pub enum Route {
    Converter(ConverterCtor),
    /// Rejected before any converter runs; the message names the reason.
    Reject(String),
}

/// The closed category → converter registry.
pub fn route(info: &StreamInfo) -> Route {
    match info.category {
        Category::Text => Route::Converter(|c| Box::new(PlainTextConverter::new(c))),
        Category::Html => Route::Converter(|c| Box::new(HtmlConverter::new(c))),
        Category::Csv => Route::Converter(|c| Box::new(CsvConverter::new(c))),
        Category::Pdf => Route::Converter(|c| Box::new(PdfConverter::new(c))),
        Category::Docx => Route::Converter(|c| Box::new(DocxConverter::new(c))),
        Category::Pptx => Route::Converter(|c| Box::new(PptxConverter::new(c))),
        Category::Xlsx => Route::Converter(|c| Box::new(XlsxConverter::new(c))),
        Category::Xls => Route::Converter(|c| Box::new(XlsConverter::new(c))),
        Category::Image => Route::Converter(|c| Box::new(ImageConverter::new(c))),
        Category::Audio => Route::Converter(|c| Box::new(AudioConverter::new(c))),
        Category::Ppt => Route::Reject(".ppt files are not supported, try .pptx instead".into()),
        Category::Doc => Route::Reject(".doc files are not supported, try .docx instead".into()),
        Category::Video => Route::Reject(format!("video files are not supported ({})", info.mimetype)),
        Category::Other => Route::Reject(format!("{} files are not supported", info.mimetype)),
    }
}

/// Synchronous converter front end.
///
/// # Example
/// ```rust
/// use markitup::{ConversionConfig, MarkItUp};
///
/// let md = MarkItUp::new(ConversionConfig::default());
/// let (result, info) = md.convert_bytes(b"hello world").unwrap();
/// assert_eq!(info.mimetype, "text/plain");
/// assert_eq!(result.markdown, "hello world\n");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MarkItUp {
    config: ConversionConfig,
}

impl MarkItUp {
    pub fn new(config: ConversionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Classify and convert a stream, reading from its current position.
    ///
    /// Returns a complete result (with `stream_info` filled in) plus the
    /// classification, or an error; never a partial result.
    pub fn convert<R: Read + Seek>(
        &self,
        stream: &mut R,
    ) -> Result<(ConversionResult, StreamInfo), MarkItUpError> {
        let info = classify_stream(stream).map_err(|e| MarkItUpError::io("classifying input", e))?;

        let ctor = match route(&info) {
            Route::Converter(ctor) => ctor,
            Route::Reject(message) => {
                warn!("Rejected {} input: {}", info.category, message);
                return Err(MarkItUpError::UnsupportedFormat { message });
            }
        };

        let converter = ctor(&self.config);
        debug!("Routing {} ({}) to {}", info.category, info.mimetype, converter.name());

        let mut result = converter
            .convert(stream, &info)
            .map_err(|e| converter_failure(converter.name(), &info, e))?;
        result.stream_info = Some(info.clone());
        info!(
            "Converted {} input with {}: {} bytes of markdown",
            info.category,
            converter.name(),
            result.markdown.len()
        );
        Ok((result, info))
    }

    pub fn convert_bytes(&self, bytes: &[u8]) -> Result<(ConversionResult, StreamInfo), MarkItUpError> {
        self.convert(&mut Cursor::new(bytes))
    }

    pub fn convert_path(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<(ConversionResult, StreamInfo), MarkItUpError> {
        let bytes = input::read_local(path.as_ref())?;
        self.convert_bytes(&bytes)
    }
}

fn converter_failure(converter: &str, info: &StreamInfo, error: ConverterError) -> MarkItUpError {
    match error {
        ConverterError::MissingDependency {
            converter,
            extension,
            feature,
        } => MarkItUpError::MissingDependency {
            converter: converter.to_string(),
            extension: extension.to_string(),
            feature: feature.to_string(),
        },
        other => MarkItUpError::FileConversionFailed {
            message: format!("Failed to convert file of type {}", info.mimetype),
            attempts: vec![FailedAttempt::new(converter, &other)],
        },
    }
}

// ── Async entry points ──────────────────────────────────────────────────────

/// Resolve a local path or HTTP(S) URL and convert it.
///
/// The download (if any) runs on the async runtime; the conversion itself
/// runs in [`tokio::task::spawn_blocking`].
pub async fn convert_input(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
    batch: &BatchConfig,
) -> Result<(ConversionResult, StreamInfo), MarkItUpError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);
    let resolved = input::resolve_input(input_str, batch.download_timeout_secs).await?;
    let converter = MarkItUp::new(config.clone());
    tokio::task::spawn_blocking(move || converter.convert_bytes(&resolved.bytes))
        .await
        .map_err(|e| MarkItUpError::Internal(format!("conversion task failed: {e}")))?
}

/// Synchronous wrapper around [`convert_input`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<(ConversionResult, StreamInfo), MarkItUpError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| MarkItUpError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_input(input_str, config, &BatchConfig::default()))
}

/// Convert an input and write its Markdown to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
    batch: &BatchConfig,
) -> Result<StreamInfo, MarkItUpError> {
    let (result, info) = convert_input(input_str, config, batch).await?;
    write_atomic(output_path.as_ref(), result.markdown.as_bytes()).await?;
    Ok(info)
}

/// Write `contents` to `path` through a sibling `.tmp` file and a rename,
/// creating parent directories as needed.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), MarkItUpError> {
    let write_err = |source| MarkItUpError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);
    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

/// Classify an input without converting it.
pub async fn inspect(input_str: impl AsRef<str>, batch: &BatchConfig) -> Result<StreamInfo, MarkItUpError> {
    let resolved = input::resolve_input(input_str.as_ref(), batch.download_timeout_secs).await?;
    Ok(crate::classify::classify_bytes(&resolved.bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{MIME_DOC, MIME_PPT};

    fn info(category: Category, mimetype: &str) -> StreamInfo {
        StreamInfo {
            mimetype: mimetype.to_string(),
            category,
        }
    }

    #[test]
    fn routing_is_total() {
        for category in Category::ALL {
            let route = route(&info(category, "x/y"));
            let rejected = matches!(route, Route::Reject(_));
            let expect_reject = matches!(
                category,
                Category::Ppt | Category::Doc | Category::Video | Category::Other
            );
            assert_eq!(rejected, expect_reject, "{category}");
        }
    }

    #[test]
    fn rejection_messages_name_the_reason() {
        let msg = |c, m| match route(&info(c, m)) {
            Route::Reject(s) => s,
            Route::Converter(_) => panic!("expected rejection"),
        };
        assert!(msg(Category::Ppt, MIME_PPT).contains(".pptx"));
        assert!(msg(Category::Doc, MIME_DOC).contains(".docx"));
        assert_eq!(
            msg(Category::Other, "application/octet-stream"),
            "application/octet-stream files are not supported"
        );
        assert!(msg(Category::Video, "video/mp4").contains("video/mp4"));
    }

    #[test]
    fn legacy_presentation_is_rejected() {
        let mut bytes = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
        bytes.extend_from_slice(&[0u8; 504]);
        bytes.extend("PowerPoint Document".encode_utf16().flat_map(|u| u.to_le_bytes()));
        bytes.extend_from_slice(&[0u8; 64]);

        let err = MarkItUp::default().convert_bytes(&bytes).unwrap_err();
        match err {
            MarkItUpError::UnsupportedFormat { message } => assert!(message.contains(".pptx")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_binary_is_rejected() {
        let err = MarkItUp::default().convert_bytes(&[0u8, 1, 2, 3, 0xFF]).unwrap_err();
        assert!(matches!(err, MarkItUpError::UnsupportedFormat { .. }));
    }

    #[test]
    fn text_is_converted_and_stamped() {
        let (result, info) = MarkItUp::default().convert_bytes(b"Hello\n\nWorld").unwrap();
        assert_eq!(info.category, Category::Text);
        assert_eq!(result.markdown, "Hello\n\nWorld\n");
        assert_eq!(result.stream_info.as_ref(), Some(&info));
    }

    #[test]
    fn stream_position_is_honoured() {
        let mut cursor = Cursor::new(b"skip-me|kept".to_vec());
        cursor.set_position(8);
        let (result, _) = MarkItUp::default().convert(&mut cursor).unwrap();
        assert_eq!(result.markdown, "kept\n");
    }

    #[test]
    fn missing_dependency_stays_distinct() {
        let err = converter_failure(
            "PdfConverter",
            &info(Category::Pdf, "application/pdf"),
            ConverterError::missing_dependency("PdfConverter", ".pdf", "pdf"),
        );
        match &err {
            MarkItUpError::MissingDependency { converter, feature, .. } => {
                assert_eq!(converter, "PdfConverter");
                assert_eq!(feature, "pdf");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("--features pdf"));
    }

    #[test]
    fn converter_failure_carries_attempt() {
        let err = converter_failure(
            "DocxConverter",
            &info(Category::Docx, crate::classify::MIME_DOCX),
            ConverterError::Malformed("no document part".into()),
        );
        match err {
            MarkItUpError::FileConversionFailed { message, attempts } => {
                assert!(message.starts_with("Failed to convert file of type"));
                assert_eq!(attempts.len(), 1);
                assert_eq!(attempts[0].converter, "DocxConverter");
                assert_eq!(attempts[0].error_kind, "Malformed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn convert_to_file_writes_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("notes.txt");
        std::fs::write(&input, "line one\r\nline two").unwrap();
        let output = dir.path().join("out").join("notes.md");

        let info = convert_to_file(
            input.to_string_lossy(),
            &output,
            &ConversionConfig::default(),
            &BatchConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(info.category, Category::Text);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "line one\nline two\n");
        assert!(!dir.path().join("out").join("notes.md.tmp").exists());
    }

    #[tokio::test]
    async fn inspect_missing_file() {
        let err = inspect("/definitely/not/here.bin", &BatchConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MarkItUpError::FileNotFound { .. }));
    }
}
