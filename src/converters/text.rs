use super::{finish, read_all, DocumentConverter, ReadSeek};
use crate::classify::StreamInfo;
use crate::config::ConversionConfig;
use crate::error::ConverterError;
use crate::output::ConversionResult;
use tracing::debug;

/// Plain text (and XML) passed through as Markdown.
pub struct PlainTextConverter {
    config: ConversionConfig,
}

impl PlainTextConverter {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl DocumentConverter for PlainTextConverter {
    fn name(&self) -> &'static str {
        "PlainTextConverter"
    }

    fn convert(
        &self,
        stream: &mut dyn ReadSeek,
        _info: &StreamInfo,
    ) -> Result<ConversionResult, ConverterError> {
        let bytes = read_all(stream)?;
        let text = decode_text(&bytes);
        debug!("Decoded {} bytes of text", bytes.len());
        Ok(finish(&text, &self.config))
    }
}

/// UTF-8 with the BOM stripped; invalid sequences become U+FFFD.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(body).into_owned()
}
