use super::{finish, read_all, DocumentConverter, ImageSink, ReadSeek};
use crate::classify::StreamInfo;
use crate::config::ConversionConfig;
use crate::error::ConverterError;
use crate::output::ConversionResult;
use ::image::ImageReader;
use std::io::Cursor;
use tracing::{debug, warn};

/// A standalone image: a dimensions line plus the image itself as a token.
pub struct ImageConverter {
    config: ConversionConfig,
}

impl ImageConverter {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl DocumentConverter for ImageConverter {
    fn name(&self) -> &'static str {
        "ImageConverter"
    }

    fn convert(
        &self,
        stream: &mut dyn ReadSeek,
        info: &StreamInfo,
    ) -> Result<ConversionResult, ConverterError> {
        let bytes = read_all(stream)?;

        let dimensions = ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(ConverterError::from)
            .and_then(|r| {
                r.into_dimensions()
                    .map_err(|e| ConverterError::backend("image", e))
            });

        let mut lines = Vec::new();
        match dimensions {
            Ok((w, h)) => {
                debug!("Image {}x{} ({})", w, h, info.mimetype);
                lines.push(format!("ImageSize: {w}x{h}"));
            }
            // Unreadable headers still go through; the serializer passes such
            // payloads along untouched.
            Err(e) => warn!("Cannot read {} dimensions: {}", info.mimetype, e),
        }

        let mut images = ImageSink::new(&self.config);
        if let Some(token) = images.embed("image", &info.mimetype, &bytes) {
            lines.push(token);
        }
        if let Some(placeholder) = images.placeholder() {
            lines.push(placeholder);
        }

        Ok(finish(&lines.join("\n\n"), &self.config))
    }
}
