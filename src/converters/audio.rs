use super::{read_all, DocumentConverter, ReadSeek};
use crate::classify::StreamInfo;
use crate::config::ConversionConfig;
use crate::error::ConverterError;
use crate::output::{AudioStream, ConversionResult};
use crate::pipeline::normalize::normalize_markdown;
use tracing::debug;

/// Audio files: a short description plus the raw stream as an attachment.
///
/// No transcription happens here. The result never carries chunks, so a
/// chunked serialization of audio reports degraded chunking.
pub struct AudioConverter {
    config: ConversionConfig,
}

impl AudioConverter {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl DocumentConverter for AudioConverter {
    fn name(&self) -> &'static str {
        "AudioConverter"
    }

    fn convert(
        &self,
        stream: &mut dyn ReadSeek,
        info: &StreamInfo,
    ) -> Result<ConversionResult, ConverterError> {
        let bytes = read_all(stream)?;
        debug!("Audio attachment: {} bytes of {}", bytes.len(), info.mimetype);

        let markdown = normalize_markdown(&format!(
            "Audio: {} ({} bytes)",
            info.mimetype,
            bytes.len()
        ));
        let mut result = ConversionResult::new(markdown, self.config.clone());
        if self.config.audio_enabled() {
            result = result.with_audio(AudioStream::from_bytes(info.mimetype.clone(), bytes));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify_bytes;
    use crate::config::Modality;
    use std::io::Cursor;

    const MP3: &[u8] = b"ID3\x04\0\0\0\0\0\x05hello";

    #[test]
    fn attaches_audio() {
        let info = classify_bytes(MP3);
        let result = AudioConverter::new(&ConversionConfig::default())
            .convert(&mut Cursor::new(MP3.to_vec()), &info)
            .unwrap();
        assert_eq!(result.markdown, "Audio: audio/mpeg (15 bytes)\n");
        assert_eq!(result.audio.as_ref().map(|a| a.mimetype()), Some("audio/mpeg"));
        assert!(result.chunks.is_none());
    }

    #[test]
    fn no_attachment_without_audio_modality() {
        let info = classify_bytes(MP3);
        let config = ConversionConfig::builder()
            .modalities([Modality::Image])
            .build()
            .unwrap();
        let result = AudioConverter::new(&config)
            .convert(&mut Cursor::new(MP3.to_vec()), &info)
            .unwrap();
        assert!(result.audio.is_none());
    }
}
