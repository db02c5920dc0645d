//! Conversion result model: Markdown, optional chunks, optional audio.
//!
//! A [`ConversionResult`] is produced by exactly one converter and owned by the
//! caller. Everything in it is plain data except [`AudioStream`], which wraps a
//! reader that can be drained once.

use crate::blocks::ContentBlock;
use crate::classify::StreamInfo;
use crate::config::ConversionConfig;
use crate::error::MarkItUpError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;

/// Payload kind of a single [`Chunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkModality {
    Text,
    Image,
    Audio,
}

impl fmt::Display for ChunkModality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChunkModality::Text => "text",
            ChunkModality::Image => "image",
            ChunkModality::Audio => "audio",
        })
    }
}

/// Axis-aligned rectangle in page coordinates (PDF points, origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

/// One single-modality segment of a converted document.
///
/// `content` is plain text for text chunks and exactly one Markdown image
/// token for image chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub modality: ChunkModality,
    pub content: String,
    pub chunk_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox_list: Option<Vec<BoundingBox>>,
}

impl Chunk {
    pub fn text(chunk_id: u64, content: impl Into<String>) -> Self {
        Self {
            modality: ChunkModality::Text,
            content: content.into(),
            chunk_id,
            page_id: None,
            bbox_list: None,
        }
    }

    pub fn image(chunk_id: u64, token: impl Into<String>) -> Self {
        Self {
            modality: ChunkModality::Image,
            content: token.into(),
            chunk_id,
            page_id: None,
            bbox_list: None,
        }
    }

    pub fn with_page(mut self, page_id: u32) -> Self {
        self.page_id = Some(page_id);
        self
    }

    pub fn with_bboxes(mut self, bboxes: Vec<BoundingBox>) -> Self {
        self.bbox_list = Some(bboxes);
        self
    }
}

/// Audio attachment that can be read exactly once.
///
/// The reader is taken out for the duration of a read. If the read fails it is
/// put back, so a later call can retry; after a successful read the stream is
/// consumed and further reads return [`MarkItUpError::AudioAlreadyConsumed`].
pub struct AudioStream {
    mimetype: String,
    reader: Option<Box<dyn Read + Send>>,
}

impl AudioStream {
    pub fn new(mimetype: impl Into<String>, reader: Box<dyn Read + Send>) -> Self {
        Self {
            mimetype: mimetype.into(),
            reader: Some(reader),
        }
    }

    /// Build from an in-memory buffer.
    pub fn from_bytes(mimetype: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(mimetype, Box::new(std::io::Cursor::new(bytes)))
    }

    pub fn mimetype(&self) -> &str {
        &self.mimetype
    }

    pub fn is_consumed(&self) -> bool {
        self.reader.is_none()
    }

    /// Drain the stream. Succeeds at most once.
    pub fn read_once(&mut self) -> Result<Vec<u8>, MarkItUpError> {
        let mut reader = self.reader.take().ok_or(MarkItUpError::AudioAlreadyConsumed)?;
        let mut buf = Vec::new();
        match reader.read_to_end(&mut buf) {
            Ok(_) => Ok(buf),
            Err(source) => {
                self.reader = Some(reader);
                Err(MarkItUpError::AudioReadFailed { source })
            }
        }
    }
}

impl fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioStream")
            .field("mimetype", &self.mimetype)
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

/// The output of one converter run.
#[derive(Debug)]
pub struct ConversionResult {
    pub markdown: String,
    pub chunks: Option<Vec<Chunk>>,
    pub title: Option<String>,
    pub audio: Option<AudioStream>,
    pub stream_info: Option<StreamInfo>,
    pub config: ConversionConfig,
}

impl ConversionResult {
    pub fn new(markdown: impl Into<String>, config: ConversionConfig) -> Self {
        Self {
            markdown: markdown.into(),
            chunks: None,
            title: None,
            audio: None,
            stream_info: None,
            config,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_chunks(mut self, chunks: Vec<Chunk>) -> Self {
        self.chunks = Some(chunks);
        self
    }

    pub fn with_audio(mut self, audio: AudioStream) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Chunked output was requested but no chunks were produced.
    pub fn is_chunking_degraded(&self) -> bool {
        self.config.chunk && self.chunks.as_ref().map_or(true, Vec::is_empty)
    }

    /// Serialize into ordered content blocks. See [`crate::pipeline::serialize`].
    pub fn to_blocks(&mut self) -> Result<Vec<ContentBlock>, MarkItUpError> {
        crate::pipeline::serialize::to_blocks(self)
    }
}
