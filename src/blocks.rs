//! LLM-facing content blocks.
//!
//! The JSON shape matches what multimodal chat APIs accept directly:
//!
//! ```json
//! {"type":"text","text":"Intro"}
//! {"type":"image","source":{"type":"base64","data":"…","mediaType":"image/webp"}}
//! {"type":"media","mimeType":"audio/mpeg","data":"…"}
//! ```
//!
//! Blocks built from chunked results also carry
//! `"metadata":{"chunkId":…,"pageId":…,"bboxList":[…]}`.

use crate::output::{BoundingBox, Chunk};
use serde::{Deserialize, Serialize};

/// Provenance of a block produced from a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockMetadata {
    pub chunk_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox_list: Option<Vec<BoundingBox>>,
}

impl From<&Chunk> for BlockMetadata {
    fn from(chunk: &Chunk) -> Self {
        Self {
            chunk_id: chunk.chunk_id,
            page_id: chunk.page_id,
            bbox_list: chunk.bbox_list.clone(),
        }
    }
}

/// Base64 image payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSource {
    /// Always `"base64"`.
    #[serde(rename = "type")]
    pub encoding: String,
    pub data: String,
    pub media_type: String,
}

impl ImageSource {
    pub fn base64(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            encoding: "base64".to_string(),
            data: data.into(),
            media_type: media_type.into(),
        }
    }
}

/// One element of the ordered, multi-modal output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<BlockMetadata>,
    },
    Image {
        source: ImageSource,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<BlockMetadata>,
    },
    Media {
        #[serde(rename = "mimeType")]
        mime_type: String,
        data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<BlockMetadata>,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text {
            text: text.into(),
            metadata: None,
        }
    }

    pub fn image(source: ImageSource) -> Self {
        ContentBlock::Image {
            source,
            metadata: None,
        }
    }

    pub fn media(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        ContentBlock::Media {
            mime_type: mime_type.into(),
            data: data.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, meta: BlockMetadata) -> Self {
        match &mut self {
            ContentBlock::Text { metadata, .. }
            | ContentBlock::Image { metadata, .. }
            | ContentBlock::Media { metadata, .. } => *metadata = Some(meta),
        }
        self
    }

    /// `"text"`, `"image"` or `"media"`.
    pub fn kind(&self) -> &'static str {
        match self {
            ContentBlock::Text { .. } => "text",
            ContentBlock::Image { .. } => "image",
            ContentBlock::Media { .. } => "media",
        }
    }

    pub fn metadata(&self) -> Option<&BlockMetadata> {
        match self {
            ContentBlock::Text { metadata, .. }
            | ContentBlock::Image { metadata, .. }
            | ContentBlock::Media { metadata, .. } => metadata.as_ref(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text, .. } => Some(text),
            _ => None,
        }
    }
}
