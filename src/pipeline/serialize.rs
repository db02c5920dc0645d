//! Serialization: `ConversionResult` → ordered `ContentBlock`s.
//!
//! Two mutually exclusive paths, chosen by `config.chunk` and the presence of
//! chunks:
//!
//! * **flat** — scan the Markdown for data-URI image tokens, emitting text
//!   residue and image blocks in source order
//! * **chunked** — one block per chunk, each carrying chunk provenance
//!
//! Both paths end by appending the audio attachment, if any, as a single
//! media block. Requesting chunked output from a result without chunks (or
//! with an empty chunk list) is an error, never a silent fallback to the flat
//! path.

use crate::blocks::{BlockMetadata, ContentBlock, ImageSource};
use crate::config::ConversionConfig;
use crate::error::MarkItUpError;
use crate::output::{Chunk, ChunkModality, ConversionResult};
use crate::pipeline::datauri::{self, Segment};
use crate::pipeline::encode::{encode_bytes, transform_image};
use tracing::debug;

/// Serialize `result` into content blocks in reading order.
///
/// Takes `&mut` because the audio attachment is consumed on the first
/// successful call; a second call with audio enabled fails with
/// [`MarkItUpError::AudioAlreadyConsumed`].
pub fn to_blocks(result: &mut ConversionResult) -> Result<Vec<ContentBlock>, MarkItUpError> {
    let mut blocks = match (&result.chunks, result.config.chunk) {
        (Some(chunks), true) if !chunks.is_empty() => chunked_blocks(chunks, &result.config)?,
        (_, true) => {
            let category = result
                .stream_info
                .as_ref()
                .map(|i| i.category.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            return Err(MarkItUpError::ChunkingUnavailable { category });
        }
        (_, false) => flat_blocks(&result.markdown, &result.config),
    };

    if result.config.audio_enabled() {
        if let Some(audio) = result.audio.as_mut() {
            let bytes = audio.read_once()?;
            debug!("Attaching {} bytes of {}", bytes.len(), audio.mimetype());
            blocks.push(ContentBlock::media(audio.mimetype(), encode_bytes(&bytes)));
        }
    }

    Ok(blocks)
}

/// Flat Markdown → alternating text and image blocks.
pub fn flat_blocks(markdown: &str, config: &ConversionConfig) -> Vec<ContentBlock> {
    if !config.image_enabled() {
        // Tokens are left as literal text; omission is the converters' job.
        return text_block(markdown).into_iter().collect();
    }

    datauri::split(markdown)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Text(text) => text_block(text),
            Segment::Image(token) => {
                let image = transform_image(token.media_type, token.payload, config);
                Some(ContentBlock::image(ImageSource::base64(image.media_type, image.data)))
            }
        })
        .collect()
}

fn chunked_blocks(chunks: &[Chunk], config: &ConversionConfig) -> Result<Vec<ContentBlock>, MarkItUpError> {
    let mut blocks = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let meta = BlockMetadata::from(chunk);
        let block = match chunk.modality {
            ChunkModality::Text => ContentBlock::text(chunk.content.trim()),
            ChunkModality::Image => match datauri::first_token(&chunk.content) {
                Some(token) if config.image_enabled() => {
                    let image = transform_image(token.media_type, token.payload, config);
                    ContentBlock::image(ImageSource::base64(image.media_type, image.data))
                }
                _ => ContentBlock::text(chunk.content.trim()),
            },
            ChunkModality::Audio => {
                return Err(MarkItUpError::UnsupportedChunkModality {
                    chunk_id: chunk.chunk_id,
                    modality: chunk.modality.to_string(),
                })
            }
        };
        blocks.push(block.with_metadata(meta));
    }
    Ok(blocks)
}

fn text_block(text: &str) -> Option<ContentBlock> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| ContentBlock::text(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Modality;
    use crate::output::{AudioStream, BoundingBox};

    fn no_webp() -> ConversionConfig {
        ConversionConfig::builder().image_use_webp(false).build().unwrap()
    }

    #[test]
    fn intro_image_outro() {
        let mut result = ConversionResult::new(
            "Intro\n![a](data:image/png;base64,AAAA)\nOutro",
            ConversionConfig::default(),
        );
        let blocks = result.to_blocks().unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].as_text(), Some("Intro"));
        assert_eq!(blocks[1].kind(), "image");
        assert_eq!(blocks[2].as_text(), Some("Outro"));
    }

    #[test]
    fn adjacent_images_emit_no_empty_text() {
        let md = "![1](data:image/png;base64,AA==)  \n  ![2](data:image/png;base64,AA==)";
        let blocks = flat_blocks(md, &no_webp());
        let kinds: Vec<_> = blocks.iter().map(ContentBlock::kind).collect();
        assert_eq!(kinds, ["image", "image"]);
    }

    #[test]
    fn image_excluded_keeps_token_literal() {
        let config = ConversionConfig::builder().modalities([]).build().unwrap();
        let md = "a ![x](data:image/png;base64,AAAA) b";
        let blocks = flat_blocks(md, &config);
        assert_eq!(blocks, vec![ContentBlock::text(md)]);
    }

    #[test]
    fn chunked_metadata() {
        let config = ConversionConfig::builder().chunk(true).build().unwrap();
        let chunks = vec![
            Chunk::text(0, "Page one text").with_page(0),
            Chunk::image(1, "![x](data:image/png;base64,BBBB)")
                .with_page(0)
                .with_bboxes(vec![BoundingBox::new(0.0, 0.0, 10.0, 10.0)]),
        ];
        let mut result = ConversionResult::new("", config).with_chunks(chunks);
        let blocks = result.to_blocks().unwrap();
        assert_eq!(blocks.len(), 2);
        let meta = blocks[1].metadata().unwrap();
        assert_eq!(blocks[1].kind(), "image");
        assert_eq!(meta.chunk_id, 1);
        assert_eq!(meta.page_id, Some(0));
        assert_eq!(meta.bbox_list.as_deref(), Some(&[BoundingBox::new(0.0, 0.0, 10.0, 10.0)][..]));
        assert_eq!(blocks[0].metadata().unwrap().chunk_id, 0);
    }

    #[test]
    fn chunked_without_chunks_is_an_error() {
        let config = ConversionConfig::builder().chunk(true).build().unwrap();
        let mut result = ConversionResult::new("flat text", config);
        assert!(matches!(
            result.to_blocks(),
            Err(MarkItUpError::ChunkingUnavailable { .. })
        ));
    }

    #[test]
    fn empty_chunk_list_is_an_error() {
        let config = ConversionConfig::builder().chunk(true).build().unwrap();
        let mut result = ConversionResult::new("", config).with_chunks(Vec::new());
        assert!(result.is_chunking_degraded());
        assert!(matches!(
            result.to_blocks(),
            Err(MarkItUpError::ChunkingUnavailable { .. })
        ));
    }

    #[test]
    fn chunks_ignored_when_not_requested() {
        let mut result = ConversionResult::new("flat text", ConversionConfig::default())
            .with_chunks(vec![Chunk::text(0, "chunk text")]);
        let blocks = result.to_blocks().unwrap();
        assert_eq!(blocks, vec![ContentBlock::text("flat text")]);
    }

    #[test]
    fn audio_chunk_is_rejected() {
        let config = ConversionConfig::builder().chunk(true).build().unwrap();
        let mut chunk = Chunk::text(7, "x");
        chunk.modality = ChunkModality::Audio;
        let mut result = ConversionResult::new("", config).with_chunks(vec![chunk]);
        match result.to_blocks() {
            Err(MarkItUpError::UnsupportedChunkModality { chunk_id, modality }) => {
                assert_eq!(chunk_id, 7);
                assert_eq!(modality, "audio");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn audio_appended_once() {
        let mut result = ConversionResult::new("Track", ConversionConfig::default())
            .with_audio(AudioStream::from_bytes("audio/mpeg", b"ID3".to_vec()));
        let blocks = result.to_blocks().unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1], ContentBlock::media("audio/mpeg", "SUQz"));
        assert!(matches!(result.to_blocks(), Err(MarkItUpError::AudioAlreadyConsumed)));
    }

    #[test]
    fn audio_excluded_is_not_read() {
        let config = ConversionConfig::builder()
            .modalities([Modality::Image])
            .build()
            .unwrap();
        let mut result = ConversionResult::new("Track", config)
            .with_audio(AudioStream::from_bytes("audio/mpeg", b"ID3".to_vec()));
        assert_eq!(result.to_blocks().unwrap().len(), 1);
        assert!(!result.audio.as_ref().unwrap().is_consumed());
    }
}
