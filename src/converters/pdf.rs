use super::{DocumentConverter, ReadSeek};
use crate::classify::StreamInfo;
use crate::config::ConversionConfig;
use crate::error::ConverterError;
use crate::output::ConversionResult;

/// PDF text and embedded images through pdfium.
///
/// The pdfium shared library is bound at conversion time: from
/// `PDFIUM_LIB_PATH` (a file or a directory), the working directory, or the
/// system library path. When none of those yields a library the converter
/// reports a missing dependency rather than a conversion failure.
///
/// With chunking on, each page is chunked separately: text chunks carry the
/// page index and the bounding boxes of the text segments they contain,
/// image chunks carry the page index.
pub struct PdfConverter {
    #[cfg_attr(not(feature = "pdf"), allow(dead_code))]
    config: ConversionConfig,
}

impl PdfConverter {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl DocumentConverter for PdfConverter {
    fn name(&self) -> &'static str {
        "PdfConverter"
    }

    #[cfg(feature = "pdf")]
    fn convert(
        &self,
        stream: &mut dyn ReadSeek,
        _info: &StreamInfo,
    ) -> Result<ConversionResult, ConverterError> {
        let bytes = super::read_all(stream)?;
        let pdfium = extract::bind_pdfium()?;
        extract::pdf_to_result(&pdfium, &bytes, &self.config)
    }

    #[cfg(not(feature = "pdf"))]
    fn convert(
        &self,
        _stream: &mut dyn ReadSeek,
        _info: &StreamInfo,
    ) -> Result<ConversionResult, ConverterError> {
        Err(ConverterError::missing_dependency(self.name(), ".pdf", "pdf"))
    }
}

#[cfg(feature = "pdf")]
mod extract {
    use crate::config::ConversionConfig;
    use crate::converters::ImageSink;
    use crate::error::ConverterError;
    use crate::output::{BoundingBox, Chunk, ConversionResult};
    use crate::pipeline::chunk::Chunker;
    use crate::pipeline::encode::encode_png;
    use crate::pipeline::normalize::normalize_markdown;
    use pdfium_render::prelude::*;
    use std::path::Path;
    use tracing::{debug, info, warn};

    pub(super) fn bind_pdfium() -> Result<Pdfium, ConverterError> {
        let bindings = match std::env::var("PDFIUM_LIB_PATH") {
            Ok(path) if Path::new(&path).is_dir() => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path.as_str()))
            }
            Ok(path) => Pdfium::bind_to_library(&path),
            Err(_) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| {
            warn!("Cannot bind pdfium: {:?}", e);
            ConverterError::missing_dependency("PdfConverter", ".pdf", "pdfium")
        })?;
        Ok(Pdfium::new(bindings))
    }

    pub(super) fn pdf_to_result(
        pdfium: &Pdfium,
        bytes: &[u8],
        config: &ConversionConfig,
    ) -> Result<ConversionResult, ConverterError> {
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| ConverterError::backend("pdfium", format!("{e:?}")))?;

        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let mut images = ImageSink::new(config);
        let mut chunker = Chunker::new(config.chunk_size);
        let mut page_markdown = Vec::with_capacity(pages.len() as usize);

        for (index, page) in pages.iter().enumerate() {
            let page_id = index as u32;
            let text = page
                .text()
                .map_err(|e| ConverterError::backend("pdfium", format!("page {}: {e:?}", index + 1)))?;
            let mut md = text.all();

            let segments: Vec<(String, BoundingBox)> = text
                .segments()
                .iter()
                .map(|segment| {
                    let r = segment.bounds();
                    (
                        segment.text(),
                        BoundingBox::new(r.left.value, r.bottom.value, r.right.value, r.top.value),
                    )
                })
                .collect();

            let mut tokens = Vec::new();
            for object in page.objects().iter() {
                let Some(image) = object.as_image_object() else {
                    continue;
                };
                match image.get_raw_image() {
                    Ok(raw) => match encode_png(&raw) {
                        Ok(b64) => {
                            let alt = format!("page {} image {}", index + 1, tokens.len() + 1);
                            if let Some(token) = images.embed_b64(&alt, "image/png", &b64) {
                                tokens.push(token);
                            }
                        }
                        Err(e) => warn!("Page {}: cannot encode image: {}", index + 1, e),
                    },
                    Err(e) => warn!("Page {}: cannot extract image: {:?}", index + 1, e),
                }
            }

            for token in &tokens {
                md.push_str("\n\n");
                md.push_str(token);
            }
            debug!(
                "Page {}: {} text segments, {} images",
                index + 1,
                segments.len(),
                tokens.len()
            );

            if config.chunk {
                push_page_chunks(&mut chunker, segments, &tokens, page_id, config.chunk_size);
            }
            page_markdown.push(normalize_markdown(&md));
        }

        let mut markdown = page_markdown.join("\n");
        if let Some(placeholder) = images.placeholder() {
            markdown.push('\n');
            markdown.push_str(&placeholder);
        }

        let mut result = ConversionResult::new(normalize_markdown(&markdown), config.clone());
        if config.chunk {
            result = result.with_chunks(chunker.finish());
        }
        let title = document
            .metadata()
            .get(PdfDocumentMetadataTagType::Title)
            .map(|t| t.value().trim().to_string())
            .filter(|t| !t.is_empty());
        Ok(match title {
            Some(t) => result.with_title(t),
            None => result,
        })
    }

    /// Pack a page's text segments into chunks of at most `chunk_size` words,
    /// keeping every segment's bounding box, then add one chunk per image.
    pub(super) fn push_page_chunks(
        chunker: &mut Chunker,
        segments: Vec<(String, BoundingBox)>,
        image_tokens: &[String],
        page_id: u32,
        chunk_size: usize,
    ) {
        let mut text = String::new();
        let mut boxes = Vec::new();
        let mut words = 0usize;

        for (segment, bbox) in segments {
            let n = segment.split_whitespace().count();
            if n == 0 {
                continue;
            }
            if words > 0 && words + n > chunk_size {
                let chunk = Chunk::text(0, std::mem::take(&mut text))
                    .with_page(page_id)
                    .with_bboxes(std::mem::take(&mut boxes));
                chunker.push_chunk(chunk);
                words = 0;
            }
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(segment.trim());
            boxes.push(bbox);
            words += n;
        }
        if !text.is_empty() {
            chunker.push_chunk(Chunk::text(0, text).with_page(page_id).with_bboxes(boxes));
        }

        for token in image_tokens {
            chunker.push_chunk(Chunk::image(0, token.clone()).with_page(page_id));
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::output::ChunkModality;

        #[test]
        fn page_chunks_keep_boxes_and_ids() {
            let mut chunker = Chunker::new(3);
            let seg = |s: &str, y: f32| (s.to_string(), BoundingBox::new(0.0, y, 100.0, y + 10.0));
            push_page_chunks(
                &mut chunker,
                vec![seg("one two", 700.0), seg("three", 680.0), seg("four five", 660.0)],
                &["![p](data:image/png;base64,AA==)".to_string()],
                0,
                3,
            );
            push_page_chunks(&mut chunker, vec![seg("six", 700.0)], &[], 1, 3);
            let chunks = chunker.finish();

            assert_eq!(chunks.len(), 4);
            assert_eq!(chunks[0].content, "one two three");
            assert_eq!(chunks[0].bbox_list.as_ref().map(Vec::len), Some(2));
            assert_eq!(chunks[1].content, "four five");
            assert_eq!(chunks[2].modality, ChunkModality::Image);
            assert_eq!(chunks[2].page_id, Some(0));
            assert_eq!(chunks[3].page_id, Some(1));
            let ids: Vec<u64> = chunks.iter().map(|c| c.chunk_id).collect();
            assert_eq!(ids, [0, 1, 2, 3]);
        }
    }
}
