use super::{DocumentConverter, ReadSeek};
use crate::classify::StreamInfo;
use crate::config::ConversionConfig;
use crate::error::ConverterError;
use crate::output::ConversionResult;

/// PowerPoint presentations (.pptx).
///
/// Slides live in `ppt/slides/slideN.xml`. Each slide becomes a
/// `<!-- Slide number: N -->` section with the title placeholder as a
/// heading, then text boxes, tables and pictures in shape order, then the
/// speaker notes. With chunking on, chunks carry the zero-based slide index
/// as their page id.
pub struct PptxConverter {
    #[cfg_attr(not(feature = "office"), allow(dead_code))]
    config: ConversionConfig,
}

impl PptxConverter {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl DocumentConverter for PptxConverter {
    fn name(&self) -> &'static str {
        "PptxConverter"
    }

    #[cfg(feature = "office")]
    fn convert(
        &self,
        stream: &mut dyn ReadSeek,
        _info: &StreamInfo,
    ) -> Result<ConversionResult, ConverterError> {
        let bytes = super::read_all(stream)?;
        let deck = parse::pptx_to_slides(&bytes, &self.config)?;
        let result =
            super::finish_sections(&deck.slides, deck.placeholder.as_deref(), &self.config);
        Ok(match deck.title {
            Some(t) => result.with_title(t),
            None => result,
        })
    }

    #[cfg(not(feature = "office"))]
    fn convert(
        &self,
        _stream: &mut dyn ReadSeek,
        _info: &StreamInfo,
    ) -> Result<ConversionResult, ConverterError> {
        Err(ConverterError::missing_dependency(self.name(), ".pptx", "office"))
    }
}

#[cfg(feature = "office")]
mod parse {
    use crate::config::ConversionConfig;
    use crate::converters::ooxml::{self, get_attribute};
    use crate::converters::{markdown_table, ImageSink};
    use crate::error::ConverterError;
    use quick_xml::events::{BytesStart, Event};
    use quick_xml::Reader;
    use std::collections::HashMap;
    use std::io::{Read, Seek};
    use tracing::debug;
    use zip::ZipArchive;

    pub(super) struct Deck {
        pub(super) slides: Vec<String>,
        pub(super) title: Option<String>,
        pub(super) placeholder: Option<String>,
    }

    pub(super) fn pptx_to_slides(bytes: &[u8], config: &ConversionConfig) -> Result<Deck, ConverterError> {
        let mut archive = ooxml::open_archive(bytes)?;
        let mut slide_parts = ooxml::part_names(&archive, "ppt/slides/slide", ".xml");
        slide_parts.sort_by_key(|name| slide_number(name));
        if slide_parts.is_empty() {
            return Err(ConverterError::Malformed("no slides found in presentation".into()));
        }

        let mut images = ImageSink::new(config);
        let mut slides = Vec::with_capacity(slide_parts.len());
        for part in &slide_parts {
            let number = slide_number(part);
            let Some(xml) = ooxml::read_part(&mut archive, part)? else {
                continue;
            };
            let rels = ooxml::relationships(&mut archive, part)?;
            let slide = parse_shapes(&xml, &rels, &mut archive, &mut images)?;

            let mut md = format!("<!-- Slide number: {number} -->\n");
            if let Some(title) = &slide.title {
                md.push_str(&format!("# {title}\n\n"));
            }
            for block in &slide.blocks {
                md.push_str(block);
                md.push_str("\n\n");
            }

            let notes_part = rels.values().find(|t| t.contains("/notesSlides/")).cloned();
            if let Some(notes_part) = notes_part {
                if let Some(notes_xml) = ooxml::read_part(&mut archive, &notes_part)? {
                    let notes_rels = HashMap::new();
                    let notes = parse_shapes(&notes_xml, &notes_rels, &mut archive, &mut images)?;
                    let text = notes.blocks.join("\n");
                    if !text.trim().is_empty() {
                        md.push_str(&format!("### Notes:\n{text}\n"));
                    }
                }
            }
            slides.push(md);
        }

        debug!("PPTX: {} slides", slides.len());
        Ok(Deck {
            slides,
            title: ooxml::core_title(&mut archive),
            placeholder: images.placeholder(),
        })
    }

    fn slide_number(part: &str) -> usize {
        part.trim_start_matches("ppt/slides/slide")
            .trim_end_matches(".xml")
            .parse()
            .unwrap_or(usize::MAX)
    }

    #[derive(Default)]
    struct Slide {
        title: Option<String>,
        blocks: Vec<String>,
    }

    #[derive(Default)]
    struct Shape {
        is_title: bool,
        skip: bool,
        paragraphs: Vec<String>,
    }

    #[derive(Default)]
    struct Table {
        rows: Vec<Vec<String>>,
        row: Vec<String>,
        cell: Vec<String>,
    }

    fn parse_shapes<R: Read + Seek>(
        xml: &str,
        rels: &HashMap<String, String>,
        archive: &mut ZipArchive<R>,
        images: &mut ImageSink,
    ) -> Result<Slide, ConverterError> {
        let mut slide = Slide::default();
        let mut shape: Option<Shape> = None;
        let mut table: Option<Table> = None;
        let mut para = String::new();
        let mut in_text = false;
        let mut alt = String::new();

        let mut reader = Reader::from_str(xml);
        reader.trim_text(false);
        let mut buf = Vec::new();
        loop {
            let (event, empty) = match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => (Some(e), false),
                Ok(Event::Empty(e)) => (Some(e), true),
                Ok(Event::End(e)) => {
                    close(e.local_name().as_ref(), &mut slide, &mut shape, &mut table, &mut para, &mut in_text);
                    (None, false)
                }
                Ok(Event::Text(e)) => {
                    if in_text {
                        para.push_str(&e.unescape().unwrap_or_default());
                    }
                    (None, false)
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(ConverterError::backend("quick-xml", e)),
                _ => (None, false),
            };

            if let Some(e) = event {
                open(&e, &mut shape, &mut table, &mut para, &mut in_text, &mut alt);
                if e.local_name().as_ref() == b"blip" {
                    embed_picture(&e, rels, archive, images, &mut alt, &mut slide);
                }
                if empty {
                    close(e.local_name().as_ref(), &mut slide, &mut shape, &mut table, &mut para, &mut in_text);
                }
            }
            buf.clear();
        }
        Ok(slide)
    }

    fn open(
        e: &BytesStart,
        shape: &mut Option<Shape>,
        table: &mut Option<Table>,
        para: &mut String,
        in_text: &mut bool,
        alt: &mut String,
    ) {
        match e.local_name().as_ref() {
            b"sp" => *shape = Some(Shape::default()),
            b"ph" => {
                if let Some(s) = shape.as_mut() {
                    match get_attribute(e, "type").as_deref() {
                        Some("title") | Some("ctrTitle") => s.is_title = true,
                        Some("sldNum") | Some("dt") | Some("ftr") | Some("hdr") | Some("sldImg") => {
                            s.skip = true
                        }
                        _ => {}
                    }
                }
            }
            b"cNvPr" => *alt = get_attribute(e, "descr").unwrap_or_default(),
            b"p" => para.clear(),
            b"t" => *in_text = true,
            b"br" => para.push('\n'),
            b"tbl" => *table = Some(Table::default()),
            _ => {}
        }
    }

    fn close(
        name: &[u8],
        slide: &mut Slide,
        shape: &mut Option<Shape>,
        table: &mut Option<Table>,
        para: &mut String,
        in_text: &mut bool,
    ) {
        match name {
            b"t" => *in_text = false,
            b"p" => {
                let text = std::mem::take(para);
                let text = text.trim();
                if text.is_empty() {
                    return;
                }
                if let Some(t) = table.as_mut() {
                    t.cell.push(text.to_string());
                } else if let Some(s) = shape.as_mut() {
                    s.paragraphs.push(text.to_string());
                }
            }
            b"sp" => {
                if let Some(s) = shape.take() {
                    let text = s.paragraphs.join("\n");
                    if s.skip || text.is_empty() {
                        return;
                    }
                    if s.is_title && slide.title.is_none() {
                        slide.title = Some(text.replace('\n', " "));
                    } else {
                        slide.blocks.push(text);
                    }
                }
            }
            b"tc" => {
                if let Some(t) = table.as_mut() {
                    let cell = std::mem::take(&mut t.cell).join(" ");
                    t.row.push(cell);
                }
            }
            b"tr" => {
                if let Some(t) = table.as_mut() {
                    let row = std::mem::take(&mut t.row);
                    t.rows.push(row);
                }
            }
            b"tbl" => {
                if let Some(t) = table.take() {
                    slide.blocks.push(markdown_table(&t.rows));
                }
            }
            _ => {}
        }
    }

    fn embed_picture<R: Read + Seek>(
        e: &BytesStart,
        rels: &HashMap<String, String>,
        archive: &mut ZipArchive<R>,
        images: &mut ImageSink,
        alt: &mut String,
        slide: &mut Slide,
    ) {
        let Some(path) = get_attribute(e, "embed").and_then(|id| rels.get(&id).cloned()) else {
            return;
        };
        let alt = std::mem::take(alt);
        if let Some(token) = ooxml::embed_media(archive, &path, &alt, images) {
            slide.blocks.push(token);
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn slide_numbers_sort_numerically() {
            let mut parts = vec![
                "ppt/slides/slide10.xml".to_string(),
                "ppt/slides/slide2.xml".to_string(),
                "ppt/slides/slide1.xml".to_string(),
            ];
            parts.sort_by_key(|p| slide_number(p));
            assert_eq!(parts[0], "ppt/slides/slide1.xml");
            assert_eq!(parts[2], "ppt/slides/slide10.xml");
        }
    }
}
