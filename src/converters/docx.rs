use super::{DocumentConverter, ReadSeek};
use crate::classify::StreamInfo;
use crate::config::ConversionConfig;
use crate::error::ConverterError;
use crate::output::ConversionResult;

/// Word documents (.docx).
///
/// DOCX files are ZIP archives; the body lives in `word/document.xml`.
/// Headings come from `Heading N` / `Title` paragraph styles, list items from
/// numbering properties, images from `a:blip` relationship ids.
pub struct DocxConverter {
    #[cfg_attr(not(feature = "office"), allow(dead_code))]
    config: ConversionConfig,
}

impl DocxConverter {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl DocumentConverter for DocxConverter {
    fn name(&self) -> &'static str {
        "DocxConverter"
    }

    #[cfg(feature = "office")]
    fn convert(
        &self,
        stream: &mut dyn ReadSeek,
        _info: &StreamInfo,
    ) -> Result<ConversionResult, ConverterError> {
        let bytes = super::read_all(stream)?;
        let (markdown, title) = parse::docx_to_markdown(&bytes, &self.config)?;
        let result = super::finish(&markdown, &self.config);
        Ok(match title {
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
        Err(ConverterError::missing_dependency(self.name(), ".docx", "office"))
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

    const DOCUMENT_PART: &str = "word/document.xml";

    pub(super) fn docx_to_markdown(
        bytes: &[u8],
        config: &ConversionConfig,
    ) -> Result<(String, Option<String>), ConverterError> {
        let mut archive = ooxml::open_archive(bytes)?;
        let xml = ooxml::read_part(&mut archive, DOCUMENT_PART)?
            .ok_or_else(|| ConverterError::Malformed(format!("missing {DOCUMENT_PART}")))?;
        let rels = ooxml::relationships(&mut archive, DOCUMENT_PART)?;
        let title = ooxml::core_title(&mut archive);

        let mut writer = DocxWriter {
            archive: &mut archive,
            rels,
            images: ImageSink::new(config),
            blocks: Vec::new(),
            para: Paragraph::default(),
            run: Run::default(),
            tables: Vec::new(),
            in_text: false,
            image_alt: String::new(),
        };

        let mut reader = Reader::from_str(&xml);
        reader.trim_text(false);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => writer.open(e),
                Ok(Event::Empty(ref e)) => {
                    writer.open(e);
                    writer.close(e.local_name().as_ref());
                }
                Ok(Event::End(ref e)) => writer.close(e.local_name().as_ref()),
                Ok(Event::Text(e)) => {
                    if writer.in_text {
                        writer.run.text.push_str(&e.unescape().unwrap_or_default());
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(ConverterError::backend("quick-xml", e)),
                _ => {}
            }
            buf.clear();
        }

        let markdown = writer.finish();
        debug!("DOCX → {} bytes of Markdown", markdown.len());
        Ok((markdown, title))
    }

    #[derive(Default)]
    struct Paragraph {
        text: String,
        heading: Option<usize>,
        list_level: Option<usize>,
    }

    #[derive(Default)]
    struct Run {
        text: String,
        bold: bool,
        italic: bool,
    }

    #[derive(Default)]
    struct Table {
        rows: Vec<Vec<String>>,
        row: Vec<String>,
        cell: Vec<String>,
    }

    enum Block {
        Text(String),
        ListItem(String),
    }

    struct DocxWriter<'a, R: Read + Seek> {
        archive: &'a mut ZipArchive<R>,
        rels: HashMap<String, String>,
        images: ImageSink,
        blocks: Vec<Block>,
        para: Paragraph,
        run: Run,
        tables: Vec<Table>,
        in_text: bool,
        image_alt: String,
    }

    impl<R: Read + Seek> DocxWriter<'_, R> {
        fn open(&mut self, e: &BytesStart) {
            match e.local_name().as_ref() {
                b"p" => self.para = Paragraph::default(),
                b"pStyle" => {
                    if let Some(val) = get_attribute(e, "val") {
                        self.para.heading = heading_level(&val);
                    }
                }
                b"numPr" => self.para.list_level = Some(0),
                b"ilvl" => {
                    if self.para.list_level.is_some() {
                        self.para.list_level = get_attribute(e, "val").and_then(|v| v.parse().ok());
                    }
                }
                b"r" => self.run = Run::default(),
                b"b" => self.run.bold = toggle_on(e),
                b"i" => self.run.italic = toggle_on(e),
                b"t" => self.in_text = true,
                b"br" | b"cr" => self.run.text.push('\n'),
                b"tab" => self.run.text.push(' '),
                b"docPr" => {
                    self.image_alt = get_attribute(e, "descr")
                        .or_else(|| get_attribute(e, "name"))
                        .unwrap_or_default();
                }
                b"blip" => {
                    let target = get_attribute(e, "embed").and_then(|id| self.rels.get(&id).cloned());
                    if let Some(path) = target {
                        let alt = std::mem::take(&mut self.image_alt);
                        if let Some(token) = ooxml::embed_media(self.archive, &path, &alt, &mut self.images) {
                            self.flush_run();
                            self.para.text.push_str(&token);
                        }
                    }
                }
                b"tbl" => self.tables.push(Table::default()),
                b"tr" => {
                    if let Some(t) = self.tables.last_mut() {
                        t.row.clear();
                    }
                }
                b"tc" => {
                    if let Some(t) = self.tables.last_mut() {
                        t.cell.clear();
                    }
                }
                _ => {}
            }
        }

        fn close(&mut self, name: &[u8]) {
            match name {
                b"t" => self.in_text = false,
                b"r" => self.flush_run(),
                b"p" => self.flush_paragraph(),
                b"tc" => {
                    if let Some(t) = self.tables.last_mut() {
                        let cell = std::mem::take(&mut t.cell).join(" ");
                        t.row.push(cell);
                    }
                }
                b"tr" => {
                    if let Some(t) = self.tables.last_mut() {
                        let row = std::mem::take(&mut t.row);
                        t.rows.push(row);
                    }
                }
                b"tbl" => {
                    if let Some(table) = self.tables.pop() {
                        let rendered = markdown_table(&table.rows);
                        match self.tables.last_mut() {
                            // Nested tables collapse into the outer cell.
                            Some(outer) => outer.cell.push(rendered.replace('\n', " ")),
                            None => self.blocks.push(Block::Text(rendered)),
                        }
                    }
                }
                _ => {}
            }
        }

        fn flush_run(&mut self) {
            let run = std::mem::take(&mut self.run);
            let text = run.text.as_str();
            if text.trim().is_empty() {
                self.para.text.push_str(text);
                return;
            }
            let marker = match (run.bold, run.italic) {
                (true, true) => "***",
                (true, false) => "**",
                (false, true) => "*",
                (false, false) => "",
            };
            if marker.is_empty() {
                self.para.text.push_str(text);
            } else {
                // Markers hug the text; surrounding spaces stay outside.
                let lead = &text[..text.len() - text.trim_start().len()];
                let trail = &text[text.trim_end().len()..];
                self.para.text.push_str(&format!("{lead}{marker}{}{marker}{trail}", text.trim()));
            }
        }

        fn flush_paragraph(&mut self) {
            self.flush_run();
            let para = std::mem::take(&mut self.para);
            let text = para.text.trim();
            if text.is_empty() {
                return;
            }
            if let Some(table) = self.tables.last_mut() {
                table.cell.push(text.to_string());
                return;
            }
            let block = match (para.heading, para.list_level) {
                (Some(level), _) => Block::Text(format!("{} {}", "#".repeat(level), text)),
                (None, Some(level)) => Block::ListItem(format!("{}- {}", "  ".repeat(level), text)),
                (None, None) => Block::Text(text.to_string()),
            };
            self.blocks.push(block);
        }

        fn finish(self) -> String {
            let mut out = String::new();
            let mut prev_list = false;
            for block in &self.blocks {
                let (text, is_list) = match block {
                    Block::Text(t) => (t, false),
                    Block::ListItem(t) => (t, true),
                };
                if !out.is_empty() {
                    out.push_str(if prev_list && is_list { "\n" } else { "\n\n" });
                }
                out.push_str(text);
                prev_list = is_list;
            }
            if let Some(placeholder) = self.images.placeholder() {
                if !out.is_empty() {
                    out.push_str("\n\n");
                }
                out.push_str(&placeholder);
            }
            out
        }
    }

    /// `Heading1`..`Heading6` (any case, optional space) and `Title`.
    fn heading_level(style: &str) -> Option<usize> {
        let lower = style.to_ascii_lowercase();
        if lower == "title" {
            return Some(1);
        }
        let rest = lower.strip_prefix("heading")?.trim();
        rest.parse::<usize>().ok().map(|l| l.clamp(1, 6))
    }

    /// `<w:b/>` is on; `<w:b w:val="0"/>` / `"false"` is off.
    fn toggle_on(e: &BytesStart) -> bool {
        !matches!(get_attribute(e, "val").as_deref(), Some("0") | Some("false") | Some("none"))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn heading_styles() {
            assert_eq!(heading_level("Heading2"), Some(2));
            assert_eq!(heading_level("heading 3"), Some(3));
            assert_eq!(heading_level("Title"), Some(1));
            assert_eq!(heading_level("Normal"), None);
        }
    }
}

#[cfg(all(test, feature = "office"))]
mod tests {
    use super::*;
    use crate::classify::{classify_bytes, Category};
    use crate::converters::ooxml::test_support::zip_parts;
    use std::io::Cursor;

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"
            xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"
            xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"
            xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">
<w:body>
  <w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Report</w:t></w:r></w:p>
  <w:p><w:r><w:t xml:space="preserve">Plain and </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>bold</w:t></w:r><w:r><w:t>.</w:t></w:r></w:p>
  <w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>first</w:t></w:r></w:p>
  <w:p><w:pPr><w:numPr><w:ilvl w:val="1"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>second</w:t></w:r></w:p>
  <w:tbl>
    <w:tr><w:tc><w:p><w:r><w:t>H1</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>H2</w:t></w:r></w:p></w:tc></w:tr>
    <w:tr><w:tc><w:p><w:r><w:t>a</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>b</w:t></w:r></w:p></w:tc></w:tr>
  </w:tbl>
  <w:p><w:r><w:drawing><wp:inline><wp:docPr id="1" name="Picture 1" descr="logo"/>
    <a:graphic><a:graphicData><a:blip r:embed="rId7"/></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>
</w:body>
</w:document>"#;

    const RELS: &str = r#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>
</Relationships>"#;

    const PNG_1X1: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x06\0\0\0\x1f\x15\xc4\x89";

    fn docx() -> Vec<u8> {
        zip_parts(&[
            ("[Content_Types].xml", b"<Types/>"),
            ("word/document.xml", DOCUMENT.as_bytes()),
            ("word/_rels/document.xml.rels", RELS.as_bytes()),
            ("word/media/image1.png", PNG_1X1),
            (
                "docProps/core.xml",
                br#"<cp:coreProperties xmlns:cp="c" xmlns:dc="d"><dc:title>Annual</dc:title></cp:coreProperties>"#,
            ),
        ])
    }

    fn convert(config: &ConversionConfig) -> ConversionResult {
        let bytes = docx();
        let info = classify_bytes(&bytes);
        assert_eq!(info.category, Category::Docx);
        DocxConverter::new(config)
            .convert(&mut Cursor::new(bytes), &info)
            .unwrap()
    }

    #[test]
    fn structure_is_preserved() {
        let result = convert(&ConversionConfig::default());
        let md = &result.markdown;
        assert_eq!(result.title.as_deref(), Some("Annual"));
        assert!(md.starts_with("# Report\n\nPlain and **bold**.\n\n- first\n  - second\n\n"), "got: {md}");
        assert!(md.contains("| H1 | H2 |\n| --- | --- |\n| a | b |"), "got: {md}");
        assert!(md.contains("![logo](data:image/png;base64,"), "got: {md}");
    }

    #[test]
    fn images_omitted_without_modality() {
        let config = ConversionConfig::builder().modalities([]).build().unwrap();
        let md = convert(&config).markdown;
        assert!(!md.contains("data:image"));
        assert!(md.ends_with("*[1 image omitted]*\n"), "got: {md}");
    }

    #[test]
    fn missing_document_part_is_malformed() {
        let bytes = zip_parts(&[("word/styles.xml", b"<w:styles/>")]);
        let info = classify_bytes(&bytes);
        let err = DocxConverter::new(&ConversionConfig::default())
            .convert(&mut Cursor::new(bytes), &info)
            .unwrap_err();
        assert_eq!(err.error_kind(), "Malformed");
    }
}
