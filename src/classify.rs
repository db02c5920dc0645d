//! Content-signature classification: bytes → mimetype → [`Category`].
//!
//! Classification looks only at the bytes. File names and extensions are
//! never consulted, so a renamed `.pdf` that is really a PNG is routed to the
//! image converter.
//!
//! Two steps, both pure:
//!
//! 1. [`sniff_mimetype`] matches magic numbers and, for container formats,
//!    looks inside (ZIP part names for OOXML, OLE stream names for legacy
//!    Office, text heuristics for HTML and CSV).
//! 2. [`categorize`] runs the mimetype through an ordered rule table. The
//!    OOXML rules sit above the legacy `application/vnd.ms-*` prefix rules,
//!    so macro-enabled and XML-based Office documents always reach the XML
//!    converters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use tracing::debug;

/// Coarse document-type bucket used for converter routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Text,
    Html,
    Pdf,
    Docx,
    Xlsx,
    Xls,
    Pptx,
    Csv,
    Image,
    Audio,
    Video,
    /// Legacy PowerPoint. Recognised, never converted.
    Ppt,
    /// Legacy Word. Recognised, never converted.
    Doc,
    Other,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Category; 14] = [
        Category::Text,
        Category::Html,
        Category::Pdf,
        Category::Docx,
        Category::Xlsx,
        Category::Xls,
        Category::Pptx,
        Category::Csv,
        Category::Image,
        Category::Audio,
        Category::Video,
        Category::Ppt,
        Category::Doc,
        Category::Other,
    ];

    /// `true` for formats that are recognised but deliberately unsupported.
    pub fn is_unsupported_known(self) -> bool {
        matches!(self, Category::Ppt | Category::Doc)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Text => "text",
            Category::Html => "html",
            Category::Pdf => "pdf",
            Category::Docx => "docx",
            Category::Xlsx => "xlsx",
            Category::Xls => "xls",
            Category::Pptx => "pptx",
            Category::Csv => "csv",
            Category::Image => "image",
            Category::Audio => "audio",
            Category::Video => "video",
            Category::Ppt => "ppt",
            Category::Doc => "doc",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mimetype and category of one input stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub mimetype: String,
    pub category: Category,
}

// ── Mimetype constants ──────────────────────────────────────────────────────

pub const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_DOC: &str = "application/msword";
pub const MIME_XLS: &str = "application/vnd.ms-excel";
pub const MIME_PPT: &str = "application/vnd.ms-powerpoint";

// ── Stream entry point ──────────────────────────────────────────────────────

/// Classify a seekable stream without moving its read cursor.
///
/// The whole stream is read from offset 0; the original position is restored
/// before returning, so the converter observes the stream as if
/// classification never happened. Only I/O can fail; the classification
/// itself always produces a result.
pub fn classify_stream<R: Read + Seek + ?Sized>(stream: &mut R) -> std::io::Result<StreamInfo> {
    let original = stream.stream_position()?;
    stream.seek(SeekFrom::Start(0))?;
    let mut content = Vec::new();
    let read = stream.read_to_end(&mut content);
    // Restore before surfacing a read error so the caller's cursor is intact.
    stream.seek(SeekFrom::Start(original))?;
    read?;
    Ok(classify_bytes(&content))
}

/// Classify an in-memory buffer. Deterministic and infallible.
pub fn classify_bytes(content: &[u8]) -> StreamInfo {
    let mimetype = sniff_mimetype(content);
    let category = categorize(&mimetype);
    debug!("Classified {} bytes as {} ({})", content.len(), mimetype, category);
    StreamInfo { mimetype, category }
}

// ── Category rule table ─────────────────────────────────────────────────────

enum MimeMatch {
    Exact(&'static str),
    Prefix(&'static str),
    AnyOf(&'static [&'static str]),
}

impl MimeMatch {
    fn matches(&self, mimetype: &str) -> bool {
        match self {
            MimeMatch::Exact(m) => mimetype == *m,
            MimeMatch::Prefix(p) => mimetype.starts_with(p),
            MimeMatch::AnyOf(set) => set.contains(&mimetype),
        }
    }
}

/// Ordered rules, first match wins.
static RULES: &[(MimeMatch, Category)] = &[
    (
        MimeMatch::AnyOf(&["image/webp", "image/jpeg", "image/png", "image/jpg"]),
        Category::Image,
    ),
    (MimeMatch::Prefix("image/"), Category::Other),
    (MimeMatch::Prefix("audio/"), Category::Audio),
    (MimeMatch::Prefix("video/"), Category::Video),
    // Spreadsheets: OOXML (incl. macro-enabled / binary workbooks) before legacy.
    (
        MimeMatch::Prefix("application/vnd.openxmlformats-officedocument.spreadsheetml"),
        Category::Xlsx,
    ),
    (MimeMatch::Prefix("application/vnd.ms-excel.sheet."), Category::Xlsx),
    (MimeMatch::Prefix("application/vnd.ms-excel"), Category::Xls),
    // Presentations.
    (MimeMatch::Exact(MIME_PPTX), Category::Pptx),
    (
        MimeMatch::Prefix("application/vnd.ms-powerpoint.presentation."),
        Category::Pptx,
    ),
    (MimeMatch::Prefix("application/vnd.ms-powerpoint"), Category::Ppt),
    // Word processing.
    (MimeMatch::Exact(MIME_DOCX), Category::Docx),
    (MimeMatch::Prefix("application/vnd.ms-word.document."), Category::Docx),
    (MimeMatch::Prefix("application/msword"), Category::Doc),
    (MimeMatch::Exact("application/pdf"), Category::Pdf),
    (MimeMatch::AnyOf(&["text/csv", "application/csv"]), Category::Csv),
    (
        MimeMatch::AnyOf(&["text/html", "application/xhtml+xml"]),
        Category::Html,
    ),
    (MimeMatch::Prefix("text/"), Category::Text),
];

/// Map a mimetype to exactly one category.
pub fn categorize(mimetype: &str) -> Category {
    let mimetype = mimetype.trim().to_ascii_lowercase();
    // Drop parameters such as "; charset=utf-8".
    let essence = mimetype.split(';').next().unwrap_or("").trim();
    RULES
        .iter()
        .find(|(rule, _)| rule.matches(essence))
        .map(|(_, category)| *category)
        .unwrap_or(Category::Other)
}

// ── Signature sniffing ──────────────────────────────────────────────────────

const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const EBML_MAGIC: &[u8] = &[0x1A, 0x45, 0xDF, 0xA3];

/// Derive a mimetype from the content signature.
pub fn sniff_mimetype(content: &[u8]) -> String {
    sniff_static(content)
        .map(str::to_string)
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

fn sniff_static(b: &[u8]) -> Option<&'static str> {
    if b.is_empty() {
        return Some("application/x-empty");
    }
    if b.starts_with(PNG_MAGIC) {
        return Some("image/png");
    }
    if b.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if b.starts_with(b"GIF87a") || b.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if b.starts_with(b"II*\0") || b.starts_with(b"MM\0*") {
        return Some("image/tiff");
    }
    if b.len() >= 12 && b.starts_with(b"RIFF") {
        return match &b[8..12] {
            b"WEBP" => Some("image/webp"),
            b"WAVE" => Some("audio/x-wav"),
            b"AVI " => Some("video/x-msvideo"),
            _ => None,
        };
    }
    if b.starts_with(b"%PDF-") {
        return Some("application/pdf");
    }
    if b.starts_with(ZIP_MAGIC) {
        return Some(sniff_zip(b));
    }
    if b.starts_with(OLE_MAGIC) {
        return Some(sniff_ole(b));
    }
    if b.starts_with(b"ID3") || is_mpeg_frame_sync(b) {
        return Some("audio/mpeg");
    }
    if b.starts_with(b"OggS") {
        return Some("audio/ogg");
    }
    if b.starts_with(b"fLaC") {
        return Some("audio/flac");
    }
    if b.len() >= 12 && &b[4..8] == b"ftyp" {
        return Some(match &b[8..12] {
            b"M4A " | b"M4B " => "audio/mp4",
            b"qt  " => "video/quicktime",
            b"heic" | b"heix" | b"mif1" => "image/heic",
            _ => "video/mp4",
        });
    }
    if b.starts_with(EBML_MAGIC) {
        return Some(if contains(&b[..b.len().min(64)], b"webm") {
            "video/webm"
        } else {
            "video/x-matroska"
        });
    }
    if b.len() >= 26 && b.starts_with(b"BM") {
        return Some("image/bmp");
    }
    sniff_text(b)
}

/// MPEG audio frame header: 11 set sync bits, a valid layer, and a bitrate
/// index that is neither "free" nor "bad".
fn is_mpeg_frame_sync(b: &[u8]) -> bool {
    if b.len() < 3 || b[0] != 0xFF || (b[1] & 0xE0) != 0xE0 {
        return false;
    }
    let layer = (b[1] >> 1) & 0x03;
    let bitrate = b[2] >> 4;
    layer != 0 && bitrate != 0 && bitrate != 0x0F
}

/// OOXML packages are ZIP archives; the part names appear uncompressed in both
/// the local headers and the central directory. Only the main part of each
/// package type counts, so an archive that merely has a `word/` folder stays
/// a plain ZIP.
fn sniff_zip(b: &[u8]) -> &'static str {
    if contains(b, b"word/document.xml") {
        MIME_DOCX
    } else if contains(b, b"xl/workbook.xml") {
        MIME_XLSX
    } else if contains(b, b"ppt/presentation.xml") {
        MIME_PPTX
    } else {
        "application/zip"
    }
}

/// Legacy Office files are OLE compound documents; the directory stores
/// stream names as UTF-16LE.
fn sniff_ole(b: &[u8]) -> &'static str {
    if contains(b, &utf16le("WordDocument")) {
        MIME_DOC
    } else if contains(b, &utf16le("PowerPoint Document")) {
        MIME_PPT
    } else if contains(b, &utf16le("Workbook")) || contains(b, &utf16le("Book")) {
        MIME_XLS
    } else {
        "application/x-ole-storage"
    }
}

fn sniff_text(b: &[u8]) -> Option<&'static str> {
    let body = b.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(b);
    if body.contains(&0) {
        return None;
    }
    // Tolerate a multi-byte character cut at the sniffing boundary only.
    let text = match std::str::from_utf8(body) {
        Ok(t) => t,
        Err(e) if e.error_len().is_none() => std::str::from_utf8(&body[..e.valid_up_to()]).ok()?,
        Err(_) => return None,
    };
    if text.chars().any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t' | '\x0C')) {
        return None;
    }

    let head: String = text.chars().take(1024).collect::<String>().to_ascii_lowercase();
    let head_trim = head.trim_start();
    if head_trim.starts_with("<!doctype html")
        || head_trim.starts_with("<html")
        || head.contains("<html")
        || head.contains("<body")
        || (head.contains("<head") && head.contains("</"))
    {
        return Some("text/html");
    }
    if head_trim.starts_with("<?xml") {
        return Some("text/xml");
    }
    if looks_like_csv(text) {
        return Some("text/csv");
    }
    Some("text/plain")
}

/// At least two lines, every sampled line with the same non-zero number of
/// unquoted commas.
fn looks_like_csv(text: &str) -> bool {
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(20)
        .collect();
    if lines.len() < 2 {
        return false;
    }
    let first = unquoted_commas(lines[0]);
    first > 0 && lines.iter().all(|l| unquoted_commas(l) == first)
}

fn unquoted_commas(line: &str) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => count += 1,
            _ => {}
        }
    }
    count
}

fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ole_with_stream(name: &str) -> Vec<u8> {
        let mut b = OLE_MAGIC.to_vec();
        b.extend_from_slice(&[0u8; 504]);
        b.extend_from_slice(&utf16le(name));
        b.extend_from_slice(&[0u8; 64]);
        b
    }

    fn zip_with_part(name: &str) -> Vec<u8> {
        let mut b = ZIP_MAGIC.to_vec();
        b.extend_from_slice(&[0u8; 26]);
        b.extend_from_slice(name.as_bytes());
        b
    }

    #[test]
    fn image_signatures() {
        assert_eq!(classify_bytes(b"\x89PNG\r\n\x1a\n0000").category, Category::Image);
        assert_eq!(classify_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]).category, Category::Image);
        let webp = b"RIFF\x10\0\0\0WEBPVP8 ";
        assert_eq!(classify_bytes(webp).mimetype, "image/webp");
        // GIF is an image but not one the image converter accepts.
        assert_eq!(classify_bytes(b"GIF89a....").category, Category::Other);
    }

    #[test]
    fn audio_and_video_signatures() {
        assert_eq!(classify_bytes(b"ID3\x04\0\0\0\0\0\0").category, Category::Audio);
        assert_eq!(classify_bytes(b"RIFF\0\0\0\0WAVEfmt ").category, Category::Audio);
        assert_eq!(classify_bytes(b"\0\0\0\x20ftypM4A \0\0\0\0").mimetype, "audio/mp4");
        assert_eq!(classify_bytes(b"\0\0\0\x20ftypisom\0\0\0\0").category, Category::Video);
    }

    #[test]
    fn pdf_signature() {
        let info = classify_bytes(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n");
        assert_eq!(info.mimetype, "application/pdf");
        assert_eq!(info.category, Category::Pdf);
    }

    #[test]
    fn ooxml_parts_route_to_xml_categories() {
        assert_eq!(classify_bytes(&zip_with_part("word/document.xml")).category, Category::Docx);
        assert_eq!(classify_bytes(&zip_with_part("xl/workbook.xml")).category, Category::Xlsx);
        assert_eq!(
            classify_bytes(&zip_with_part("ppt/presentation.xml")).category,
            Category::Pptx
        );
        assert_eq!(classify_bytes(&zip_with_part("readme.txt")).category, Category::Other);
    }

    #[test]
    fn folder_names_alone_do_not_make_a_package() {
        for part in ["password/readme.txt", "keyword/notes.xml", "excel_xl/data.bin", "ppt/"] {
            let info = classify_bytes(&zip_with_part(part));
            assert_eq!(info.mimetype, "application/zip", "{part}");
            assert_eq!(info.category, Category::Other, "{part}");
        }
    }

    #[test]
    fn legacy_office_signatures() {
        let ppt = classify_bytes(&ole_with_stream("PowerPoint Document"));
        assert_eq!(ppt.mimetype, MIME_PPT);
        assert_eq!(ppt.category, Category::Ppt);
        assert_eq!(classify_bytes(&ole_with_stream("WordDocument")).category, Category::Doc);
        assert_eq!(classify_bytes(&ole_with_stream("Workbook")).category, Category::Xls);
    }

    #[test]
    fn ooxml_rules_take_precedence_over_legacy_prefixes() {
        assert_eq!(categorize("application/vnd.ms-excel.sheet.macroEnabled.12"), Category::Xlsx);
        assert_eq!(categorize("application/vnd.ms-excel"), Category::Xls);
        assert_eq!(
            categorize("application/vnd.ms-powerpoint.presentation.macroEnabled.12"),
            Category::Pptx
        );
        assert_eq!(categorize(MIME_PPT), Category::Ppt);
        assert_eq!(categorize("application/vnd.ms-word.document.macroEnabled.12"), Category::Docx);
        assert_eq!(categorize(MIME_DOC), Category::Doc);
        assert_eq!(categorize(MIME_DOCX), Category::Docx);
        assert_eq!(categorize(MIME_XLSX), Category::Xlsx);
        assert_eq!(categorize(MIME_PPTX), Category::Pptx);
    }

    #[test]
    fn text_family() {
        assert_eq!(classify_bytes(b"hello world\n").mimetype, "text/plain");
        assert_eq!(classify_bytes(b"<!DOCTYPE html><html></html>").category, Category::Html);
        assert_eq!(classify_bytes(b"a,b,c\n1,2,3\n4,5,6\n").category, Category::Csv);
        assert_eq!(classify_bytes(b"a,b\n\"x,y\",2\n").category, Category::Csv);
        assert_eq!(classify_bytes(b"<?xml version=\"1.0\"?><a/>").category, Category::Text);
        assert_eq!(categorize("application/csv"), Category::Csv);
        assert_eq!(categorize("text/plain; charset=utf-8"), Category::Text);
    }

    #[test]
    fn unrecognised_is_other_never_an_error() {
        assert_eq!(classify_bytes(&[0x00, 0x01, 0x02, 0xFE]).category, Category::Other);
        assert_eq!(classify_bytes(b"").category, Category::Other);
        assert_eq!(categorize(""), Category::Other);
    }

    #[test]
    fn classification_is_deterministic() {
        let inputs: [&[u8]; 4] = [b"plain", b"%PDF-1.4", b"\x89PNG\r\n\x1a\n", &[0xAA; 32]];
        for input in inputs {
            assert_eq!(classify_bytes(input), classify_bytes(input));
        }
    }

    #[test]
    fn stream_cursor_is_restored() {
        let mut cursor = Cursor::new(b"some plain text body".to_vec());
        cursor.set_position(5);
        let info = classify_stream(&mut cursor).unwrap();
        assert_eq!(info.category, Category::Text);
        assert_eq!(cursor.position(), 5);

        // A second call sees the whole buffer again.
        let again = classify_stream(&mut cursor).unwrap();
        assert_eq!(info, again);
        assert_eq!(cursor.position(), 5);
    }
}
