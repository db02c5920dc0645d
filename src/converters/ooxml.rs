//! Helpers shared by the OOXML converters (DOCX, PPTX).
//!
//! OOXML files are ZIP archives of XML parts. Images live in separate media
//! parts and are referenced from the content XML through relationship ids
//! (`r:embed="rId5"`), resolved via the part's `_rels/<part>.rels` file.

use super::ImageSink;
use crate::classify::sniff_mimetype;
use crate::error::ConverterError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use zip::ZipArchive;

pub(crate) type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

pub(crate) fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ConverterError> {
    ZipArchive::new(Cursor::new(bytes)).map_err(|e| ConverterError::backend("zip", e))
}

/// Read a part as UTF-8 text; `Ok(None)` when the part does not exist.
pub(crate) fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, ConverterError> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut content = String::new();
            file.read_to_string(&mut content)?;
            Ok(Some(content))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(ConverterError::backend("zip", e)),
    }
}

fn read_part_bytes<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Option<Vec<u8>> {
    let mut file = archive.by_name(name).ok()?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).ok()?;
    Some(buf)
}

/// Names of all parts matching `prefix` and `suffix`.
pub(crate) fn part_names<R: Read + Seek>(archive: &ZipArchive<R>, prefix: &str, suffix: &str) -> Vec<String> {
    archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(suffix))
        .map(str::to_string)
        .collect()
}

/// Relationship id → archive path for the rels file of `part`.
///
/// `part` is e.g. `word/document.xml`; its rels live at
/// `word/_rels/document.xml.rels` and targets are relative to `word/`.
pub(crate) fn relationships<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    part: &str,
) -> Result<HashMap<String, String>, ConverterError> {
    let (dir, file) = part.rsplit_once('/').unwrap_or(("", part));
    let rels_path = if dir.is_empty() {
        format!("_rels/{file}.rels")
    } else {
        format!("{dir}/_rels/{file}.rels")
    };
    let Some(xml) = read_part(archive, &rels_path)? else {
        return Ok(HashMap::new());
    };

    let mut rels = HashMap::new();
    let mut reader = Reader::from_str(&xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let external = get_attribute(e, "TargetMode").as_deref() == Some("External");
                if let (Some(id), Some(target), false) =
                    (get_attribute(e, "Id"), get_attribute(e, "Target"), external)
                {
                    rels.insert(id, resolve_target(dir, &target));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ConverterError::backend("quick-xml", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

/// Resolve a relationship target against the directory of its source part.
pub(crate) fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut parts: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// Embed the media part `path` through `images`, sniffing its type.
pub(crate) fn embed_media<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
    alt: &str,
    images: &mut ImageSink,
) -> Option<String> {
    let bytes = read_part_bytes(archive, path)?;
    let media_type = sniff_mimetype(&bytes);
    if !media_type.starts_with("image/") {
        return None;
    }
    images.embed(alt, &media_type, &bytes)
}

/// `dc:title` from `docProps/core.xml`.
pub(crate) fn core_title<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Option<String> {
    let xml = read_part(archive, "docProps/core.xml").ok()??;
    let mut reader = Reader::from_str(&xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut in_title = false;
    let mut title = None;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"title" => in_title = true,
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"title" => in_title = false,
            Ok(Event::Text(e)) if in_title => {
                title = Some(e.unescape().unwrap_or_default().trim().to_string());
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    title.filter(|t| !t.is_empty())
}

pub(crate) fn get_attribute(e: &BytesStart, name: &str) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == name.as_bytes() {
            return Some(String::from_utf8_lossy(&attr.value).to_string());
        }
    }
    None
}
