//! Markdown image tokens carrying base64 data URIs.
//!
//! Grammar: `![<alt>](data:<media-type>;base64,<payload>)` where `<alt>`
//! excludes `]`, `<media-type>` excludes `;` and `)`, and `<payload>` excludes
//! whitespace and `)`. Whitespace between the payload and the closing
//! parenthesis is tolerated.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static RE_DATA_URI_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[([^\]]*)\]\(data:([^;)]+);base64,([^)\s]*)\s*\)").unwrap()
});

/// One image token found in a Markdown string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageToken<'a> {
    /// Byte range of the whole token in the source string.
    pub span: Range<usize>,
    pub alt: &'a str,
    pub media_type: &'a str,
    pub payload: &'a str,
}

/// A piece of Markdown split around image tokens, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Image(ImageToken<'a>),
}

/// All image tokens in `markdown`, left to right.
pub fn find_tokens(markdown: &str) -> Vec<ImageToken<'_>> {
    RE_DATA_URI_IMAGE
        .captures_iter(markdown)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(ImageToken {
                span: whole.range(),
                alt: caps.get(1)?.as_str(),
                media_type: caps.get(2)?.as_str(),
                payload: caps.get(3)?.as_str(),
            })
        })
        .collect()
}

/// The first image token in `content`, if any.
pub fn first_token(content: &str) -> Option<ImageToken<'_>> {
    find_tokens(content).into_iter().next()
}

/// Split `markdown` into alternating text and image segments.
///
/// Text segments are raw slices; empty ones between adjacent tokens are
/// skipped, whitespace-only ones are kept for the caller to judge.
pub fn split(markdown: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    for token in find_tokens(markdown) {
        if token.span.start > cursor {
            segments.push(Segment::Text(&markdown[cursor..token.span.start]));
        }
        cursor = token.span.end;
        segments.push(Segment::Image(token));
    }
    if cursor < markdown.len() {
        segments.push(Segment::Text(&markdown[cursor..]));
    }
    segments
}

/// Build a token. The inverse of [`find_tokens`] for well-formed input.
pub fn make_token(alt: &str, media_type: &str, payload_b64: &str) -> String {
    let alt: String = alt.chars().filter(|c| *c != ']' && *c != '\n').collect();
    format!("![{alt}](data:{media_type};base64,{payload_b64})")
}

/// Number of image tokens in `markdown`.
pub fn count_tokens(markdown: &str) -> usize {
    RE_DATA_URI_IMAGE.find_iter(markdown).count()
}

/// Placeholder that replaces embedded images when the image modality is off.
pub fn omitted_placeholder(count: usize) -> String {
    if count == 1 {
        "*[1 image omitted]*".to_string()
    } else {
        format!("*[{count} images omitted]*")
    }
}
