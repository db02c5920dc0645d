//! Normalization: deterministic cleanup of converter-generated Markdown.
//!
//! Every converter funnels its output through [`normalize_markdown`] so that
//! callers see the same line-ending, spacing and trailing-newline conventions
//! regardless of the source format. Rules never touch the inside of a line
//! beyond trailing whitespace and invisible characters, so embedded data URIs
//! survive unchanged.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so every later rule can split on `\n`;
//! invisible characters are stripped before blank-line collapsing so a line
//! holding only a zero-width space counts as blank.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all normalization rules.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 3. Trim trailing whitespace per line
/// 4. Collapse runs of blank lines down to one
/// 5. Ensure heading lines have a blank line before them
/// 6. Trim leading blank lines and end with exactly one newline
pub fn normalize_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = normalise_heading_spacing(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 5: Normalise heading spacing ────────────────────────────────────────

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6} ").unwrap());

fn normalise_heading_spacing(input: &str) -> String {
    let mut result = String::with_capacity(input.len() + 64);
    for (i, line) in input.lines().enumerate() {
        if RE_HEADING.is_match(line) && i > 0 {
            let trimmed = result.trim_end_matches('\n');
            result.truncate(trimmed.len());
            result.push_str("\n\n");
        }
        result.push_str(line);
        result.push('\n');
    }
    result
}

// ── Rule 6: Trim edges, single final newline ────────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_start_matches('\n').trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}\n", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(trim_trailing_whitespace("  hello   \nworld  "), "  hello\nworld");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_heading_spacing() {
        let result = normalise_heading_spacing("some text\n# Heading\nmore text");
        assert!(result.contains("text\n\n# Heading\n"));
        // Hashtags are not headings.
        let result = normalise_heading_spacing("a\n#tag");
        assert_eq!(result, "a\n#tag\n");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_empty_document_stays_empty() {
        assert_eq!(normalize_markdown(" \n\n \r\n"), "");
    }

    #[test]
    fn test_data_uri_untouched() {
        let token = "![x](data:image/png;base64,iVBORw0KGgo=)";
        let out = normalize_markdown(&format!("Intro\r\n{token}   \r\nOutro"));
        assert_eq!(out, format!("Intro\n{token}\nOutro\n"));
    }

    #[test]
    fn test_full_pipeline() {
        let input = "\n\n# Title\r\n\r\nSome text   \n\n\n\n\n\n## Section\nbody";
        let result = normalize_markdown(input);
        assert_eq!(result, "# Title\n\nSome text\n\n## Section\nbody\n");
    }
}
