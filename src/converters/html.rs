use super::{DocumentConverter, ReadSeek};
use crate::classify::StreamInfo;
use crate::config::ConversionConfig;
use crate::error::ConverterError;
use crate::output::ConversionResult;

/// HTML documents rendered to Markdown by walking the DOM.
pub struct HtmlConverter {
    #[cfg_attr(not(feature = "html"), allow(dead_code))]
    config: ConversionConfig,
}

impl HtmlConverter {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl DocumentConverter for HtmlConverter {
    fn name(&self) -> &'static str {
        "HtmlConverter"
    }

    #[cfg(feature = "html")]
    fn convert(
        &self,
        stream: &mut dyn ReadSeek,
        _info: &StreamInfo,
    ) -> Result<ConversionResult, ConverterError> {
        let bytes = super::read_all(stream)?;
        let html = super::text::decode_text(&bytes);
        let (markdown, title) = render::html_to_markdown(&html, &self.config);
        let result = super::finish(&markdown, &self.config);
        Ok(match title {
            Some(t) => result.with_title(t),
            None => result,
        })
    }

    #[cfg(not(feature = "html"))]
    fn convert(
        &self,
        _stream: &mut dyn ReadSeek,
        _info: &StreamInfo,
    ) -> Result<ConversionResult, ConverterError> {
        Err(ConverterError::missing_dependency(self.name(), ".html", "html"))
    }
}

#[cfg(feature = "html")]
mod render {
    use crate::config::ConversionConfig;
    use crate::converters::{markdown_table, ImageSink};
    use scraper::{ElementRef, Html, Selector};
    use tracing::debug;

    pub(super) fn html_to_markdown(html: &str, config: &ConversionConfig) -> (String, Option<String>) {
        let document = Html::parse_document(html);
        let title = extract_title(&document);

        let mut writer = HtmlWriter {
            images: ImageSink::new(config),
        };
        let mut out = String::new();
        writer.element(document.root_element(), &mut out);
        if let Some(placeholder) = writer.images.placeholder() {
            push_block(&mut out, &placeholder);
        }
        debug!("Rendered {} bytes of HTML → {} bytes of Markdown", html.len(), out.len());
        (out, title)
    }

    fn extract_title(document: &Html) -> Option<String> {
        let title_selector = Selector::parse("title").ok()?;
        document
            .select(&title_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
    }

    struct HtmlWriter {
        images: ImageSink,
    }

    impl HtmlWriter {
        fn children(&mut self, el: ElementRef<'_>, out: &mut String) {
            for node in el.children() {
                if let Some(child) = ElementRef::wrap(node) {
                    self.element(child, out);
                } else if let Some(text) = node.value().as_text() {
                    push_text(out, text);
                }
            }
        }

        /// Children rendered on a single line.
        fn inline(&mut self, el: ElementRef<'_>) -> String {
            let mut s = String::new();
            self.children(el, &mut s);
            collapse_whitespace(&s)
        }

        fn element(&mut self, el: ElementRef<'_>, out: &mut String) {
            let name = el.value().name();
            match name {
                "script" | "style" | "noscript" | "head" | "template" => {}
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    let level = name[1..].parse::<usize>().unwrap_or(1);
                    let text = self.inline(el);
                    if !text.is_empty() {
                        push_block(out, &format!("{} {}", "#".repeat(level), text));
                    }
                }
                "br" => out.push('\n'),
                "hr" => push_block(out, "---"),
                "ul" | "ol" => {
                    let mut lines = String::new();
                    self.list(el, &mut lines, 0);
                    push_block(out, lines.trim_end());
                }
                "table" => {
                    let table = self.table(el);
                    push_block(out, &table);
                }
                "pre" => {
                    let code = el.text().collect::<String>();
                    push_block(out, &format!("```\n{}\n```", code.trim_end()));
                }
                "code" => {
                    let code = el.text().collect::<String>();
                    if !code.trim().is_empty() {
                        out.push_str(&format!("`{}`", code.trim()));
                    }
                }
                "strong" | "b" => self.wrapped(el, out, "**"),
                "em" | "i" => self.wrapped(el, out, "*"),
                "a" => {
                    let text = self.inline(el);
                    match el.value().attr("href") {
                        Some(href) if !href.starts_with("javascript:") && !text.is_empty() => {
                            out.push_str(&format!("[{text}]({href})"));
                        }
                        _ => out.push_str(&text),
                    }
                }
                "img" => self.image(el, out),
                "blockquote" => {
                    let mut inner = String::new();
                    self.children(el, &mut inner);
                    let quoted: Vec<String> = inner
                        .trim()
                        .lines()
                        .map(|l| format!("> {}", l.trim()).trim_end().to_string())
                        .collect();
                    push_block(out, &quoted.join("\n"));
                }
                "p" | "div" | "section" | "article" | "main" | "header" | "footer" | "nav"
                | "aside" | "figure" | "figcaption" | "body" | "html" => {
                    let mut inner = String::new();
                    self.children(el, &mut inner);
                    push_block(out, inner.trim());
                }
                _ => self.children(el, out),
            }
        }

        fn wrapped(&mut self, el: ElementRef<'_>, out: &mut String, marker: &str) {
            let text = self.inline(el);
            if !text.is_empty() {
                out.push_str(&format!("{marker}{text}{marker}"));
            }
        }

        fn list(&mut self, el: ElementRef<'_>, out: &mut String, depth: usize) {
            let ordered = el.value().name() == "ol";
            let mut n = 1;
            for item in el.children().filter_map(ElementRef::wrap) {
                if item.value().name() != "li" {
                    continue;
                }
                let marker = if ordered { format!("{n}.") } else { "-".to_string() };
                n += 1;

                let mut text = String::new();
                let mut nested = String::new();
                for node in item.children() {
                    match ElementRef::wrap(node) {
                        Some(child) if matches!(child.value().name(), "ul" | "ol") => {
                            self.list(child, &mut nested, depth + 1);
                        }
                        Some(child) => self.element(child, &mut text),
                        None => {
                            if let Some(t) = node.value().as_text() {
                                push_text(&mut text, t);
                            }
                        }
                    }
                }
                out.push_str(&format!(
                    "{}{} {}\n",
                    "  ".repeat(depth),
                    marker,
                    collapse_whitespace(&text)
                ));
                out.push_str(&nested);
            }
        }

        fn table(&mut self, el: ElementRef<'_>) -> String {
            let rows: Vec<Vec<String>> = el
                .descendants()
                .filter_map(ElementRef::wrap)
                .filter(|e| e.value().name() == "tr")
                .map(|tr| {
                    tr.children()
                        .filter_map(ElementRef::wrap)
                        .filter(|c| matches!(c.value().name(), "td" | "th"))
                        .map(|c| self.inline(c))
                        .collect()
                })
                .collect();
            markdown_table(&rows)
        }

        fn image(&mut self, el: ElementRef<'_>, out: &mut String) {
            let src = el.value().attr("src").unwrap_or("").trim();
            let alt = el.value().attr("alt").unwrap_or("");
            if let Some((media_type, payload)) = src
                .strip_prefix("data:")
                .and_then(|rest| rest.split_once(";base64,"))
            {
                if let Some(token) = self.images.embed_b64(alt, media_type, payload.trim()) {
                    out.push_str(&token);
                }
                return;
            }
            if !src.is_empty() {
                out.push_str(&format!("![{alt}]({src})"));
            }
        }
    }

    fn push_text(out: &mut String, text: &str) {
        let collapsed = collapse_whitespace(text);
        let lead = text.starts_with(char::is_whitespace);
        if (lead || collapsed.is_empty()) && !out.is_empty() && !out.ends_with(char::is_whitespace) {
            out.push(' ');
        }
        if collapsed.is_empty() {
            return;
        }
        out.push_str(&collapsed);
        if text.ends_with(char::is_whitespace) {
            out.push(' ');
        }
    }

    fn push_block(out: &mut String, block: &str) {
        if block.is_empty() {
            return;
        }
        let kept = out.trim_end_matches([' ', '\t']).len();
        out.truncate(kept);
        if !out.is_empty() && !out.ends_with("\n\n") {
            out.push_str(if out.ends_with('\n') { "\n" } else { "\n\n" });
        }
        out.push_str(block);
        out.push_str("\n\n");
    }

    fn collapse_whitespace(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
