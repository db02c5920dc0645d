//! Markdown chunking for converters that have no native segmentation.
//!
//! Paragraphs (blank-line separated) are packed greedily until the next one
//! would exceed `chunk_size` words; a single paragraph longer than that is
//! split on word boundaries. Every image token becomes its own image chunk,
//! so each chunk carries exactly one modality. Chunk ids increase by one
//! across the whole document.

use crate::output::Chunk;
use crate::pipeline::datauri::{self, Segment};

/// Stateful chunker so multi-page converters keep ids monotonic.
#[derive(Debug)]
pub struct Chunker {
    chunk_size: usize,
    next_id: u64,
    chunks: Vec<Chunk>,
}

impl Chunker {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            next_id: 0,
            chunks: Vec::new(),
        }
    }

    /// Chunk one Markdown fragment, tagging every chunk with `page_id`.
    pub fn push_markdown(&mut self, markdown: &str, page_id: Option<u32>) {
        let mut pending: Vec<&str> = Vec::new();
        let mut pending_words = 0usize;

        for segment in datauri::split(markdown) {
            match segment {
                Segment::Text(text) => {
                    for para in paragraphs(text) {
                        let words = para.split_whitespace().count();
                        if pending_words > 0 && pending_words + words > self.chunk_size {
                            self.flush_text(&mut pending, page_id);
                            pending_words = 0;
                        }
                        if words > self.chunk_size {
                            self.push_long_paragraph(para, page_id);
                        } else {
                            pending.push(para);
                            pending_words += words;
                        }
                    }
                }
                Segment::Image(token) => {
                    self.flush_text(&mut pending, page_id);
                    pending_words = 0;
                    let content = markdown[token.span].to_string();
                    self.push(Chunk::image(self.next_id, content), page_id);
                }
            }
        }
        self.flush_text(&mut pending, page_id);
    }

    /// Append a chunk built elsewhere, assigning the next id.
    pub fn push_chunk(&mut self, mut chunk: Chunk) {
        chunk.chunk_id = self.next_id;
        self.next_id += 1;
        self.chunks.push(chunk);
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn finish(self) -> Vec<Chunk> {
        self.chunks
    }

    fn push_long_paragraph(&mut self, para: &str, page_id: Option<u32>) {
        let words: Vec<&str> = para.split_whitespace().collect();
        for window in words.chunks(self.chunk_size) {
            let chunk = Chunk::text(self.next_id, window.join(" "));
            self.push(chunk, page_id);
        }
    }

    fn flush_text(&mut self, pending: &mut Vec<&str>, page_id: Option<u32>) {
        if pending.is_empty() {
            return;
        }
        let chunk = Chunk::text(self.next_id, pending.join("\n\n"));
        pending.clear();
        self.push(chunk, page_id);
    }

    fn push(&mut self, mut chunk: Chunk, page_id: Option<u32>) {
        chunk.page_id = page_id;
        self.push_chunk(chunk);
    }
}

/// Chunk a whole document with ids starting at 0.
pub fn chunk_markdown(markdown: &str, chunk_size: usize) -> Vec<Chunk> {
    let mut chunker = Chunker::new(chunk_size);
    chunker.push_markdown(markdown, None);
    chunker.finish()
}

fn paragraphs(text: &str) -> impl Iterator<Item = &str> {
    text.split("\n\n").map(str::trim).filter(|p| !p.is_empty())
}
