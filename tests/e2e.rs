//! End-to-end tests for PDF conversion through pdfium.
//!
//! These need the pdfium shared library at runtime (`PDFIUM_LIB_PATH`, the
//! working directory, or the system library path). They are gated behind the
//! `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/opt/pdfium/lib cargo test --test e2e -- --nocapture
//!
//! Tests that read `./test_cases/*.pdf` skip themselves when the file is
//! absent; the rest build their PDF in memory.

#![cfg(feature = "pdf")]

use markitup::{
    convert_to_file, BatchConfig, Category, ContentBlock, ConversionConfig, MarkItUp,
    MarkItUpError,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

macro_rules! e2e_skip_unless_enabled {
    () => {
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    };
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        e2e_skip_unless_enabled!();
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

/// A small, valid PDF: one Helvetica text line per page.
fn pdf_with_pages(lines: &[&str]) -> Vec<u8> {
    let n = lines.len();
    // Objects: 1 catalog, 2 pages, 3 font, then (page, content) per page.
    let mut objects: Vec<String> = Vec::new();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        n
    ));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());
    for (i, line) in lines.iter().enumerate() {
        let content_id = 5 + 2 * i;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {content_id} 0 R >>"
        ));
        let stream = format!("BT /F1 18 Tf 72 720 Td ({line}) Tj ET");
        objects.push(format!(
            "<< /Length {} >>\nstream\n{stream}\nendstream",
            stream.len()
        ));
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }
    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for off in offsets {
        out.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    out
}

// ── In-memory PDFs ───────────────────────────────────────────────────────────

#[test]
fn test_pdf_text_per_page() {
    e2e_skip_unless_enabled!();
    let pdf = pdf_with_pages(&["First page text", "Second page text"]);

    let (result, info) = MarkItUp::default()
        .convert_bytes(&pdf)
        .expect("conversion should succeed");
    assert_eq!(info.category, Category::Pdf);

    let md = &result.markdown;
    let first = md.find("First page text").expect("page 1 text");
    let second = md.find("Second page text").expect("page 2 text");
    assert!(first < second, "pages out of order: {md}");
    assert!(md.ends_with('\n'));
}

#[test]
fn test_pdf_chunks_carry_page_and_boxes() {
    e2e_skip_unless_enabled!();
    let pdf = pdf_with_pages(&["alpha beta", "gamma delta"]);
    let config = ConversionConfig::builder().chunk(true).build().unwrap();

    let (mut result, _) = MarkItUp::new(config).convert_bytes(&pdf).unwrap();
    let chunks = result.chunks.clone().expect("pdf converter attaches chunks");
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].page_id, Some(0));
    assert_eq!(chunks[1].page_id, Some(1));
    for chunk in &chunks {
        let boxes = chunk.bbox_list.as_ref().expect("text chunks carry boxes");
        assert!(!boxes.is_empty());
        assert!(boxes.iter().all(|b| b.x1 > b.x0 && b.y1 > b.y0));
    }

    let blocks = result.to_blocks().unwrap();
    let meta = blocks[1].metadata().expect("metadata");
    assert_eq!(meta.chunk_id, 1);
    assert_eq!(meta.page_id, Some(1));
    assert!(matches!(blocks[0], ContentBlock::Text { .. }));
}

#[test]
fn test_corrupt_pdf_is_a_conversion_failure() {
    e2e_skip_unless_enabled!();
    let err = MarkItUp::default()
        .convert_bytes(b"%PDF-1.7\nthis is not really a pdf")
        .unwrap_err();
    match err {
        MarkItUpError::FileConversionFailed { message, attempts } => {
            assert!(message.contains("application/pdf"));
            assert_eq!(attempts[0].converter, "PdfConverter");
        }
        // No pdfium available on this machine.
        MarkItUpError::MissingDependency { feature, .. } => assert_eq!(feature, "pdfium"),
        other => panic!("unexpected error: {other}"),
    }
}

// ── Fixture files ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_convert_fixture_to_file() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample.pdf"));
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("sample.md");

    let info = convert_to_file(
        path.to_str().unwrap(),
        &out,
        &ConversionConfig::default(),
        &BatchConfig::default(),
    )
    .await
    .expect("convert_to_file should succeed");
    assert_eq!(info.category, Category::Pdf);

    let md = std::fs::read_to_string(&out).unwrap();
    assert!(!md.trim().is_empty(), "Markdown is empty");
    assert!(!md.contains("\n\n\n"), "more than one blank line in a row");
    println!("✓  {} bytes", md.len());
}
