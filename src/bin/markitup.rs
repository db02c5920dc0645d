//! CLI binary for markitup.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig` / `BatchConfig` and prints or writes results.

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use markitup::convert::write_atomic;
use markitup::{
    convert_input, convert_stream, inspect, BatchConfig, Chunk, ConversionConfig,
    ConversionProgressCallback, ConversionResult, Modality, ProgressCallback, StreamInfo,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── Batch progress callback using indicatif ──────────────────────────────────

/// Progress bar over the documents of a batch. Documents finish out of
/// order, so every line names its input.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.bar.set_length(total_documents as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_documents} documents…"))
        ));
    }

    fn on_document_start(&self, input: &str) {
        self.bar.set_message(input.to_string());
    }

    fn on_document_complete(&self, input: &str, markdown_len: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            input,
            dim(&format!("{markdown_len:>7} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, input: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let first_line = error.lines().next().unwrap_or(error);
        // Truncate very long error messages to keep output tidy.
        let msg = match first_line.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &first_line[..cut]),
            None => first_line.to_string(),
        };
        self.bar.println(format!("  {} {}  {}", red("✗"), input, red(&msg)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let failed = total_documents.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} documents converted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents converted  ({} failed)",
                if failed == total_documents {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_documents,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Markdown on stdout
  markitup report.docx

  # Write to a file
  markitup slides.pptx -o slides.md

  # Content blocks for an LLM request, images capped at 1024px
  markitup --blocks --max-dimension 1024 paper.pdf > blocks.json

  # Chunked blocks with page ids and bounding boxes
  markitup --blocks --chunk --chunk-size 200 paper.pdf

  # Text only: images replaced by an omission note, audio dropped
  markitup --modalities none page.html

  # Batch: one output per input, written to ./converted
  markitup *.xlsx *.pdf -o converted --concurrency 8

  # What is this file?
  markitup --inspect-only mystery.bin

ENVIRONMENT VARIABLES:
  MARKITUP_*          Every flag, e.g. MARKITUP_CHUNK_SIZE=200
  PDFIUM_LIB_PATH     Path to libpdfium (file or directory) for PDF input
  RUST_LOG            Log filter, overrides -v / -q

Types are detected from content, never from file extensions.
"#;

/// Convert documents to Markdown and multi-modal LLM content blocks.
#[derive(Parser, Debug)]
#[command(
    name = "markitup",
    version,
    about = "Convert documents to Markdown and multi-modal LLM content blocks",
    long_about = "Convert PDF, Word, PowerPoint, Excel, HTML, CSV, text, image and audio \
files (local paths or URLs) to Markdown, or to an ordered list of text / image / media \
content blocks ready for an LLM message.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file paths or HTTP/HTTPS URLs.
    #[arg(required = true, num_args = 1..)]
    inputs: Vec<String>,

    /// Output file (one input) or directory (several inputs).
    #[arg(short, long, env = "MARKITUP_OUTPUT")]
    output: Option<PathBuf>,

    /// Emit content blocks as JSON instead of Markdown.
    #[arg(long, env = "MARKITUP_BLOCKS")]
    blocks: bool,

    /// Emit a JSON document (markdown, title, type, chunks) instead of Markdown.
    #[arg(long, env = "MARKITUP_JSON", conflicts_with = "blocks")]
    json: bool,

    /// Ask converters for chunks and serialise blocks from them.
    #[arg(long, env = "MARKITUP_CHUNK")]
    chunk: bool,

    /// Target chunk size in words.
    #[arg(long, env = "MARKITUP_CHUNK_SIZE",
          value_parser = clap::value_parser!(u64).range(1..))]
    chunk_size: Option<u64>,

    /// Keep images in their original format instead of re-encoding as WebP.
    #[arg(long, env = "MARKITUP_NO_WEBP")]
    no_webp: bool,

    /// Longest image edge in pixels; 0 disables resizing.
    #[arg(long, env = "MARKITUP_MAX_DIMENSION")]
    max_dimension: Option<u32>,

    /// Media to embed: comma-separated `image`, `audio`, or `none`.
    #[arg(long, env = "MARKITUP_MODALITIES")]
    modalities: Option<String>,

    /// JSON file with a ConversionConfig; flags override its values.
    #[arg(long, env = "MARKITUP_CONFIG")]
    config: Option<PathBuf>,

    /// Print the detected type only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Number of documents converted at once in batch mode.
    #[arg(short, long, env = "MARKITUP_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "MARKITUP_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable the batch progress bar.
    #[arg(long, env = "MARKITUP_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MARKITUP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MARKITUP_QUIET", conflicts_with = "verbose")]
    quiet: bool,
}

/// `--json` output shape.
#[derive(Serialize)]
struct JsonDocument<'a> {
    input: &'a str,
    mimetype: &'a str,
    category: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    markdown: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunks: Option<&'a [Chunk]>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let batch_mode = cli.inputs.len() > 1;
    let show_progress = batch_mode && !cli.quiet && !cli.no_progress && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let mut batch = BatchConfig::default()
        .concurrency(cli.concurrency)
        .download_timeout_secs(cli.download_timeout);

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        for input in &cli.inputs {
            let info = inspect(input, &batch)
                .await
                .with_context(|| format!("Failed to inspect {input}"))?;
            if cli.json {
                #[derive(Serialize)]
                struct Inspected<'a> {
                    input: &'a str,
                    #[serde(flatten)]
                    info: &'a StreamInfo,
                }
                println!(
                    "{}",
                    serde_json::to_string(&Inspected { input, info: &info })
                        .context("Failed to serialize stream info")?
                );
            } else {
                println!("{}  {}  {}", input, info.mimetype, bold(info.category.as_str()));
            }
        }
        return Ok(());
    }

    // ── Single input ─────────────────────────────────────────────────────
    if !batch_mode {
        let input = &cli.inputs[0];
        let (mut result, info) = convert_input(input, &config, &batch)
            .await
            .with_context(|| format!("Conversion failed for {input}"))?;
        let rendered = render(&cli, input, &mut result, &info)?;

        match cli.output {
            Some(ref path) => {
                write_atomic(path, rendered.as_bytes())
                    .await
                    .context("Failed to write output")?;
                if !cli.quiet {
                    eprintln!(
                        "{}  {} ({})  →  {}",
                        green("✔"),
                        input,
                        info.category,
                        bold(&path.display().to_string())
                    );
                }
            }
            None => {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle
                    .write_all(rendered.as_bytes())
                    .context("Failed to write to stdout")?;
                if !rendered.ends_with('\n') {
                    handle.write_all(b"\n").ok();
                }
            }
        }
        return Ok(());
    }

    // ── Batch mode ───────────────────────────────────────────────────────
    let out_dir = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from("markitup_output"));
    if show_progress {
        batch = batch.progress(CliProgressCallback::new() as ProgressCallback);
    }

    let extension = if cli.blocks || cli.json { "json" } else { "md" };
    let mut failures = 0usize;
    let mut outcomes = convert_stream(cli.inputs.iter().cloned(), &config, &batch);
    while let Some(outcome) = outcomes.next().await {
        let written = match outcome.result {
            Ok((mut result, info)) => {
                let path = out_dir.join(output_name(&outcome.input, outcome.index, extension));
                match render(&cli, &outcome.input, &mut result, &info) {
                    Ok(rendered) => write_atomic(&path, rendered.as_bytes())
                        .await
                        .map(|_| path)
                        .map_err(anyhow::Error::from),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(anyhow::Error::from(e)),
        };
        match written {
            Ok(path) if !cli.quiet && !show_progress => {
                eprintln!("{} {}  →  {}", green("✓"), outcome.input, path.display());
            }
            Ok(_) => {}
            Err(e) => {
                failures += 1;
                if !show_progress {
                    eprintln!("{} {}: {:#}", red("✗"), outcome.input, e);
                }
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} inputs failed", cli.inputs.len());
    }
    Ok(())
}

/// Map CLI args (over an optional config file) to `ConversionConfig`.
fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    let base = match cli.config {
        Some(ref path) => ConversionConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConversionConfig::default(),
    };

    let modalities = match cli.modalities {
        Some(ref s) => parse_modalities(s)?,
        None => base.modalities.clone(),
    };

    ConversionConfig::builder()
        .modalities(modalities)
        .chunk(cli.chunk || base.chunk)
        .chunk_size(cli.chunk_size.map_or(base.chunk_size, |n| n as usize))
        .image_use_webp(base.image_use_webp && !cli.no_webp)
        .image_max_dimension(cli.max_dimension.unwrap_or(base.image_max_dimension))
        .build()
        .context("Invalid configuration")
}

/// Parse `--modalities` into a set: `none`, or a comma-separated list.
fn parse_modalities(s: &str) -> Result<BTreeSet<Modality>> {
    let s = s.trim().to_lowercase();
    if s == "none" || s.is_empty() {
        return Ok(BTreeSet::new());
    }
    s.split(',')
        .map(|m| match m.trim() {
            "image" | "images" => Ok(Modality::Image),
            "audio" => Ok(Modality::Audio),
            other => anyhow::bail!("Unknown modality '{other}' (expected image, audio or none)"),
        })
        .collect()
}

/// Render one converted document in the requested output format.
fn render(cli: &Cli, input: &str, result: &mut ConversionResult, info: &StreamInfo) -> Result<String> {
    if cli.blocks {
        let blocks = result.to_blocks().context("Failed to build content blocks")?;
        return serde_json::to_string_pretty(&blocks).context("Failed to serialize blocks");
    }
    if cli.json {
        let doc = JsonDocument {
            input,
            mimetype: &info.mimetype,
            category: info.category.as_str(),
            title: result.title.as_deref(),
            markdown: &result.markdown,
            chunks: result.chunks.as_deref(),
        };
        return serde_json::to_string_pretty(&doc).context("Failed to serialize output");
    }
    Ok(result.markdown.clone())
}

/// Output file name for a batch input: its final path or URL segment with
/// the extension swapped, prefixed by its index so duplicates cannot clash.
fn output_name(input: &str, index: usize, extension: &str) -> String {
    let last = input
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(input);
    let last = last.split(['?', '#']).next().unwrap_or(last);
    let stem = Path::new(last)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document");
    format!("{:03}-{stem}.{extension}", index + 1)
}
