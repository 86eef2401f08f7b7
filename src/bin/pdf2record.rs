//! CLI binary for pdf2record.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig` and prints the validated record.

use anyhow::{Context, Result};
use clap::Parser;
use pdf2record::{
    extract_only, inspect, process, process_to_file, Branch, PipelineConfig,
    PipelineProgressCallback, ProgressCallback, RepairStrategy, SourceDocument,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner that narrates the pipeline phases
/// and prints one log line per extraction method and normalization attempt.
struct CliProgressCallback {
    bar: ProgressBar,
    failures: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            failures: AtomicUsize::new(0),
        })
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_pipeline_start(&self, name: &str, page_count: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {name} ({page_count} pages)…"))
        ));
    }

    fn on_classified(&self, branch: Branch) {
        self.bar.set_prefix("Extracting");
        self.bar.println(format!(
            "  {} Classified as {}",
            cyan("◆"),
            bold(&branch.to_string())
        ));
    }

    fn on_method_start(&self, method: &str) {
        self.bar.set_message(method.to_string());
    }

    fn on_method_complete(&self, method: &str, score: f64, chars: usize) {
        self.bar.println(format!(
            "  {} {:<12}  {}  {}",
            green("✓"),
            method,
            dim(&format!("{chars:>6} chars")),
            dim(&format!("score {score:.2}")),
        ));
    }

    fn on_method_failed(&self, method: &str, error: &str) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {:<12}  {}", red("✗"), method, red(&msg)));
    }

    fn on_normalization_attempt(&self, ordinal: usize, strategy: RepairStrategy) {
        self.bar.set_prefix("Normalizing");
        self.bar.set_message(format!("attempt {ordinal} ({strategy})"));
    }

    fn on_pipeline_complete(&self, success: bool) {
        self.bar.finish_and_clear();
        if success {
            eprintln!("{} record is schema-valid", green("✔"));
        } else {
            eprintln!("{} run failed", red("✘"));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic processing (validated JSON record to stdout)
  pdf2record expenses.pdf

  # Write the record to a file
  pdf2record expenses.pdf -o record.json

  # Full diagnostics: record + extraction and repair trails
  pdf2record --json expenses.pdf > trail.json

  # Extraction only — no model call, no API key needed
  pdf2record --extract-only scan.pdf

  # Inspect PDF metadata (no API key needed)
  pdf2record --inspect-only expenses.pdf

  # Scanned documents in German, higher render quality
  pdf2record --ocr-lang deu --dpi 300 scan.pdf

  # Tighter repair budget
  pdf2record --max-repair-attempts 1 expenses.pdf

ENVIRONMENT VARIABLES:
  GROQ_API_KEY        Groq API key for the completion model
  PDFIUM_LIB_PATH     Directory containing libpdfium — overrides the system copy

SETUP:
  1. Install the OCR engine:   apt install tesseract-ocr     (scanned PDFs only)
  2. Set the API key:          export GROQ_API_KEY=gsk_...
  3. Process:                  pdf2record expenses.pdf -o record.json
"#;

/// Turn PDF documents into strictly-valid JSON records.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2record",
    version,
    about = "Turn PDF documents into strictly-valid JSON records",
    long_about = "Extract text from PDF documents (digital or scanned, with OCR fallback) and \
normalize it into a JSON record that provably satisfies a schema contract, using a completion \
model with a bounded validate-and-repair loop.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Write the record to this file instead of stdout.
    #[arg(short, long, env = "PDF2RECORD_OUTPUT")]
    output: Option<PathBuf>,

    /// Completion model ID.
    #[arg(long, env = "PDF2RECORD_MODEL")]
    model: Option<String>,

    /// Tesseract language code for OCR (eng, deu, fra, ...).
    #[arg(long, env = "PDF2RECORD_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Rendering DPI for the OCR raster pass (72–600).
    #[arg(long, env = "PDF2RECORD_DPI", default_value_t = 216,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Concurrent per-page OCR recognitions.
    #[arg(short, long, env = "PDF2RECORD_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Model repair calls allowed after the initial request.
    #[arg(long, env = "PDF2RECORD_MAX_REPAIR_ATTEMPTS", default_value_t = 3)]
    max_repair_attempts: u32,

    /// Minimum quality score for extracted text (0.0–1.0).
    #[arg(long, env = "PDF2RECORD_MIN_SCORE", default_value_t = 0.35)]
    min_score: f64,

    /// Pages the classifier samples.
    #[arg(long, env = "PDF2RECORD_SAMPLE_PAGES", default_value_t = 3)]
    sample_pages: usize,

    /// Model temperature (0.0–2.0).
    #[arg(long, env = "PDF2RECORD_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Max model output tokens per call.
    #[arg(long, env = "PDF2RECORD_MAX_TOKENS", default_value_t = 4000)]
    max_tokens: usize,

    /// Per-model-call timeout in seconds.
    #[arg(long, env = "PDF2RECORD_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Output the full NormalizedRecord (record + trails) instead of the
    /// bare record.
    #[arg(long, env = "PDF2RECORD_JSON")]
    json: bool,

    /// Run extraction only and print a bounded text preview; no model call
    /// is made (use --json for the full text and trail).
    #[arg(long)]
    extract_only: bool,

    /// Print PDF metadata only, no processing.
    #[arg(long)]
    inspect_only: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "PDF2RECORD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2RECORD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the record itself.
    #[arg(short, long, env = "PDF2RECORD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active; the
    // callback provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input).await.context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input.display());
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let doc = SourceDocument::from_path(&cli.input)
        .await
        .context("Failed to open PDF")?;

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let result = extract_only(&doc, &config)
            .await
            .context("Extraction failed")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&result).context("Failed to serialise result")?
            );
        } else {
            print_stdout(result.preview(500))?;
            if !cli.quiet {
                eprintln!(
                    "{}  {} branch  via {}  {} chars  score {:.2}  ({} attempts)",
                    green("✔"),
                    result.branch,
                    bold(&result.method),
                    result.text.chars().count(),
                    result.score,
                    result.attempts.len(),
                );
            }
        }
        return Ok(());
    }

    // ── Run the full pipeline ────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let record = process_to_file(&doc, output_path, &config)
            .await
            .context("Processing failed")?;

        if !cli.quiet {
            eprintln!(
                "{}  {} model call(s)  {}ms  →  {}",
                green("✔"),
                record.stats.model_calls,
                record.stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
    } else {
        let record = process(&doc, &config).await.context("Processing failed")?;

        if cli.json {
            let json =
                serde_json::to_string_pretty(&record).context("Failed to serialise record")?;
            println!("{json}");
        } else {
            let rendered = serde_json::to_string_pretty(&record.record)
                .context("Failed to serialise record")?;
            print_stdout(&rendered)?;
        }

        if !cli.quiet && !show_progress && !cli.json {
            eprintln!(
                "Extracted via {} ({} branch), {} model call(s), {}ms total",
                record.extraction.method,
                record.extraction.branch,
                record.stats.model_calls,
                record.stats.total_duration_ms
            );
        }
    }

    Ok(())
}

/// Write to stdout with a guaranteed trailing newline.
fn print_stdout(content: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(content.as_bytes())
        .context("Failed to write to stdout")?;
    if !content.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .classifier_sample_pages(cli.sample_pages)
        .min_acceptable_score(cli.min_score)
        .dpi(cli.dpi)
        .concurrency(cli.concurrency)
        .max_repair_attempts(cli.max_repair_attempts)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .ocr_language(cli.ocr_lang.clone())
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
