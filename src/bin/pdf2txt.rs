//! CLI binary for edgequake-pdf2txt.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and writes transcripts.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2txt::{
    batch, write_transcript, BatchJob, BatchOptions, ConversionConfig, ConversionOutput,
    ConversionProgressCallback, Converter, Destination, DocumentStatus, ImageStatus,
    Pdf2TxtError, ProgressCallback,
};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a page bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    described: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            described: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER);

        self.bar.set_position(0);
        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn page_elapsed(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting conversion of {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_image_complete(&self, page_num: usize, image_num: usize, status: ImageStatus) {
        let counter = match status {
            ImageStatus::Described => &self.described,
            ImageStatus::Skipped => &self.skipped,
            ImageStatus::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        self.bar
            .set_message(format!("page {page_num}, image {image_num} {status:?}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, images: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{images:>3} images")),
            dim(&format!("{:.1}s", self.page_elapsed(page_num))),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
        ));
    }

    fn on_conversion_complete(&self, total_pages: usize, failed_pages: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {}/{} pages  {} images described  {} skipped  {} failed",
            if failed_pages == 0 { green("✔") } else { cyan("⚠") },
            bold(&total_pages.saturating_sub(failed_pages).to_string()),
            total_pages,
            self.described.load(Ordering::SeqCst),
            self.skipped.load(Ordering::SeqCst),
            red(&self.failed.load(Ordering::SeqCst).to_string()),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Single document to stdout
  pdf2txt report.pdf

  # Single document to a file
  pdf2txt report.pdf -o report.txt

  # Several documents; transcripts land next to each input as <stem>.txt
  pdf2txt q1.pdf q2.pdf q3.pdf

  # Several documents into one directory, sharing one request budget
  pdf2txt --output-dir out/ --jobs 2 reports/*.pdf

  # A whole folder tree, mirrored under out/ (existing .txt files are kept)
  pdf2txt --recursive --output-dir out/ reports/

  # Redo everything, replacing earlier transcripts
  pdf2txt --recursive --overwrite --output-dir out/ reports/

  # Paid tier: more requests per minute, no spacing
  pdf2txt --max-requests 60 --min-delay-ms 0 report.pdf

  # JSON (segments + stats) instead of plain text
  pdf2txt --json report.pdf > report.json

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Model ID (default: gemini-2.0-flash)
  PDFIUM_LIB_PATH         Directory or file of the pdfium shared library

  When no provider is given it is picked from the first API key found,
  in the order GEMINI_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY.

  Press Ctrl-C to stop after the current image; nothing is written for a
  cancelled document. Transcripts already written are kept.
"#;

/// Convert PDF files to plain-text transcripts with image descriptions.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2txt",
    version,
    about = "Convert PDF files to plain text, describing embedded images with a vision LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files or directories of PDF files to convert.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Write the transcript to this file (single input only).
    #[arg(short, long, env = "PDF2TXT_OUTPUT", conflicts_with = "output_dir")]
    output: Option<PathBuf>,

    /// Write transcripts into this directory, mirroring the layout of
    /// directory inputs.
    #[arg(long, env = "PDF2TXT_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Also convert PDFs in subdirectories of directory inputs.
    #[arg(short, long, env = "PDF2TXT_RECURSIVE")]
    recursive: bool,

    /// Replace transcripts that already exist instead of skipping them.
    #[arg(long, env = "PDF2TXT_OVERWRITE")]
    overwrite: bool,

    /// Vision model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama.
    #[arg(long, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// Vision requests allowed per rate window.
    #[arg(long, env = "PDF2TXT_MAX_REQUESTS", default_value_t = 9)]
    max_requests: usize,

    /// Rate window length in seconds.
    #[arg(long, env = "PDF2TXT_WINDOW_SECS", default_value_t = 60,
          value_parser = clap::value_parser!(u64).range(1..))]
    window_secs: u64,

    /// Minimum spacing between requests in milliseconds.
    #[arg(long, env = "PDF2TXT_MIN_DELAY_MS", default_value_t = 1000)]
    min_delay_ms: u64,

    /// Attempts per image, including the first.
    #[arg(long, env = "PDF2TXT_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Backoff base delay in milliseconds (doubles per failed attempt).
    #[arg(long, env = "PDF2TXT_RETRY_DELAY_MS", default_value_t = 5000)]
    retry_delay_ms: u64,

    /// Number of image fingerprints kept for deduplication.
    #[arg(long, env = "PDF2TXT_CACHE_SIZE", default_value_t = 1000)]
    cache_size: usize,

    /// Per-request vision call timeout in seconds.
    #[arg(long, env = "PDF2TXT_API_TIMEOUT", default_value_t = 60,
          value_parser = clap::value_parser!(u64).range(1..))]
    api_timeout: u64,

    /// Describe logo-like images too.
    #[arg(long, env = "PDF2TXT_NO_LOGO_FILTER")]
    no_logo_filter: bool,

    /// Max output tokens per image description.
    #[arg(long, env = "PDF2TXT_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2TXT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2TXT_PASSWORD")]
    password: Option<String>,

    /// Directory or file of the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Documents converted at the same time (they share the request budget).
    #[arg(short, long, env = "PDF2TXT_JOBS", default_value_t = 1)]
    jobs: usize,

    /// Output structured JSON (ConversionOutput) instead of plain text.
    #[arg(long, env = "PDF2TXT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2TXT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2TXT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2TXT_QUIET")]
    quiet: bool,
}

impl Cli {
    fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            output: self.output.clone(),
            output_dir: self.output_dir.clone(),
            recursive: self.recursive,
            overwrite: self.overwrite,
            extension: if self.json { "json" } else { "txt" }.to_string(),
        }
    }
}

/// Per-run outcome counts.
#[derive(Debug, Default)]
struct Tally {
    written: usize,
    cancelled: usize,
    convert_failures: usize,
    write_failures: usize,
}

impl Tally {
    /// Emit one finished conversion. A failure is reported and counted; it
    /// never stops the documents after it.
    async fn record(
        &mut self,
        cli: &Cli,
        job: &BatchJob,
        result: Result<ConversionOutput, Pdf2TxtError>,
    ) {
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                self.convert_failures += 1;
                eprintln!("{} {}: {}", red("✘"), job.input.display(), e);
                return;
            }
        };

        if output.status == DocumentStatus::Cancelled {
            self.cancelled += 1;
            eprintln!(
                "{} {}: cancelled, nothing written",
                cyan("⚠"),
                job.input.display()
            );
            return;
        }

        match emit(cli, &job.destination, &output).await {
            Ok(()) => self.written += 1,
            Err(e) => {
                self.write_failures += 1;
                tracing::error!("Writing {} failed: {:#}", job.input.display(), e);
                eprintln!("{} {}: {:#}", red("✘"), job.input.display(), e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Expand inputs ────────────────────────────────────────────────────
    let plan = batch::plan(&cli.inputs, &cli.batch_options())
        .context("Could not work out what to convert")?;

    // ── Logging setup ────────────────────────────────────────────────────
    let single_stdout =
        plan.jobs.len() == 1 && plan.jobs[0].destination == Destination::Stdout;
    let show_progress =
        !cli.quiet && !cli.no_progress && cli.jobs <= 1 && !(cli.json && single_stdout);
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

    if !cli.quiet {
        for job in &plan.skipped {
            eprintln!(
                "{} {}: output exists, skipping (use --overwrite to replace)",
                dim("↷"),
                job.input.display()
            );
        }
    }
    if plan.jobs.is_empty() {
        if !cli.quiet {
            eprintln!("{} No PDF files to convert", cyan("⚠"));
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let converter = Converter::new(&config).context("Could not set up the vision provider")?;

    // ── Ctrl-C → cooperative cancellation ───────────────────────────────
    let cancel = converter.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{} cancelling after the current image…", cyan("⚠"));
            cancel.cancel();
        }
    });

    // ── Run conversion, writing each transcript as it finishes ──────────
    let inputs: Vec<PathBuf> = plan.jobs.iter().map(|job| job.input.clone()).collect();
    let mut results =
        std::pin::pin!(stream::iter(&plan.jobs).zip(converter.convert_stream(inputs, cli.jobs)));

    let mut tally = Tally::default();
    while let Some((job, (_, result))) = results.next().await {
        tally.record(&cli, job, result).await;
    }

    if !cli.quiet {
        let stats = converter.cache_stats();
        eprintln!(
            "   {} written  {} skipped  /  {} cache hits  {} misses",
            bold(&tally.written.to_string()),
            dim(&plan.skipped.len().to_string()),
            dim(&stats.hits.to_string()),
            dim(&stats.misses.to_string()),
        );
    }

    if tally.convert_failures > 0 {
        anyhow::bail!("{} document(s) could not be converted", tally.convert_failures);
    }
    if tally.write_failures > 0 {
        anyhow::bail!("{} transcript(s) could not be written", tally.write_failures);
    }
    if tally.cancelled > 0 {
        anyhow::bail!("Conversion cancelled");
    }
    Ok(())
}

/// Write one finished conversion to its destination.
async fn emit(cli: &Cli, destination: &Destination, output: &ConversionOutput) -> Result<()> {
    let body = if cli.json {
        serde_json::to_string_pretty(output).context("Failed to serialise output")?
    } else {
        output.text()
    };

    match destination {
        Destination::Stdout => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(body.as_bytes())
                .context("Failed to write to stdout")?;
            if !body.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
        Destination::File(path) if cli.json => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            tokio::fs::write(path, body)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            report_written(cli, output, path);
        }
        Destination::File(path) => {
            write_transcript(path, &output.transcript)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            report_written(cli, output, path);
        }
    }
    Ok(())
}

fn report_written(cli: &Cli, output: &ConversionOutput, path: &Path) {
    if cli.quiet {
        return;
    }
    let stats = &output.stats;
    eprintln!(
        "{}  {}/{} pages  {}ms  →  {}",
        if stats.failed_pages == 0 && stats.images_failed == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.processed_pages - stats.failed_pages,
        stats.total_pages,
        stats.total_duration_ms,
        bold(&path.display().to_string()),
    );
}

/// Pick a provider from the first API key present in the environment.
fn detect_provider() -> Option<String> {
    [
        ("GEMINI_API_KEY", "gemini"),
        ("OPENAI_API_KEY", "openai"),
        ("ANTHROPIC_API_KEY", "anthropic"),
    ]
    .into_iter()
    .find(|(var, _)| std::env::var(var).map(|v| !v.is_empty()).unwrap_or(false))
    .map(|(_, provider)| provider.to_string())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .max_requests(cli.max_requests)
        .window_secs(cli.window_secs)
        .min_delay_ms(cli.min_delay_ms)
        .max_retries(cli.max_retries)
        .retry_base_delay_ms(cli.retry_delay_ms)
        .cache_capacity(cli.cache_size)
        .api_timeout_secs(cli.api_timeout)
        .skip_decorative(!cli.no_logo_filter)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature);

    match cli.provider.clone().or_else(detect_provider) {
        Some(provider) => builder = builder.provider_name(provider),
        None => anyhow::bail!(
            "No vision provider configured. Set --provider or one of \
             GEMINI_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY"
        ),
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
