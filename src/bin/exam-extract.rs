//! CLI binary for exam-extract.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints or exports the result.

use anyhow::{Context, Result};
use clap::Parser;
use exam_extract::export::{self, ExportFormat};
use exam_extract::extract::check_preconditions;
use exam_extract::{
    extract, BackendKind, DocumentSource, CredentialStore, ExtractionConfig, ExtractionProgressCallback,
    FailureKind, ProgressCallback, SelectionSet, CATEGORIES,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner plus one log line per document and per failed attempt. A retry
/// wait is long enough that the spinner message has to say so.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Reading");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_document_extracted(&self, source: &str, pages: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            source,
            dim(&format!("{pages} pages"))
        ));
    }

    fn on_attempt(&self, model: &str, attempt: u32, max_attempts: u32) {
        self.bar.set_prefix("Extracting");
        self.bar
            .set_message(format!("{model}  attempt {attempt}/{max_attempts}"));
    }

    fn on_retry_wait(&self, model: &str, kind: FailureKind, delay: Duration) {
        self.bar.println(format!(
            "  {} {model}: {kind}, retrying in {}s",
            yellow("↻"),
            delay.as_secs()
        ));
        self.bar.set_message(format!("{model}  waiting {}s", delay.as_secs()));
    }

    fn on_model_abandoned(&self, model: &str, kind: FailureKind) {
        self.bar.println(format!(
            "  {} {model}: {kind}, trying next model",
            red("✗")
        ));
    }

    fn on_success(&self, model: &str, html_len: usize) {
        self.bar.println(format!(
            "  {} {model}  {}",
            green("✓"),
            dim(&format!("{html_len} chars"))
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Every question type from one exam (HTML fragment on stdout)
  exam-extract 2024_09_mock.pdf

  # Blank-filling and ordering questions from two exams into a styled page
  exam-extract -t blank,order 2024_06.pdf 2024_09.pdf -o questions.html

  # Word document
  exam-extract --format word exam.pdf -o extracted_questions.doc

  # Copy the result (HTML + plain text) to the clipboard
  exam-extract --copy exam.pdf

  # Remember the API key for later runs
  exam-extract --api-key AIza... --save-key

  # Another provider through edgequake-llm
  exam-extract --backend provider --provider openai --models gpt-4.1,gpt-4.1-mini exam.pdf

RETRY POLICY:
  Models in --models are tried in order. Rate-limit and overload errors are
  retried on the same model (--max-retries, --retry-delay) before moving on;
  an unknown model is skipped at once; a rejected API key stops immediately.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key
  EXAM_EXTRACT_MODELS     Candidate models, comma-separated
  PDFIUM_LIB_PATH         Path to an existing libpdfium; skips auto-download
  PDFIUM_AUTO_CACHE_DIR   Override the default pdfium cache directory

  PDFium (~30 MB) is downloaded automatically on first run and cached.
"#;

/// Extract exam questions from PDFs into HTML using hosted LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "exam-extract",
    version,
    about = "Extract selected reading-comprehension question types from exam PDFs into HTML",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file paths or HTTP/HTTPS URLs.
    #[arg(required_unless_present_any = ["list_types", "save_key", "clear_key"])]
    inputs: Vec<String>,

    /// Question types to extract: comma-separated ids, or "all".
    #[arg(short = 't', long = "types", env = "EXAM_EXTRACT_TYPES", default_value = "all")]
    types: String,

    /// Print the question-type catalogue and exit.
    #[arg(long)]
    list_types: bool,

    /// Gemini API key. Falls back to the saved key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Save the API key for later runs.
    #[arg(long)]
    save_key: bool,

    /// Delete the saved API key and exit.
    #[arg(long, conflicts_with = "save_key")]
    clear_key: bool,

    /// Backend: gemini (REST) or provider (edgequake-llm).
    #[arg(long, env = "EXAM_EXTRACT_BACKEND", value_enum, default_value = "gemini")]
    backend: BackendArg,

    /// Provider name for --backend provider: openai, anthropic, gemini, ollama, …
    #[arg(long, env = "EXAM_EXTRACT_PROVIDER")]
    provider: Option<String>,

    /// Candidate models in fallback order.
    #[arg(long, env = "EXAM_EXTRACT_MODELS", value_delimiter = ',')]
    models: Vec<String>,

    /// Retries per model on rate-limit / overload errors.
    #[arg(long, env = "EXAM_EXTRACT_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Seconds to wait between retries of the same model.
    #[arg(long, env = "EXAM_EXTRACT_RETRY_DELAY", default_value_t = 10.0)]
    retry_delay: f64,

    /// Write the result to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format. Default: from the --output extension, fragment on stdout.
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Copy the result to the clipboard as HTML with a plain-text alternative.
    #[arg(long)]
    copy: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "EXAM_EXTRACT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Output structured JSON (ExtractionOutput) instead of HTML.
    #[arg(long, conflicts_with = "output")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "EXAM_EXTRACT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,

    /// Model call timeout in seconds.
    #[arg(long, env = "EXAM_EXTRACT_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "EXAM_EXTRACT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum BackendArg {
    Gemini,
    Provider,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Html,
    Word,
    Fragment,
}

impl From<FormatArg> for ExportFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Html => ExportFormat::Html,
            FormatArg::Word => ExportFormat::Word,
            FormatArg::Fragment => ExportFormat::Fragment,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO logs when it is shown.
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

    if cli.list_types {
        print_catalogue();
        return Ok(());
    }

    // ── Credential handling ──────────────────────────────────────────────
    let store = CredentialStore::default_location().context("Failed to locate credential store")?;

    if cli.clear_key {
        let removed = store.clear().context("Failed to clear saved API key")?;
        if !cli.quiet {
            eprintln!(
                "{} {}",
                green("✔"),
                if removed { "Saved API key removed" } else { "No saved API key" }
            );
        }
        return Ok(());
    }

    let explicit_key = cli
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string);

    if cli.save_key {
        let key = explicit_key
            .as_deref()
            .context("--save-key needs --api-key or GEMINI_API_KEY")?;
        store.save(key).context("Failed to save API key")?;
        if !cli.quiet {
            eprintln!("{} API key saved to {}", green("✔"), store.path().display());
        }
        if cli.inputs.is_empty() {
            return Ok(());
        }
    }

    let api_key = match explicit_key {
        Some(k) => Some(k),
        None => store.load().context("Failed to read saved API key")?,
    };

    // ── Build config and check inputs before any download ──────────────
    let (mut config, selection) = prepare(&cli, api_key)?;

    // ── Ensure PDFium engine is available ───────────────────────────────────
    if !pdfium_auto::is_pdfium_cached() {
        ensure_pdfium(cli.quiet)?;
    }

    let progress = if show_progress {
        Some(CliProgressCallback::new())
    } else {
        None
    };
    config.progress_callback = progress.clone().map(|cb| cb as ProgressCallback);

    // ── Run extraction ───────────────────────────────────────────────────
    let result = extract(&cli.inputs, &selection, &config).await;
    if let Some(ref cb) = progress {
        cb.finish();
    }
    let output = result.context("Extraction failed")?;

    let format = resolve_format(cli.format, cli.output.as_deref());

    if let Some(ref path) = cli.output {
        let bytes = export::render(&output.html, format);
        export::write_export(path, &bytes).context("Failed to write output")?;
        if !cli.quiet {
            eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
        }
    } else if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let bytes = export::render(&output.html, format);
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(&bytes).context("Failed to write to stdout")?;
        if !bytes.ends_with(b"\n") {
            handle.write_all(b"\n").ok();
        }
    }

    if cli.copy {
        copy_to_clipboard(&output.html)?;
        if !cli.quiet {
            eprintln!("{} Copied to clipboard (HTML + text)", green("✔"));
        }
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "   {} via {}  {} attempt(s)  {} tokens in / {} out  {}ms",
            cyan("◆"),
            bold(&output.model),
            output.attempts.len(),
            dim(&output.stats.total_input_tokens.to_string()),
            dim(&output.stats.total_output_tokens.to_string()),
            output.stats.total_duration_ms,
        );
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(
    cli: &Cli,
    api_key: Option<String>,
    progress: Option<ProgressCallback>,
) -> Result<ExtractionConfig> {
    let backend_kind = match cli.backend {
        BackendArg::Gemini => BackendKind::Gemini,
        BackendArg::Provider => BackendKind::Provider(
            cli.provider
                .clone()
                .context("--backend provider needs --provider <NAME>")?,
        ),
    };

    if !cli.retry_delay.is_finite() || cli.retry_delay < 0.0 {
        anyhow::bail!("--retry-delay must be a non-negative number of seconds");
    }

    let mut builder = ExtractionConfig::builder()
        .backend_kind(backend_kind)
        .max_retries(cli.max_retries)
        .retry_delay(Duration::from_secs_f64(cli.retry_delay))
        .request_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    let models: Vec<&str> = cli
        .models
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .collect();
    if !models.is_empty() {
        builder = builder.models(models);
    }
    if let Some(key) = api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Config, question types, inputs and credential: everything that can be
/// rejected without touching the network.
fn prepare(cli: &Cli, api_key: Option<String>) -> Result<(ExtractionConfig, SelectionSet)> {
    let config = build_config(cli, api_key, None)?;
    let selection = SelectionSet::parse(&cli.types).context("Invalid --types")?;
    let sources: Vec<DocumentSource> = cli.inputs.iter().map(|i| DocumentSource::from(i.as_str())).collect();
    check_preconditions(&sources, &selection, &config)?;
    Ok((config, selection))
}

fn resolve_format(explicit: Option<FormatArg>, output: Option<&Path>) -> ExportFormat {
    if let Some(f) = explicit {
        return f.into();
    }
    match output.and_then(|p| p.extension()).and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("doc") => ExportFormat::Word,
        Some(_) => ExportFormat::Html,
        None if output.is_some() => ExportFormat::Html,
        None => ExportFormat::Fragment,
    }
}

fn copy_to_clipboard(html: &str) -> Result<()> {
    let payload = export::clipboard_payload(html);
    let mut clipboard = arboard::Clipboard::new().context("Clipboard is not available")?;
    clipboard
        .set_html(payload.html.as_str(), Some(payload.plain_text.as_str()))
        .context("Failed to copy to clipboard")
}

fn print_catalogue() {
    println!("{}", bold("Question types (use ids with -t/--types):"));
    for c in CATEGORIES {
        println!("  {:<13} {}  {}", c.id, c.label, dim(&format!("({})", c.keywords)));
    }
}

fn ensure_pdfium(quiet: bool) -> Result<()> {
    if quiet {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download PDFium engine")?;
        return Ok(());
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.set_message("Connecting…");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(())
}
