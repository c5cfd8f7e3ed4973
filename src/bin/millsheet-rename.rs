//! CLI binary for millsheet-renamer.
//!
//! A thin shim over the library crate: maps CLI flags to `RenameConfig`,
//! resolves the API key, runs the batch on its own task and renders the
//! event stream as a progress bar plus one line per file.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use millsheet_renamer::{
    spawn_batch, Batch, BatchEvent, BatchReport, ItemError, ItemStatus, Pipeline, RenameConfig,
    RenamerError, Settings,
};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Rename in place (files stay in their folder)
  millsheet-rename scans/*.pdf

  # Whole folder, renamed copies go to another folder
  millsheet-rename inbox/ -o filed/

  # First time: save the API key for later runs
  millsheet-rename --api-key sk-ant-... inbox/

  # No pdfium available: send each whole PDF to the model
  millsheet-rename --send-pdf inbox/

  # Machine-readable report
  millsheet-rename --json inbox/ > report.json

NAMING:
  <date>_<spec>_<size>_<charge_no>_<project>_<maker>.pdf
  Missing fields become 不明. If the name is taken, " (1)", " (2)", …
  is appended before the extension.

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY         API key (overrides the saved key, never saved)
  MILLSHEET_RENAMER_CONFIG  Settings file (default ~/.millsheet-renamer/config.json)
  PDFIUM_LIB_PATH           Path to an existing libpdfium
  RUST_LOG                  Log filter, e.g. millsheet_renamer=debug
"#;

/// Rename steel mill certificate PDFs from fields read by a vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "millsheet-rename",
    version,
    about = "Rename steel mill certificate PDFs from fields read by a vision LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files or directories (searched recursively for *.pdf).
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Move renamed files here instead of leaving them in place.
    #[arg(short, long, env = "MILLSHEET_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// API key for the extraction service; saved for later runs.
    #[arg(long)]
    api_key: Option<String>,

    /// Extraction model ID.
    #[arg(long, env = "MILLSHEET_MODEL")]
    model: Option<String>,

    /// Render at most this many leading pages per PDF.
    #[arg(long, env = "MILLSHEET_MAX_PAGES", default_value_t = 2)]
    max_pages: usize,

    /// Render scale relative to native page size.
    #[arg(long, env = "MILLSHEET_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Max output tokens for the extraction answer.
    #[arg(long, env = "MILLSHEET_MAX_TOKENS", default_value_t = 1000)]
    max_tokens: u32,

    /// Per-request timeout in seconds.
    #[arg(long, env = "MILLSHEET_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Send the whole PDF instead of rendered pages (no pdfium needed).
    #[arg(long, env = "MILLSHEET_SEND_PDF")]
    send_pdf: bool,

    /// Print the batch report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MILLSHEET_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar already reports per-file outcomes; keep library logs
    // down to errors while it is on screen.
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

    // ── Credential ───────────────────────────────────────────────────────
    let api_key = resolve_api_key(cli.api_key.as_deref())?;

    // ── Build config & batch ─────────────────────────────────────────────
    let config = build_config(&cli)?;

    let mut batch = Batch::new();
    batch.add_paths(&cli.paths);
    if batch.is_empty() {
        anyhow::bail!("No PDF files found in the given paths");
    }

    let pipeline =
        Arc::new(Pipeline::anthropic(api_key, config).context("Failed to set up pipeline")?);

    // ── Run ──────────────────────────────────────────────────────────────
    let (handle, mut events) = spawn_batch(pipeline, batch);

    let bar = if show_progress {
        Some(new_progress_bar())
    } else {
        None
    };

    while let Some(event) = events.next().await {
        render_event(&event, bar.as_ref(), cli.quiet || cli.json);
    }

    let report = handle.await.context("Batch task failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        print_summary(&report);
    }

    Ok(if report.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

/// `--api-key`, then `ANTHROPIC_API_KEY`, then the saved key. Only a key
/// given with `--api-key` is saved, and only when it differs from the stored
/// one.
fn resolve_api_key(cli_key: Option<&str>) -> Result<String> {
    let mut settings = Settings::load();
    let env_key = std::env::var("ANTHROPIC_API_KEY").ok();

    let (key, source) = settings
        .resolve_api_key(cli_key, env_key.as_deref())
        .ok_or(RenamerError::MissingCredential)?;
    tracing::debug!("Using API key from {:?}", source);

    if source.persists() && settings.set_api_key(&key) {
        settings.save().context("Failed to save API key")?;
        tracing::info!("Saved API key to {}", Settings::default_path().display());
    }
    Ok(key)
}

/// Map CLI args to `RenameConfig`.
fn build_config(cli: &Cli) -> Result<RenameConfig> {
    let mut builder = RenameConfig::builder()
        .max_pages(cli.max_pages)
        .scale(cli.scale)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .send_pdf(cli.send_pdf);

    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_dir(dir);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }

    builder.build().context("Invalid configuration")
}

fn new_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} files  {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
    bar.set_style(style);
    bar.set_prefix("Renaming");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn render_event(event: &BatchEvent, bar: Option<&ProgressBar>, silent: bool) {
    let emit = |line: String| match bar {
        Some(b) => b.println(line),
        None if !silent => eprintln!("{line}"),
        None => {}
    };

    match event {
        BatchEvent::Started { total } => {
            if let Some(b) = bar {
                b.set_length(*total as u64);
            }
        }
        BatchEvent::Status { source, status, .. } => match status {
            ItemStatus::Done(path) => {
                emit(format!(
                    "  {} {}  →  {}",
                    green("✓"),
                    dim(&file_name(source)),
                    file_name(path)
                ));
                if let Some(b) = bar {
                    b.inc(1);
                }
            }
            ItemStatus::Failed(err) => {
                let msg = err.to_string();
                let msg = match msg.char_indices().nth(100) {
                    Some((cut, _)) => format!("{}…", &msg[..cut]),
                    None => msg,
                };
                emit(format!("  {} {}  {}", red("✗"), file_name(source), red(&msg)));
                if matches!(err, ItemError::RendererUnavailable(_)) {
                    emit(format!(
                        "    {}",
                        dim("no pdfium library found; --send-pdf skips rendering")
                    ));
                } else if err.extraction_completed() {
                    emit(format!(
                        "    {}",
                        dim("fields were extracted; re-running this file repeats a paid call")
                    ));
                }
                if let Some(b) = bar {
                    b.inc(1);
                }
            }
            other => {
                if let Some(b) = bar {
                    b.set_message(format!("{} {}", other.label(), file_name(source)));
                }
            }
        },
        BatchEvent::Completed { .. } => {
            if let Some(b) = bar {
                b.finish_and_clear();
            }
        }
    }
}

fn print_summary(report: &BatchReport) {
    let total = report.succeeded + report.failed;
    if report.failed == 0 {
        eprintln!(
            "{} {} file(s) renamed  {}",
            green("✔"),
            bold(&report.succeeded.to_string()),
            dim(&format!("{}ms", report.duration_ms))
        );
    } else {
        eprintln!(
            "{} {}/{} file(s) renamed  ({} failed)  {}",
            if report.succeeded == 0 {
                red("✘")
            } else {
                cyan("⚠")
            },
            bold(&report.succeeded.to_string()),
            total,
            red(&report.failed.to_string()),
            dim(&format!("{}ms", report.duration_ms))
        );
    }
}
