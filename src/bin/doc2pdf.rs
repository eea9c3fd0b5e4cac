//! CLI binary for doc2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `DownloadConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use doc2pdf::{
    default_output_path, download, landing_url, DegradedPolicy, DownloadConfig,
    DownloadProgressCallback, PageOutcome, ProgressCallback, SiteProfile,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
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

// ── CLI progress callbacks ───────────────────────────────────────────────────

/// Terminal progress callback: a live bar plus one `Downloaded i/N` line per
/// link, printed above the bar.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    /// The bar starts as a spinner; `on_download_start` sets its length once
    /// the links have been extracted.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Fetching landing page…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Downloading");
        self.bar.reset_eta();
    }
}

impl DownloadProgressCallback for CliProgressCallback {
    fn on_download_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Found {total_pages} page images"))
        ));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, outcome: &PageOutcome) {
        let note = match outcome {
            PageOutcome::Fetched { .. } => String::new(),
            PageOutcome::Recovered { url, .. } => dim(&format!("  (fallback {url})")),
            PageOutcome::Degraded { error } => yellow(&format!("  ({error})")),
        };
        self.bar
            .println(format!("Downloaded {page_num}/{total}{note}"));
        self.bar.inc(1);
    }

    fn on_download_complete(&self, _total_pages: usize, _degraded: usize) {
        self.bar.set_prefix("Assembling");
        self.bar.set_message("Writing PDF…");
    }
}

/// Plain-line progress for `--no-progress`: no bar, same per-link lines.
struct PlainProgressCallback;

impl DownloadProgressCallback for PlainProgressCallback {
    fn on_page_complete(&self, page_num: usize, total: usize, outcome: &PageOutcome) {
        match outcome {
            PageOutcome::Degraded { error } => {
                eprintln!("Downloaded {page_num}/{total} ({error})")
            }
            _ => eprintln!("Downloaded {page_num}/{total}"),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Download document 123456 to ./123456.pdf
  doc2pdf 123456

  # Choose the output file
  doc2pdf 123456 -o report.pdf

  # Fail instead of inserting blank pages for images that cannot be fetched
  doc2pdf --on-degraded fail 123456

  # Use a site profile (URL template, rewrite table, link pattern, fallback)
  doc2pdf --profile site.json 123456

  # Machine-readable run summary
  doc2pdf --json --no-progress 123456 > run.json

SITE PROFILE (JSON):
  {
    "landing_template": "https://www.example.com/doc/{id}",
    "rewrites": [
      { "from": "//www.example.com", "to": "//html1.example.com" },
      { "from": "/pages/", "to": "/images/" },
      { "from": ".js", "to": ".jpg" }
    ],
    "link_pattern": "(https?://html[1-4]\\.[^\\s\"'<>]+?\\.[a-z][pn]g)(?:[^\\w./-]|$)",
    "fallback": { "from": ".jpg", "to": ".png" }
  }

  Rewrites are applied in a single pass; a replacement may not contain any
  rule's "from" text.

ENVIRONMENT VARIABLES:
  DOC2PDF_PROFILE         Path to a site profile JSON file
  PDFIUM_LIB_PATH         Path to an existing libpdfium (skips the download)
  PDFIUM_AUTO_CACHE_DIR   Where the downloaded libpdfium is cached
  RUST_LOG                Override the log filter (e.g. doc2pdf=debug)
"#;

/// Download a hosted document's page images into a single PDF.
#[derive(Parser, Debug)]
#[command(
    name = "doc2pdf",
    version,
    about = "Download a hosted document's page images into a single PDF",
    long_about = "Fetch the landing page of a hosted document, extract its page-image links, \
download every image in order and assemble them into one PDF with one image per page.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Numeric document identifier.
    id: u64,

    /// Output PDF path. Default: <ID>.pdf
    #[arg(short, long, env = "DOC2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Site profile JSON file (URL template, rewrite table, link pattern, fallback).
    #[arg(long, env = "DOC2PDF_PROFILE")]
    profile: Option<PathBuf>,

    /// Per-request timeout in seconds (0 = no timeout).
    #[arg(long, env = "DOC2PDF_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// User-Agent header sent with every request.
    #[arg(long, env = "DOC2PDF_USER_AGENT")]
    user_agent: Option<String>,

    /// What to do with pages whose image could not be fetched.
    #[arg(long, env = "DOC2PDF_ON_DEGRADED", value_enum, default_value = "placeholder")]
    on_degraded: DegradedArg,

    /// Print the run summary as JSON on stdout.
    #[arg(long, env = "DOC2PDF_JSON")]
    json: bool,

    /// Disable the progress bar (per-page lines are still printed).
    #[arg(long, env = "DOC2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOC2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOC2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum DegradedArg {
    Placeholder,
    Skip,
    Fail,
}

impl From<DegradedArg> for DegradedPolicy {
    fn from(v: DegradedArg) -> Self {
        match v {
            DegradedArg::Placeholder => DegradedPolicy::Placeholder,
            DegradedArg::Skip => DegradedPolicy::Skip,
            DegradedArg::Fail => DegradedPolicy::Fail,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the feedback; library INFO logs would only
    // interleave with it.
    let show_progress = !cli.quiet && !cli.no_progress;
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

    // ── PDF engine ───────────────────────────────────────────────────────
    // First run only: fetch the pdfium library into the cache before any
    // document request, so a missing engine fails fast.
    if !pdfium_auto::is_pdfium_cached() {
        ensure_pdf_engine(cli.quiet)?;
    }

    // ── Build config ─────────────────────────────────────────────────────
    let cli_bar = show_progress.then(CliProgressCallback::new_dynamic);
    let progress_cb: Option<ProgressCallback> = match cli_bar {
        Some(ref cb) => Some(Arc::clone(cb) as Arc<dyn DownloadProgressCallback>),
        None if cli.quiet => None,
        None => Some(Arc::new(PlainProgressCallback) as Arc<dyn DownloadProgressCallback>),
    };

    let config = build_config(&cli, progress_cb)?;
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_output_path(cli.id)));

    // ── Run download ─────────────────────────────────────────────────────
    let result = download(cli.id, &output_path, &config).await;
    if let Some(cb) = cli_bar {
        cb.bar.finish_and_clear();
    }

    let output = result.with_context(|| {
        format!(
            "Download of document {} ({}) failed",
            cli.id,
            landing_url(cli.id, &config)
        )
    })?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    }

    if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {} pages  {}ms  →  {}",
            if stats.degraded == 0 {
                green("✔")
            } else {
                yellow("⚠")
            },
            stats.pages_written,
            stats.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
        if stats.recovered > 0 || stats.degraded > 0 {
            eprintln!(
                "   {} recovered via fallback  /  {} degraded",
                dim(&stats.recovered.to_string()),
                yellow(&stats.degraded.to_string()),
            );
        }
    }

    Ok(())
}

/// Download the pdfium library, with a byte-progress bar unless quiet.
fn ensure_pdf_engine(quiet: bool) -> Result<()> {
    if quiet {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download the PDF engine")?;
        return Ok(());
    }

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    bar.set_prefix("PDF engine");
    bar.enable_steady_tick(Duration::from_millis(80));

    let on_progress: &dyn Fn(u64, Option<u64>) = &|downloaded, total| {
        if let Some(t) = total {
            bar.set_length(t);
        }
        bar.set_position(downloaded);
    };
    let result =
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(Some(on_progress)));
    bar.finish_and_clear();
    let path = result.context("Failed to download the PDF engine")?;
    eprintln!("{} PDF engine ready: {}", green("✔"), dim(&path.display().to_string()));
    Ok(())
}

/// Map CLI args to `DownloadConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<DownloadConfig> {
    let profile = match cli.profile {
        Some(ref path) => SiteProfile::from_json_file(path)
            .with_context(|| format!("Failed to load site profile from {:?}", path))?,
        None => SiteProfile::default(),
    };

    let mut builder = DownloadConfig::builder()
        .profile(profile)
        .timeout_secs(cli.timeout)
        .degraded_policy(cli.on_degraded.clone().into());

    if let Some(ref ua) = cli.user_agent {
        builder = builder.user_agent(ua);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
