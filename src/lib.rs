//! # doc2pdf
//!
//! Download the page images of a document hosted on a web document site and
//! assemble them into a single PDF, one image per page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document id
//!  │
//!  ├─ 1. Locate   interpolate the id into the landing-page template
//!  ├─ 2. Extract  fetch the markup, rewrite it in one pass, match image links
//!  ├─ 3. Fetch    one GET per link, in order; one `.jpg` → `.png` retry
//!  ├─ 4. Assemble decode every image, write one PDF page per image
//!  └─ 5. Output   per-page outcomes + run stats (degraded pages counted)
//! ```
//!
//! Everything tied to the host's markup conventions (URL template, rewrite
//! table, link pattern, fallback suffix) is a [`SiteProfile`] that can be
//! loaded from JSON.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doc2pdf::{download, DownloadConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DownloadConfig::default();
//!     let output = download(123456, "123456.pdf", &config).await?;
//!     eprintln!(
//!         "{} pages, {} degraded",
//!         output.stats.pages_written, output.stats.degraded
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2pdf` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Writing the PDF needs the pdfium shared library at runtime. It is found
//! or downloaded by the `pdfium-auto` workspace crate; see
//! [`pipeline::assemble::bind_pdfium`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod download;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    DegradedPolicy, DownloadConfig, DownloadConfigBuilder, FallbackRule, Rewrite, SiteProfile,
};
pub use download::{
    default_output_path, download, download_sync, download_with_fetcher, fetch_pages, landing_url,
};
pub use error::{Doc2PdfError, PageError};
pub use output::{DownloadOutput, DownloadStats, PageOutcome, PageResult};
pub use pipeline::assemble::count_pages;
pub use pipeline::extract::LinkExtractor;
pub use pipeline::fetch::{Fetched, Fetcher, HttpFetcher, Payload, PayloadKind};
pub use progress::{DownloadProgressCallback, NoopProgressCallback, ProgressCallback};
