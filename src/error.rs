//! Error types for the doc2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Doc2PdfError`] is **fatal**: the run cannot produce an artifact
//!   (transport failure, landing page not served, undecodable image, PDF
//!   engine missing). Returned as `Err(Doc2PdfError)` from the top-level
//!   `download*` functions.
//!
//! * [`PageError`] is **non-fatal**: one page image could not be fetched even
//!   after the extension fallback. Stored inside
//!   [`crate::output::PageOutcome::Degraded`] so the run can finish and report
//!   how many pages degraded instead of silently embedding garbage.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the doc2pdf library.
///
/// Page-level fetch failures use [`PageError`] and are stored in
/// [`crate::output::PageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Doc2PdfError {
    // ── Network errors ────────────────────────────────────────────────────
    /// The transport could not complete the request (DNS, refused, TLS…).
    #[error("Failed to fetch '{url}': {reason}\nCheck your internet connection.")]
    Network { url: String, reason: String },

    /// The request did not complete within the configured timeout.
    #[error("Request timed out after {secs}s for '{url}'\nIncrease --timeout.")]
    NetworkTimeout { url: String, secs: u64 },

    /// The landing page answered with a non-success status; there is no
    /// markup to extract links from.
    #[error("Landing page '{url}' returned HTTP {status}")]
    LandingPageStatus { url: String, status: u16 },

    // ── Assembly errors ───────────────────────────────────────────────────
    /// A page buffer is not a decodable image in a supported format.
    #[error("Page {page} is not a decodable image: {detail}")]
    Encoding { page: usize, detail: String },

    /// No page images were handed to the assembler.
    #[error("No page images to assemble; the landing page yielded no links")]
    EmptyDocument,

    /// Some pages could not be fetched and the degraded-page policy is `fail`.
    #[error("{degraded}/{total} pages could not be fetched")]
    DegradedPages { degraded: usize, total: usize },

    /// pdfium returned an error while building or saving the document.
    #[error("Failed to write PDF '{path}': {detail}")]
    PdfWriteFailed { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// The site profile (rewrite table, link pattern, template) is unusable.
    #[error("Invalid site profile: {0}")]
    InvalidProfile(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Writing the PDF needs the pdfium shared library. You can:\n\
  • Place libpdfium (pdfium.dll on Windows) in the working directory.\n\
  • Install it system-wide so the dynamic loader can find it.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page image.
///
/// Stored in [`crate::output::PageOutcome::Degraded`]. What happens to the
/// page afterwards is decided by [`crate::config::DegradedPolicy`].
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The link (and its fallback, when one applies) answered with a
    /// non-success status.
    #[error("Page {page}: '{url}' returned HTTP {status}")]
    Status { page: usize, url: String, status: u16 },
}

impl PageError {
    /// 1-indexed page number the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::Status { page, .. } => *page,
        }
    }
}
