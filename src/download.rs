//! Download orchestration: document id → landing page → links → images → PDF.
//!
//! Links are fetched strictly one after another over a single reusable
//! client, and every link yields exactly one [`PageResult`], in link order,
//! whatever happened to it. That one-to-one ordering is what keeps the page
//! order of the written PDF equal to the page order of the source document.
//!
//! A link whose first fetch is not successful gets exactly one retry with
//! the profile's fallback suffix (`.jpg` → `.png`). The retry's status is
//! checked: if it fails too the page is recorded as
//! [`PageOutcome::Degraded`] and [`crate::config::DegradedPolicy`] decides
//! what the assembler receives for it.

use crate::config::{DegradedPolicy, DownloadConfig};
use crate::error::{Doc2PdfError, PageError};
use crate::output::{DownloadOutput, DownloadStats, PageOutcome, PageResult};
use crate::pipeline::assemble::{self, PLACEHOLDER_SIZE};
use crate::pipeline::extract::{extract_links, LinkExtractor};
use crate::pipeline::fetch::{Fetcher, HttpFetcher, PayloadKind};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Build the landing-page URL for a document id.
pub fn landing_url(id: u64, config: &DownloadConfig) -> String {
    config.profile.landing_url(id)
}

/// Default output file name for a document id: `<id>.pdf`.
pub fn default_output_path(id: u64) -> String {
    format!("{id}.pdf")
}

/// Download document `id` and write it as a PDF at `output_path`.
///
/// This is the primary entry point for the library. It builds one
/// [`HttpFetcher`] for the whole run.
///
/// # Errors
/// Fatal errors only: transport failure, non-success landing page, an
/// undecodable image, an empty link list, pdfium/output failures, or
/// degraded pages under [`DegradedPolicy::Fail`]. Pages recovered through the
/// fallback or replaced by placeholders are reported in the returned stats.
pub async fn download(
    id: u64,
    output_path: impl AsRef<Path>,
    config: &DownloadConfig,
) -> Result<DownloadOutput, Doc2PdfError> {
    let fetcher = HttpFetcher::new(config)?;
    download_with_fetcher(&fetcher, id, output_path, config).await
}

/// Same as [`download`] with a caller-supplied [`Fetcher`].
pub async fn download_with_fetcher<F: Fetcher>(
    fetcher: &F,
    id: u64,
    output_path: impl AsRef<Path>,
    config: &DownloadConfig,
) -> Result<DownloadOutput, Doc2PdfError> {
    let total_start = Instant::now();
    let output_path = output_path.as_ref();
    let extractor = LinkExtractor::new(&config.profile)?;

    // ── Step 1: Landing page ─────────────────────────────────────────────
    let landing = landing_url(id, config);
    info!("Starting download of document {}", id);

    // ── Step 2: Extract links ────────────────────────────────────────────
    let links = extract_links(fetcher, &extractor, &landing).await?;
    let total = links.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_download_start(total);
    }

    // ── Step 3: Fetch each image, in order ───────────────────────────────
    let fetch_start = Instant::now();
    let pages = fetch_pages(fetcher, &links, config).await?;
    let fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;

    let degraded = pages.iter().filter(|p| p.outcome.is_degraded()).count();
    let recovered = pages.iter().filter(|p| p.outcome.is_recovered()).count();

    if let Some(ref cb) = config.progress_callback {
        cb.on_download_complete(total, degraded);
    }
    if degraded > 0 {
        warn!("{}/{} pages could not be fetched", degraded, total);
    }

    // ── Step 4: Assemble ─────────────────────────────────────────────────
    let buffers = page_buffers(&pages, config.degraded_policy)?;
    let assemble_start = Instant::now();
    let pages_written = assemble::assemble(buffers, output_path).await?;
    let assemble_duration_ms = assemble_start.elapsed().as_millis() as u64;

    let stats = DownloadStats {
        total_links: total,
        fetched: total - recovered - degraded,
        recovered,
        degraded,
        pages_written,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        fetch_duration_ms,
        assemble_duration_ms,
    };

    info!(
        "Document {} complete: {} pages ({} recovered, {} degraded), {}ms → {}",
        id,
        pages_written,
        recovered,
        degraded,
        stats.total_duration_ms,
        output_path.display()
    );

    Ok(DownloadOutput {
        landing_url: landing,
        links,
        pages,
        stats,
    })
}

/// Synchronous wrapper around [`download`].
///
/// Creates a temporary tokio runtime internally.
pub fn download_sync(
    id: u64,
    output_path: impl AsRef<Path>,
    config: &DownloadConfig,
) -> Result<DownloadOutput, Doc2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Doc2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(download(id, output_path, config))
}

// ── Per-link loop ────────────────────────────────────────────────────────

/// Fetch every link one at a time, reporting progress after each.
///
/// Returns one [`PageResult`] per link, in link order. Any transport failure,
/// on the first fetch or on the fallback retry, aborts the run; only
/// non-success statuses end up in [`PageOutcome::Degraded`].
pub async fn fetch_pages<F: Fetcher>(
    fetcher: &F,
    links: &[String],
    config: &DownloadConfig,
) -> Result<Vec<PageResult>, Doc2PdfError> {
    let total = links.len();
    let mut results = Vec::with_capacity(total);

    for (idx, url) in links.iter().enumerate() {
        let page_num = idx + 1;
        let start = Instant::now();
        let outcome = fetch_page(fetcher, page_num, url, config).await?;

        if let Some(ref cb) = config.progress_callback {
            cb.on_page_complete(page_num, total, &outcome);
        }

        results.push(PageResult {
            page_num,
            url: url.clone(),
            outcome,
            duration_ms: start.elapsed().as_millis() as u64,
        });
    }

    Ok(results)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// One link: first fetch, then at most one fallback fetch.
async fn fetch_page<F: Fetcher>(
    fetcher: &F,
    page_num: usize,
    url: &str,
    config: &DownloadConfig,
) -> Result<PageOutcome, Doc2PdfError> {
    let first = fetcher.fetch(url, PayloadKind::Binary).await?;
    if first.is_success() {
        debug!("Page {}: fetched {}", page_num, url);
        return Ok(PageOutcome::Fetched {
            bytes: first.into_bytes(),
        });
    }

    let Some(alt) = config.profile.fallback.apply(url) else {
        warn!(
            "Page {}: HTTP {} and no fallback applies to {}",
            page_num, first.status, url
        );
        return Ok(PageOutcome::Degraded {
            error: PageError::Status {
                page: page_num,
                url: url.to_string(),
                status: first.status.as_u16(),
            },
        });
    };

    warn!(
        "Page {}: HTTP {} for {}, retrying as {}",
        page_num, first.status, url, alt
    );

    let retry = fetcher.fetch(&alt, PayloadKind::Binary).await?;
    if retry.is_success() {
        return Ok(PageOutcome::Recovered {
            url: alt,
            bytes: retry.into_bytes(),
        });
    }
    Ok(PageOutcome::Degraded {
        error: PageError::Status {
            page: page_num,
            url: alt,
            status: retry.status.as_u16(),
        },
    })
}

/// Turn page outcomes into the buffers handed to the assembler.
fn page_buffers(
    pages: &[PageResult],
    policy: DegradedPolicy,
) -> Result<Vec<Vec<u8>>, Doc2PdfError> {
    let degraded = pages.iter().filter(|p| p.outcome.is_degraded()).count();
    if degraded > 0 && policy == DegradedPolicy::Fail {
        return Err(Doc2PdfError::DegradedPages {
            degraded,
            total: pages.len(),
        });
    }

    // Placeholders take the size of the first page whose header is readable.
    let (width, height) = pages
        .iter()
        .filter_map(|p| p.outcome.bytes())
        .find_map(assemble::image_dimensions)
        .unwrap_or(PLACEHOLDER_SIZE);

    let mut buffers = Vec::with_capacity(pages.len());
    for page in pages {
        match (page.outcome.bytes(), policy) {
            (Some(bytes), _) => buffers.push(bytes.to_vec()),
            (None, DegradedPolicy::Placeholder) => {
                buffers.push(assemble::placeholder_page(width, height)?)
            }
            (None, _) => debug!("Page {}: skipped", page.page_num),
        }
    }
    Ok(buffers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteProfile;

    fn page(page_num: usize, outcome: PageOutcome) -> PageResult {
        PageResult {
            page_num,
            url: format!("https://html1.example.com/images/{page_num}.jpg"),
            outcome,
            duration_ms: 0,
        }
    }

    fn degraded(page_num: usize) -> PageOutcome {
        PageOutcome::Degraded {
            error: PageError::Status {
                page: page_num,
                url: format!("https://html1.example.com/images/{page_num}.png"),
                status: 404,
            },
        }
    }

    #[test]
    fn landing_url_uses_profile_template() {
        let config = DownloadConfig::default();
        assert_eq!(landing_url(123, &config), "https://www.example.com/doc/123");
    }

    #[test]
    fn default_output_is_id_dot_pdf() {
        assert_eq!(default_output_path(98765), "98765.pdf");
    }

    #[test]
    fn buffers_placeholder_keeps_count_and_order() {
        let pages = vec![
            page(1, PageOutcome::Fetched { bytes: vec![1] }),
            page(2, degraded(2)),
            page(
                3,
                PageOutcome::Recovered {
                    url: "https://html1.example.com/images/3.png".into(),
                    bytes: vec![3],
                },
            ),
        ];
        let buffers = page_buffers(&pages, DegradedPolicy::Placeholder).unwrap();
        assert_eq!(buffers.len(), 3);
        assert_eq!(buffers[0], vec![1]);
        assert_eq!(buffers[2], vec![3]);
        let (w, h) = assemble::image_dimensions(&buffers[1]).unwrap();
        assert_eq!((w, h), PLACEHOLDER_SIZE);
    }

    #[test]
    fn buffers_skip_drops_degraded() {
        let pages = vec![
            page(1, degraded(1)),
            page(2, PageOutcome::Fetched { bytes: vec![2] }),
        ];
        assert_eq!(
            page_buffers(&pages, DegradedPolicy::Skip).unwrap(),
            vec![vec![2]]
        );
    }

    #[test]
    fn buffers_fail_policy_errors() {
        let pages = vec![
            page(1, PageOutcome::Fetched { bytes: vec![1] }),
            page(2, degraded(2)),
        ];
        assert!(matches!(
            page_buffers(&pages, DegradedPolicy::Fail),
            Err(Doc2PdfError::DegradedPages {
                degraded: 1,
                total: 2
            })
        ));
    }

    #[test]
    fn download_sync_surfaces_transport_failure() {
        // Nothing listens on the local discard port.
        let profile = SiteProfile {
            landing_template: "http://127.0.0.1:9/doc/{id}".into(),
            ..SiteProfile::default()
        };
        let config = DownloadConfig::builder()
            .profile(profile)
            .timeout_secs(5)
            .build()
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("1.pdf");

        let err = download_sync(1, &out, &config).unwrap_err();

        assert!(
            matches!(
                err,
                Doc2PdfError::Network { .. } | Doc2PdfError::NetworkTimeout { .. }
            ),
            "got: {err:?}"
        );
        assert!(!out.exists());
    }

    #[test]
    fn buffers_empty_stay_empty() {
        assert!(page_buffers(&[], DegradedPolicy::Placeholder)
            .unwrap()
            .is_empty());
    }
}
