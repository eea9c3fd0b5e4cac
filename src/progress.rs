//! Progress-callback trait for per-page download events.
//!
//! Inject an [`Arc<dyn DownloadProgressCallback>`] via
//! [`crate::config::DownloadConfigBuilder::progress_callback`] to receive an
//! event after every link, whether its image was fetched, recovered through
//! the extension fallback, or degraded.
//!
//! # Example
//!
//! ```rust
//! use doc2pdf::{DownloadConfig, DownloadProgressCallback, PageOutcome};
//! use std::sync::Arc;
//!
//! struct PrintLines;
//!
//! impl DownloadProgressCallback for PrintLines {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, _outcome: &PageOutcome) {
//!         println!("Downloaded {page_num}/{total_pages}");
//!     }
//! }
//!
//! let config = DownloadConfig::builder()
//!     .progress_callback(Arc::new(PrintLines) as Arc<dyn DownloadProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::PageOutcome;
use std::sync::Arc;

/// Called by the orchestrator as it walks the link sequence.
///
/// Links are fetched one at a time, so events arrive in page order. All
/// methods have default no-op implementations so callers only override what
/// they care about.
pub trait DownloadProgressCallback: Send + Sync {
    /// Called once after link extraction, before the first image fetch.
    ///
    /// # Arguments
    /// * `total_pages`: number of links extracted from the landing page
    fn on_download_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after each link has been processed, success or not.
    ///
    /// # Arguments
    /// * `page_num`: 1-indexed position of the link
    /// * `total_pages`: number of links
    /// * `outcome`: fetched, recovered through the fallback, or degraded
    fn on_page_complete(&self, page_num: usize, total_pages: usize, outcome: &PageOutcome) {
        let _ = (page_num, total_pages, outcome);
    }

    /// Called once after the last link, before assembly.
    ///
    /// # Arguments
    /// * `total_pages`: number of links
    /// * `degraded`: pages whose image could not be fetched
    fn on_download_complete(&self, total_pages: usize, degraded: usize) {
        let _ = (total_pages, degraded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl DownloadProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DownloadConfig`].
pub type ProgressCallback = Arc<dyn DownloadProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PageError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        total: AtomicUsize,
        pages: AtomicUsize,
        degraded_seen: AtomicUsize,
        degraded_reported: AtomicUsize,
    }

    impl DownloadProgressCallback for TrackingCallback {
        fn on_download_start(&self, total_pages: usize) {
            self.total.store(total_pages, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, outcome: &PageOutcome) {
            self.pages.fetch_add(1, Ordering::SeqCst);
            if outcome.is_degraded() {
                self.degraded_seen.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_download_complete(&self, _total_pages: usize, degraded: usize) {
            self.degraded_reported.store(degraded, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_download_start(2);
        cb.on_page_complete(1, 2, &PageOutcome::Fetched { bytes: vec![1, 2, 3] });
        cb.on_download_complete(2, 0);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_download_start(2);
        tracker.on_page_complete(1, 2, &PageOutcome::Fetched { bytes: vec![0xFF] });
        tracker.on_page_complete(
            2,
            2,
            &PageOutcome::Degraded {
                error: PageError::Status {
                    page: 2,
                    url: "https://html1.example.com/images/2.png".into(),
                    status: 404,
                },
            },
        );
        tracker.on_download_complete(2, 1);

        assert_eq!(tracker.total.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.pages.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.degraded_seen.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.degraded_reported.load(Ordering::SeqCst), 1);
    }
}
