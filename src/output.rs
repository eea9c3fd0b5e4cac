//! Result types returned by the download entry points.

use crate::error::PageError;
use serde::{Deserialize, Serialize};

/// What came back for one link.
///
/// The orchestrator produces exactly one outcome per link, in link order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PageOutcome {
    /// The link answered with a success status on the first try.
    Fetched {
        #[serde(skip)]
        bytes: Vec<u8>,
    },
    /// The first fetch failed; the fallback locator succeeded.
    Recovered {
        url: String,
        #[serde(skip)]
        bytes: Vec<u8>,
    },
    /// Neither the link nor its fallback produced an image.
    Degraded { error: PageError },
}

impl PageOutcome {
    /// Image bytes, if any were fetched.
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            PageOutcome::Fetched { bytes } | PageOutcome::Recovered { bytes, .. } => {
                Some(bytes.as_slice())
            }
            PageOutcome::Degraded { .. } => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, PageOutcome::Degraded { .. })
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self, PageOutcome::Recovered { .. })
    }
}

/// One page of the document, in link order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed position in the link sequence.
    pub page_num: usize,
    /// Image locator as extracted from the landing page.
    pub url: String,
    pub outcome: PageOutcome,
    /// Wall-clock time spent on this link including the fallback.
    pub duration_ms: u64,
}

/// Run-level counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadStats {
    /// Links extracted from the landing page.
    pub total_links: usize,
    /// Pages fetched on the first try.
    pub fetched: usize,
    /// Pages fetched through the extension fallback.
    pub recovered: usize,
    /// Pages with no image.
    pub degraded: usize,
    /// Pages in the written PDF.
    pub pages_written: usize,
    pub total_duration_ms: u64,
    pub fetch_duration_ms: u64,
    pub assemble_duration_ms: u64,
}

/// Everything a completed run produced, besides the file itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadOutput {
    pub landing_url: String,
    /// Extracted image locators, in page order.
    pub links: Vec<String>,
    pub pages: Vec<PageResult>,
    pub stats: DownloadStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_bytes() {
        assert_eq!(
            PageOutcome::Fetched { bytes: vec![1] }.bytes(),
            Some(&[1u8][..])
        );
        let recovered = PageOutcome::Recovered {
            url: "https://html1.example.com/images/1.png".into(),
            bytes: vec![2],
        };
        assert_eq!(recovered.bytes(), Some(&[2u8][..]));
        assert!(recovered.is_recovered());
        let degraded = PageOutcome::Degraded {
            error: PageError::Status {
                page: 1,
                url: "https://html1.example.com/images/1.png".into(),
                status: 404,
            },
        };
        assert!(degraded.bytes().is_none());
        assert!(degraded.is_degraded());
    }

    #[test]
    fn outcome_json_omits_image_bytes() {
        let json = serde_json::to_string(&PageOutcome::Recovered {
            url: "https://html1.example.com/images/1.png".into(),
            bytes: vec![0xFF; 64],
        })
        .unwrap();
        assert!(json.contains("\"kind\":\"recovered\""), "got: {json}");
        assert!(!json.contains("255"), "got: {json}");
    }
}
