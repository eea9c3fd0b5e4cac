//! Resource fetching: one HTTP GET per call, text or binary payload.
//!
//! A single [`HttpFetcher`] (one `reqwest::Client`, so one connection pool)
//! is built per run and borrowed by every stage that touches the network.
//! Nothing here retries: the extension fallback for page images is a caller
//! decision made in [`crate::download`].
//!
//! The [`Fetcher`] trait is the seam tests use to drive the whole pipeline
//! without a network.

use crate::config::DownloadConfig;
use crate::error::Doc2PdfError;
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error};

/// How the caller wants the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Text,
    Binary,
}

/// A response body, decoded according to the requested [`PayloadKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

/// The body of one retrieval plus its HTTP status.
///
/// A non-success status is *not* an error at this layer; callers decide.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub status: StatusCode,
    pub payload: Payload,
}

impl Fetched {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The body as text, lossily decoding a binary payload.
    pub fn into_text(self) -> String {
        match self.payload {
            Payload::Text(s) => s,
            Payload::Binary(b) => String::from_utf8_lossy(&b).into_owned(),
        }
    }

    /// The body as raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        match self.payload {
            Payload::Text(s) => s.into_bytes(),
            Payload::Binary(b) => b,
        }
    }
}

/// Performs one network retrieval per call.
///
/// Implementations return `Err` only when the transport could not complete
/// the request; any HTTP status, success or not, comes back as `Ok`.
pub trait Fetcher: Send + Sync {
    fn fetch(
        &self,
        url: &str,
        kind: PayloadKind,
    ) -> impl Future<Output = Result<Fetched, Doc2PdfError>> + Send;
}

/// [`Fetcher`] backed by a single reusable `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    /// Build the client once for the whole run.
    pub fn new(config: &DownloadConfig) -> Result<Self, Doc2PdfError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.as_str());
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| Doc2PdfError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout_secs: config.timeout_secs,
        })
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> Doc2PdfError {
        let err = if e.is_timeout() {
            Doc2PdfError::NetworkTimeout {
                url: url.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            Doc2PdfError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            }
        };
        error!("{}", err);
        err
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, kind: PayloadKind) -> Result<Fetched, Doc2PdfError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        let status = response.status();
        let payload = match kind {
            PayloadKind::Text => Payload::Text(
                response
                    .text()
                    .await
                    .map_err(|e| self.transport_error(url, e))?,
            ),
            PayloadKind::Binary => Payload::Binary(
                response
                    .bytes()
                    .await
                    .map_err(|e| self.transport_error(url, e))?
                    .to_vec(),
            ),
        };

        debug!("GET {} → {}", url, status);
        Ok(Fetched { status, payload })
    }
}
