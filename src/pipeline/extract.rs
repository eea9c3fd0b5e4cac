//! Link extraction: landing-page markup → ordered image locators.
//!
//! The markup does not reference images directly. Its links point at a
//! placeholder host, a `pages` path and a script-data extension; only after
//! the profile's rewrite table has been applied do they become locators the
//! asset hosts will serve. Extraction therefore runs in two steps:
//!
//! 1. **Rewrite**: every rule's `from` literal is folded into one regex
//!    alternation and replaced in a single left-to-right pass. Text emitted by
//!    one rule is never scanned again, so rule order cannot matter.
//! 2. **Match**: the link pattern is run over the rewritten text and every
//!    match is returned in textual order, which is page order.

use crate::config::{SiteProfile, DEFAULT_LINK_PATTERN};
use crate::error::Doc2PdfError;
use crate::pipeline::fetch::{Fetcher, PayloadKind};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use tracing::{debug, info};

static RE_DEFAULT_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(DEFAULT_LINK_PATTERN).unwrap());

/// Compiled form of a [`SiteProfile`]'s rewrite table and link pattern.
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    /// `None` when the profile has no rewrite rules.
    rewrite_re: Option<Regex>,
    replacements: HashMap<String, String>,
    link_re: Regex,
}

impl Default for LinkExtractor {
    fn default() -> Self {
        let profile = SiteProfile::default();
        Self {
            rewrite_re: compile_rewrites(&profile),
            replacements: replacement_map(&profile),
            link_re: RE_DEFAULT_LINK.clone(),
        }
    }
}

impl LinkExtractor {
    /// Compile a validated profile.
    pub fn new(profile: &SiteProfile) -> Result<Self, Doc2PdfError> {
        profile.validate()?;
        let link_re = Regex::new(&profile.link_pattern)
            .map_err(|e| Doc2PdfError::InvalidProfile(format!("link_pattern: {e}")))?;
        Ok(Self {
            rewrite_re: compile_rewrites(profile),
            replacements: replacement_map(profile),
            link_re,
        })
    }

    /// Apply the whole rewrite table in one pass.
    pub fn rewrite(&self, markup: &str) -> String {
        match &self.rewrite_re {
            Some(re) => re
                .replace_all(markup, |caps: &Captures| {
                    // Every match is one of the keys by construction.
                    self.replacements
                        .get(&caps[0])
                        .cloned()
                        .unwrap_or_else(|| caps[0].to_string())
                })
                .into_owned(),
            None => markup.to_string(),
        }
    }

    /// Rewrite the markup, then collect every link in order of appearance.
    ///
    /// When the pattern has a capture group, group 1 is the link; otherwise
    /// the whole match is.
    pub fn links(&self, markup: &str) -> Vec<String> {
        let rewritten = self.rewrite(markup);
        self.link_re
            .captures_iter(&rewritten)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

/// Fetch the landing page and extract its image locators.
///
/// # Errors
/// [`Doc2PdfError::LandingPageStatus`] if the page is not served with a
/// success status: there is nothing to extract from an error page.
pub async fn extract_links<F: Fetcher>(
    fetcher: &F,
    extractor: &LinkExtractor,
    landing_url: &str,
) -> Result<Vec<String>, Doc2PdfError> {
    info!("Fetching landing page: {}", landing_url);
    let fetched = fetcher.fetch(landing_url, PayloadKind::Text).await?;

    if !fetched.is_success() {
        return Err(Doc2PdfError::LandingPageStatus {
            url: landing_url.to_string(),
            status: fetched.status.as_u16(),
        });
    }

    let markup = fetched.into_text();
    debug!("Landing page markup: {} bytes", markup.len());

    let links = extractor.links(&markup);
    info!("Extracted {} image links", links.len());
    Ok(links)
}

/// Longest literal first so a rule whose `from` is a prefix of another's
/// never shadows it.
fn compile_rewrites(profile: &SiteProfile) -> Option<Regex> {
    if profile.rewrites.is_empty() {
        return None;
    }
    let mut literals: Vec<&str> = profile.rewrites.iter().map(|r| r.from.as_str()).collect();
    literals.sort_by_key(|s| std::cmp::Reverse(s.len()));
    let alternation = literals
        .iter()
        .map(|s| regex::escape(s))
        .collect::<Vec<_>>()
        .join("|");
    // Escaped literals always compile.
    Regex::new(&alternation).ok()
}

fn replacement_map(profile: &SiteProfile) -> HashMap<String, String> {
    profile
        .rewrites
        .iter()
        .map(|r| (r.from.clone(), r.to.clone()))
        .collect()
}
