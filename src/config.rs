//! Configuration types for document downloads.
//!
//! All download behaviour is controlled through [`DownloadConfig`], built via
//! its [`DownloadConfigBuilder`]. Everything that is coupled to one host's
//! markup conventions (landing-page template, rewrite table, link pattern,
//! extension fallback) lives in a [`SiteProfile`] so it can be swapped from a
//! JSON file without touching the pipeline.

use crate::error::Doc2PdfError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Placeholder in [`SiteProfile::landing_template`] replaced by the document id.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Host serving the landing pages in the built-in profile.
pub const DEFAULT_HOST: &str = "www.example.com";

/// Image-asset subdomain the built-in profile redirects links to.
pub const DEFAULT_ASSET_HOST: &str = "html1.example.com";

/// Asset-host URLs ending in a raster-image extension (`.jpg`, `.png`, …).
///
/// The extension must close the locator, so `a.png.bak/1.jpg` is one link.
/// Group 1 is the locator; the boundary character is matched but not kept.
pub const DEFAULT_LINK_PATTERN: &str =
    r#"(https?://html[1-4]\.[^\s"'<>]+?\.[a-z][pn]g)(?:[^\w./-]|$)"#;

/// Configuration for a document download.
///
/// Built via [`DownloadConfig::builder()`] or using
/// [`DownloadConfig::default()`].
///
/// # Example
/// ```rust
/// use doc2pdf::{DegradedPolicy, DownloadConfig};
///
/// let config = DownloadConfig::builder()
///     .timeout_secs(30)
///     .degraded_policy(DegradedPolicy::Fail)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct DownloadConfig {
    /// Host-specific URL template, rewrite table, link pattern and fallback.
    pub profile: SiteProfile,

    /// Per-request timeout in seconds. `0` leaves the transport default. Default: 60.
    pub timeout_secs: u64,

    /// `User-Agent` sent with every request.
    pub user_agent: String,

    /// What the assembler does with pages that could not be fetched.
    pub degraded_policy: DegradedPolicy,

    /// Receives one event per fetched link. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            profile: SiteProfile::default(),
            timeout_secs: 60,
            user_agent: concat!("doc2pdf/", env!("CARGO_PKG_VERSION")).to_string(),
            degraded_policy: DegradedPolicy::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DownloadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadConfig")
            .field("profile", &self.profile)
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("degraded_policy", &self.degraded_policy)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn DownloadProgressCallback>"),
            )
            .finish()
    }
}

impl DownloadConfig {
    /// Create a new builder for `DownloadConfig`.
    pub fn builder() -> DownloadConfigBuilder {
        DownloadConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`DownloadConfig`].
#[derive(Debug)]
pub struct DownloadConfigBuilder {
    config: DownloadConfig,
}

impl DownloadConfigBuilder {
    pub fn profile(mut self, profile: SiteProfile) -> Self {
        self.config.profile = profile;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn degraded_policy(mut self, policy: DegradedPolicy) -> Self {
        self.config.degraded_policy = policy;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating the site profile.
    pub fn build(self) -> Result<DownloadConfig, Doc2PdfError> {
        self.config.profile.validate()?;
        if self.config.user_agent.trim().is_empty() {
            return Err(Doc2PdfError::InvalidConfig(
                "User agent must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Site profile ─────────────────────────────────────────────────────────

/// Everything tied to one host's current markup conventions.
///
/// Loadable from JSON:
///
/// ```json
/// {
///   "landing_template": "https://www.example.com/doc/{id}",
///   "rewrites": [
///     { "from": "//www.example.com", "to": "//html1.example.com" },
///     { "from": "/pages/", "to": "/images/" },
///     { "from": ".js", "to": ".jpg" }
///   ],
///   "link_pattern": "(https?://html[1-4]\\.[^\\s\"'<>]+?\\.[a-z][pn]g)(?:[^\\w./-]|$)",
///   "fallback": { "from": ".jpg", "to": ".png" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteProfile {
    /// Landing-page URL with [`ID_PLACEHOLDER`] appearing exactly once.
    pub landing_template: String,
    /// Literal substitutions applied to the markup in a single pass.
    pub rewrites: Vec<Rewrite>,
    /// Regex matching one image locator in the rewritten markup.
    pub link_pattern: String,
    /// Suffix swap retried once when an image fetch is not successful.
    pub fallback: FallbackRule,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            landing_template: format!("https://{DEFAULT_HOST}/doc/{ID_PLACEHOLDER}"),
            rewrites: vec![
                Rewrite::new(format!("//{DEFAULT_HOST}"), format!("//{DEFAULT_ASSET_HOST}")),
                Rewrite::new("/pages/", "/images/"),
                Rewrite::new(".js", ".jpg"),
            ],
            link_pattern: DEFAULT_LINK_PATTERN.to_string(),
            fallback: FallbackRule::default(),
        }
    }
}

impl SiteProfile {
    /// Read a profile from a JSON file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Doc2PdfError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Doc2PdfError::InvalidProfile(format!("cannot read '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Parse a profile from JSON text and validate it.
    pub fn from_json_str(raw: &str) -> Result<Self, Doc2PdfError> {
        let profile: SiteProfile = serde_json::from_str(raw)
            .map_err(|e| Doc2PdfError::InvalidProfile(format!("malformed JSON: {e}")))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Check the invariants the pipeline relies on.
    ///
    /// A replacement that contains any rule's source literal would be
    /// rewritten again by a second pass, so such tables are rejected.
    pub fn validate(&self) -> Result<(), Doc2PdfError> {
        let placeholders = self.landing_template.matches(ID_PLACEHOLDER).count();
        if placeholders != 1 {
            return Err(Doc2PdfError::InvalidProfile(format!(
                "landing_template must contain {ID_PLACEHOLDER} exactly once, found {placeholders}"
            )));
        }

        let mut seen = HashSet::new();
        for rule in &self.rewrites {
            if rule.from.is_empty() {
                return Err(Doc2PdfError::InvalidProfile(
                    "rewrite rule with empty 'from'".into(),
                ));
            }
            if !seen.insert(rule.from.as_str()) {
                return Err(Doc2PdfError::InvalidProfile(format!(
                    "duplicate rewrite rule for '{}'",
                    rule.from
                )));
            }
        }
        for rule in &self.rewrites {
            if let Some(other) = self.rewrites.iter().find(|o| rule.to.contains(&o.from)) {
                return Err(Doc2PdfError::InvalidProfile(format!(
                    "replacement '{}' contains '{}' and would be rewritten again",
                    rule.to, other.from
                )));
            }
        }

        regex::Regex::new(&self.link_pattern).map_err(|e| {
            Doc2PdfError::InvalidProfile(format!("link_pattern does not compile: {e}"))
        })?;

        if self.fallback.from.is_empty() {
            return Err(Doc2PdfError::InvalidProfile(
                "fallback 'from' suffix must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Interpolate the document id into the landing template.
    pub fn landing_url(&self, id: u64) -> String {
        self.landing_template.replacen(ID_PLACEHOLDER, &id.to_string(), 1)
    }
}

/// One literal substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewrite {
    pub from: String,
    pub to: String,
}

impl Rewrite {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Suffix swap applied to a link whose first fetch was not successful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackRule {
    pub from: String,
    pub to: String,
}

impl Default for FallbackRule {
    fn default() -> Self {
        Self {
            from: ".jpg".into(),
            to: ".png".into(),
        }
    }
}

impl FallbackRule {
    /// The alternate locator, or `None` when the link lacks the suffix.
    pub fn apply(&self, url: &str) -> Option<String> {
        url.strip_suffix(self.from.as_str())
            .map(|stem| format!("{stem}{}", self.to))
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// What the assembler receives for a page that could not be fetched.
///
/// | Policy | Effect |
/// |--------|--------|
/// | `Placeholder` | blank page keeps the page count and numbering (default) |
/// | `Skip` | the page is left out; later pages move up |
/// | `Fail` | the run fails with [`Doc2PdfError::DegradedPages`], no file |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegradedPolicy {
    #[default]
    Placeholder,
    Skip,
    Fail,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_is_valid() {
        SiteProfile::default().validate().expect("built-in profile");
        DownloadConfig::builder().build().expect("default config");
    }

    #[test]
    fn landing_url_interpolates_id_once() {
        let profile = SiteProfile::default();
        assert_eq!(profile.landing_url(42), "https://www.example.com/doc/42");
        assert_eq!(
            profile.landing_url(u64::MAX),
            format!("https://www.example.com/doc/{}", u64::MAX)
        );
        assert_eq!(profile.landing_url(0), "https://www.example.com/doc/0");
    }

    #[test]
    fn template_without_placeholder_rejected() {
        let profile = SiteProfile {
            landing_template: "https://www.example.com/doc/".into(),
            ..SiteProfile::default()
        };
        assert!(matches!(
            profile.validate(),
            Err(Doc2PdfError::InvalidProfile(_))
        ));
    }

    #[test]
    fn template_with_two_placeholders_rejected() {
        let profile = SiteProfile {
            landing_template: "https://{id}.example.com/doc/{id}".into(),
            ..SiteProfile::default()
        };
        assert!(profile.validate().is_err());
    }

    #[test]
    fn self_feeding_rewrite_rejected() {
        let profile = SiteProfile {
            rewrites: vec![Rewrite::new("example.com", "html1.example.com")],
            ..SiteProfile::default()
        };
        let err = profile.validate().unwrap_err().to_string();
        assert!(err.contains("rewritten again"), "got: {err}");
    }

    #[test]
    fn cross_feeding_rewrite_rejected() {
        let profile = SiteProfile {
            rewrites: vec![Rewrite::new("/a/", "/b/"), Rewrite::new("/c/", "/x/a/")],
            ..SiteProfile::default()
        };
        assert!(profile.validate().is_err());
    }

    #[test]
    fn duplicate_and_empty_rules_rejected() {
        let dup = SiteProfile {
            rewrites: vec![Rewrite::new("/a/", "/b/"), Rewrite::new("/a/", "/c/")],
            ..SiteProfile::default()
        };
        assert!(dup.validate().is_err());

        let empty = SiteProfile {
            rewrites: vec![Rewrite::new("", "/b/")],
            ..SiteProfile::default()
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn bad_pattern_rejected() {
        let profile = SiteProfile {
            link_pattern: "https?://(".into(),
            ..SiteProfile::default()
        };
        let err = profile.validate().unwrap_err().to_string();
        assert!(err.contains("link_pattern"), "got: {err}");
    }

    #[test]
    fn profile_json_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        let profile = SiteProfile::default();
        std::fs::write(&path, serde_json::to_string_pretty(&profile).unwrap()).unwrap();
        assert_eq!(SiteProfile::from_json_file(&path).unwrap(), profile);
    }

    #[test]
    fn malformed_profile_json_rejected() {
        assert!(matches!(
            SiteProfile::from_json_str("{ \"landing_template\": 3 }"),
            Err(Doc2PdfError::InvalidProfile(_))
        ));
    }

    #[test]
    fn fallback_swaps_suffix_only() {
        let rule = FallbackRule::default();
        assert_eq!(
            rule.apply("https://html1.example.com/images/1.jpg").as_deref(),
            Some("https://html1.example.com/images/1.png")
        );
        assert_eq!(
            rule.apply("https://html1.example.com/a.jpg/2.jpg").as_deref(),
            Some("https://html1.example.com/a.jpg/2.png")
        );
        assert_eq!(rule.apply("https://html1.example.com/images/1.png"), None);
    }

    #[test]
    fn degraded_policy_serialises_lowercase() {
        assert_eq!(
            serde_json::to_string(&DegradedPolicy::Placeholder).unwrap(),
            "\"placeholder\""
        );
        let p: DegradedPolicy = serde_json::from_str("\"skip\"").unwrap();
        assert_eq!(p, DegradedPolicy::Skip);
    }

    #[test]
    fn empty_user_agent_rejected() {
        assert!(DownloadConfig::builder().user_agent("  ").build().is_err());
    }
}
