//! # pdfium-auto
//!
//! Find a [PDFium](https://pdfium.googlesource.com/pdfium/) shared library
//! for `pdfium-render`, downloading a prebuilt one into a per-user cache when
//! none is available yet.
//!
//! ## Resolution order
//!
//! 1. `PDFIUM_LIB_PATH`, which must name an existing file when set.
//! 2. The cached copy in [`pdfium_cache_dir`].
//! 3. A download of the platform archive from
//!    [bblanchon/pdfium-binaries](https://github.com/bblanchon/pdfium-binaries),
//!    extracted into the cache.
//!
//! The resolved path is remembered for the rest of the process, and at most
//! one download runs at a time.
//!
//! ```rust,no_run
//! let pdfium = pdfium_auto::bind_pdfium(Some(&|done, total| {
//!     eprint!("\rPDF engine: {done}/{} bytes", total.unwrap_or(0));
//! }))?;
//! # Ok::<(), pdfium_auto::PdfiumAutoError>(())
//! ```
//!
//! `PDFIUM_AUTO_CACHE_DIR` moves the cache root.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use pdfium_render::prelude::Pdfium;
use thiserror::Error;

/// bblanchon/pdfium-binaries release tag (`chromium/<VERSION>`).
pub const PDFIUM_VERSION: &str = "7690";

/// Points at an existing library and disables the download.
pub const LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Replaces the platform cache root.
pub const CACHE_DIR_ENV: &str = "PDFIUM_AUTO_CACHE_DIR";

const RELEASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

/// Cache subdirectory shared by every tool built on this crate.
const CACHE_APP_DIR: &str = "doc2pdf";

/// `(bytes_downloaded, content_length)`.
pub type DownloadProgress<'a> = &'a dyn Fn(u64, Option<u64>);

#[derive(Error, Debug)]
pub enum PdfiumAutoError {
    #[error("No prebuilt PDFium for {os}/{arch}; set PDFIUM_LIB_PATH")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("PDFIUM_LIB_PATH is set to '{0}', which does not exist")]
    MissingOverride(PathBuf),

    #[error("Cannot write PDFium cache at '{path}': {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Downloading PDFium from '{url}' failed: {reason}")]
    Download { url: String, reason: String },

    #[error("Extracting PDFium failed: {0}")]
    Extract(String),

    #[error("Failed to bind PDFium from '{path}': {reason}")]
    Bind { path: PathBuf, reason: String },
}

// ── Platforms ────────────────────────────────────────────────────────────────

/// A prebuilt release archive and the library's path inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: &'static str,
    pub arch: &'static str,
    pub archive: &'static str,
    pub member: &'static str,
}

#[rustfmt::skip]
const PLATFORMS: &[Platform] = &[
    Platform { os: "linux", arch: "x86_64", archive: "pdfium-linux-x64.tgz", member: "lib/libpdfium.so" },
    Platform { os: "linux", arch: "aarch64", archive: "pdfium-linux-arm64.tgz", member: "lib/libpdfium.so" },
    Platform { os: "macos", arch: "x86_64", archive: "pdfium-mac-x64.tgz", member: "lib/libpdfium.dylib" },
    Platform { os: "macos", arch: "aarch64", archive: "pdfium-mac-arm64.tgz", member: "lib/libpdfium.dylib" },
    Platform { os: "windows", arch: "x86_64", archive: "pdfium-win-x64.tgz", member: "bin/pdfium.dll" },
    Platform { os: "windows", arch: "aarch64", archive: "pdfium-win-arm64.tgz", member: "bin/pdfium.dll" },
    Platform { os: "windows", arch: "x86", archive: "pdfium-win-x86.tgz", member: "bin/pdfium.dll" },
];

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Result<Self, PdfiumAutoError> {
        Self::lookup(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn lookup(os: &str, arch: &str) -> Result<Self, PdfiumAutoError> {
        PLATFORMS
            .iter()
            .find(|p| p.os == os && p.arch == arch)
            .copied()
            .ok_or_else(|| PdfiumAutoError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            })
    }

    /// File name of the library on disk, e.g. `libpdfium.so`.
    pub fn lib_name(&self) -> &'static str {
        self.member.rsplit('/').next().unwrap_or(self.member)
    }

    pub fn archive_url(&self) -> String {
        format!("{RELEASE_URL}/chromium%2F{PDFIUM_VERSION}/{}", self.archive)
    }
}

// ── Cache ────────────────────────────────────────────────────────────────────

/// Versioned cache directory, e.g. `~/.cache/doc2pdf/pdfium-7690/` on Linux.
pub fn pdfium_cache_dir() -> PathBuf {
    cache_dir_under(std::env::var_os(CACHE_DIR_ENV))
}

fn cache_dir_under(root_override: Option<OsString>) -> PathBuf {
    let versioned = format!("pdfium-{PDFIUM_VERSION}");
    match root_override {
        Some(root) if !root.is_empty() => PathBuf::from(root).join(versioned),
        _ => dirs::cache_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
            .unwrap_or_else(std::env::temp_dir)
            .join(CACHE_APP_DIR)
            .join(versioned),
    }
}

/// The library path if it can be bound without a download.
pub fn cached_pdfium_path() -> Option<PathBuf> {
    if let Some(path) = RESOLVED.get() {
        return Some(path.clone());
    }
    match override_path(std::env::var_os(LIB_PATH_ENV)) {
        Ok(Some(path)) => return Some(path),
        Ok(None) => {}
        Err(_) => return None,
    }
    let platform = Platform::current().ok()?;
    let path = pdfium_cache_dir().join(platform.lib_name());
    path.exists().then_some(path)
}

pub fn is_pdfium_cached() -> bool {
    cached_pdfium_path().is_some()
}

/// `Ok(None)` when the variable is unset or empty.
fn override_path(value: Option<OsString>) -> Result<Option<PathBuf>, PdfiumAutoError> {
    match value {
        Some(v) if !v.is_empty() => {
            let path = PathBuf::from(v);
            if path.exists() {
                Ok(Some(path))
            } else {
                Err(PdfiumAutoError::MissingOverride(path))
            }
        }
        _ => Ok(None),
    }
}

// ── Public API ───────────────────────────────────────────────────────────────

static RESOLVED: OnceLock<PathBuf> = OnceLock::new();
static DOWNLOAD_LOCK: Mutex<()> = Mutex::new(());

/// Path to a usable PDFium library, downloading it into the cache if needed.
///
/// Blocking. Call it from a plain thread or `spawn_blocking`, never directly
/// on an async executor.
pub fn ensure_pdfium_library(
    on_progress: Option<DownloadProgress<'_>>,
) -> Result<PathBuf, PdfiumAutoError> {
    if let Some(path) = RESOLVED.get() {
        return Ok(path.clone());
    }
    if let Some(path) = override_path(std::env::var_os(LIB_PATH_ENV))? {
        return Ok(RESOLVED.get_or_init(|| path).clone());
    }

    let platform = Platform::current()?;
    let dir = pdfium_cache_dir();
    let lib_path = dir.join(platform.lib_name());

    // A poisoned lock only means another download panicked; the disk check
    // below decides whether to retry.
    let _guard = DOWNLOAD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    if !lib_path.exists() {
        std::fs::create_dir_all(&dir).map_err(|source| PdfiumAutoError::Cache {
            path: dir.clone(),
            source,
        })?;
        let archive = download(&platform.archive_url(), on_progress)?;
        extract_member(&archive, platform.member, &lib_path)?;
    }

    Ok(RESOLVED.get_or_init(|| lib_path).clone())
}

/// Resolve (and if necessary download) the library, then bind to it.
pub fn bind_pdfium(on_progress: Option<DownloadProgress<'_>>) -> Result<Pdfium, PdfiumAutoError> {
    let path = ensure_pdfium_library(on_progress)?;
    bind_pdfium_from_path(&path)
}

pub fn bind_pdfium_silent() -> Result<Pdfium, PdfiumAutoError> {
    bind_pdfium(None)
}

/// Bind to the library at `path`; no lookup, no download.
pub fn bind_pdfium_from_path(path: &Path) -> Result<Pdfium, PdfiumAutoError> {
    Pdfium::bind_to_library(path)
        .map(Pdfium::new)
        .map_err(|e| PdfiumAutoError::Bind {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

// ── Download and extraction ──────────────────────────────────────────────────

/// Reader that reports cumulative bytes after every read.
struct Counting<'a, R> {
    inner: R,
    read: u64,
    total: Option<u64>,
    on_progress: Option<DownloadProgress<'a>>,
}

impl<R: Read> Read for Counting<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read += n as u64;
        if let Some(cb) = self.on_progress {
            cb(self.read, self.total);
        }
        Ok(n)
    }
}

fn download(url: &str, on_progress: Option<DownloadProgress<'_>>) -> Result<Vec<u8>, PdfiumAutoError> {
    let fail = |reason: String| PdfiumAutoError::Download {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pdfium-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| fail(e.to_string()))?;

    let response = client.get(url).send().map_err(|e| fail(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(fail(format!("HTTP {status}")));
    }

    let total = response.content_length();
    let mut reader = Counting {
        inner: response,
        read: 0,
        total,
        on_progress,
    };
    let mut buf = Vec::with_capacity(total.unwrap_or(0) as usize);
    reader
        .read_to_end(&mut buf)
        .map_err(|e| fail(e.to_string()))?;
    Ok(buf)
}

/// Unpack `member` from a `.tgz` to `dest`, via a sibling `.part` file that
/// is renamed into place.
fn extract_member(archive: &[u8], member: &str, dest: &Path) -> Result<(), PdfiumAutoError> {
    let extract = |e: std::io::Error| PdfiumAutoError::Extract(e.to_string());
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(archive));

    for entry in tar.entries().map_err(extract)? {
        let mut entry = entry.map_err(extract)?;
        if entry.path().map_err(extract)?.to_string_lossy() != member {
            continue;
        }
        let part = dest.with_extension("part");
        entry.unpack(&part).map_err(extract)?;
        std::fs::rename(&part, dest).map_err(|source| PdfiumAutoError::Cache {
            path: dest.to_path_buf(),
            source,
        })?;
        return Ok(());
    }

    Err(PdfiumAutoError::Extract(format!(
        "'{member}' not found in archive"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::GzEncoder, Compression};

    fn tgz(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
        for (name, body) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *body).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn known_platforms_resolve() {
        let linux = Platform::lookup("linux", "x86_64").unwrap();
        assert_eq!(linux.lib_name(), "libpdfium.so");
        assert_eq!(
            Platform::lookup("windows", "x86").unwrap().lib_name(),
            "pdfium.dll"
        );
        assert!(linux
            .archive_url()
            .ends_with(&format!("chromium%2F{PDFIUM_VERSION}/pdfium-linux-x64.tgz")));
    }

    #[test]
    fn unknown_platform_is_rejected() {
        assert!(matches!(
            Platform::lookup("plan9", "mips"),
            Err(PdfiumAutoError::UnsupportedPlatform { .. })
        ));
    }

    #[test]
    fn cache_dir_is_versioned() {
        let default = cache_dir_under(None);
        assert!(default.ends_with(format!("{CACHE_APP_DIR}/pdfium-{PDFIUM_VERSION}")));

        let moved = cache_dir_under(Some("/tmp/pdfium-cache".into()));
        assert_eq!(
            moved,
            PathBuf::from("/tmp/pdfium-cache").join(format!("pdfium-{PDFIUM_VERSION}"))
        );
        assert_eq!(cache_dir_under(Some(OsString::new())), default);
    }

    #[test]
    fn override_must_exist() {
        assert!(override_path(None).unwrap().is_none());
        assert!(override_path(Some(OsString::new())).unwrap().is_none());
        assert!(matches!(
            override_path(Some("/definitely/not/libpdfium.so".into())),
            Err(PdfiumAutoError::MissingOverride(_))
        ));

        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(
            override_path(Some(file.path().into())).unwrap(),
            Some(file.path().to_path_buf())
        );
    }

    #[test]
    fn extracts_only_the_named_member() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("libpdfium.so");
        let archive = tgz(&[("include/fpdfview.h", b"header"), ("lib/libpdfium.so", b"ELF")]);

        extract_member(&archive, "lib/libpdfium.so", &dest).unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"ELF");
        assert!(!dest.with_extension("part").exists());
    }

    #[test]
    fn missing_member_is_an_extract_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = tgz(&[("lib/other.so", b"x")]);
        let err = extract_member(&archive, "lib/libpdfium.so", &dir.path().join("x")).unwrap_err();
        assert!(matches!(err, PdfiumAutoError::Extract(_)), "got: {err:?}");
    }
}
