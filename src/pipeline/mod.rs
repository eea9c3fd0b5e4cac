//! Pipeline stages for document download and assembly.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the network stage can be swapped for a fake.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ extract ──▶ fetch (per link) ──▶ assemble
//! (HTML)    (rewrite +    (binary, one         (image → PDF page)
//!            match)        fallback retry)
//! ```
//!
//! 1. [`fetch`]: one HTTP GET, text or binary body plus status; the only
//!    stage with network I/O
//! 2. [`extract`]: single-pass rewrite of the landing-page markup, then
//!    ordered link matching
//! 3. [`assemble`]: decode every image, then write one page per image via
//!    pdfium; runs in `spawn_blocking`
//!
//! The per-link loop and the extension fallback live in [`crate::download`].

pub mod assemble;
pub mod extract;
pub mod fetch;
