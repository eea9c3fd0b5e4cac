//! Document assembly: ordered image buffers → one PDF, one image per page.
//!
//! ## Why decode before touching pdfium?
//!
//! Every buffer is decoded with the `image` crate first. A page that turns
//! out to be an HTML error body or a truncated download fails the run with
//! [`Doc2PdfError::Encoding`] before the PDF engine is even bound, so no
//! output file is created for a document that cannot be built.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is CPU-bound and not
//! async-aware. The write runs on tokio's blocking pool.
//!
//! Each page is sized to its image at 1 px = 1 pt; no scaling, rotation or
//! recompression policy is applied beyond pdfium's defaults. The document is
//! serialised in memory, written to a temp file beside the destination and
//! renamed over it.

use crate::error::Doc2PdfError;
use image::{DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage};
use pdfium_render::prelude::*;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Placeholder size when no fetched page gives a reference: A4 at 150 DPI.
pub const PLACEHOLDER_SIZE: (u32, u32) = (1240, 1754);

/// Assemble `pages` into a PDF at `output`, returning the page count written.
///
/// # Errors
/// - [`Doc2PdfError::EmptyDocument`] for an empty sequence (nothing is written)
/// - [`Doc2PdfError::Encoding`] for the first buffer that is not a PNG/JPEG
/// - [`Doc2PdfError::PdfiumBindingFailed`] / [`Doc2PdfError::PdfWriteFailed`]
///   / [`Doc2PdfError::OutputWriteFailed`] from the write itself
pub async fn assemble(pages: Vec<Vec<u8>>, output: &Path) -> Result<usize, Doc2PdfError> {
    if pages.is_empty() {
        return Err(Doc2PdfError::EmptyDocument);
    }

    let images = decode_pages(&pages)?;
    drop(pages);

    let path = output.to_path_buf();
    tokio::task::spawn_blocking(move || write_pdf_blocking(&images, &path))
        .await
        .map_err(|e| Doc2PdfError::Internal(format!("Assemble task panicked: {}", e)))?
}

/// Decode every buffer, in order. Page numbers in errors are 1-indexed.
pub fn decode_pages(pages: &[Vec<u8>]) -> Result<Vec<DynamicImage>, Doc2PdfError> {
    pages
        .iter()
        .enumerate()
        .map(|(idx, bytes)| {
            image::load_from_memory(bytes).map_err(|e| Doc2PdfError::Encoding {
                page: idx + 1,
                detail: e.to_string(),
            })
        })
        .collect()
}

/// Pixel dimensions read from the image header, without a full decode.
pub fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// A blank white page, PNG-encoded, standing in for an image that could not
/// be fetched.
pub fn placeholder_page(width: u32, height: u32) -> Result<Vec<u8>, Doc2PdfError> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
        width.max(1),
        height.max(1),
        Rgb([255, 255, 255]),
    ));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| Doc2PdfError::Internal(format!("placeholder encoding failed: {e}")))?;
    Ok(buf)
}

/// Bind to the pdfium shared library.
///
/// `PDFIUM_LIB_PATH` wins; otherwise the cached copy is used, downloading it
/// on first use. Blocking: may perform that download.
pub fn bind_pdfium() -> Result<Pdfium, Doc2PdfError> {
    pdfium_auto::bind_pdfium_silent()
        .map_err(|e| Doc2PdfError::PdfiumBindingFailed(e.to_string()))
}

/// Open a PDF and count its pages. Blocking, like [`bind_pdfium`].
pub fn count_pages(path: &Path) -> Result<usize, Doc2PdfError> {
    let pdfium = bind_pdfium()?;
    let document =
        pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| Doc2PdfError::PdfWriteFailed {
                path: path.to_path_buf(),
                detail: format!("cannot reopen: {:?}", e),
            })?;
    Ok(document.pages().len() as usize)
}

/// Blocking implementation of the PDF write.
fn write_pdf_blocking(images: &[DynamicImage], output: &Path) -> Result<usize, Doc2PdfError> {
    let pdfium = bind_pdfium()?;
    let pdf_err = |detail: String| Doc2PdfError::PdfWriteFailed {
        path: output.to_path_buf(),
        detail,
    };

    let mut document = pdfium
        .create_new_pdf()
        .map_err(|e| pdf_err(format!("{:?}", e)))?;

    for (idx, image) in images.iter().enumerate() {
        let width = PdfPoints::new(image.width() as f32);
        let height = PdfPoints::new(image.height() as f32);

        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::from_points(width, height))
            .map_err(|e| pdf_err(format!("page {}: {:?}", idx + 1, e)))?;

        let object = PdfPageImageObject::new_with_size(&document, image, width, height)
            .map_err(|e| pdf_err(format!("page {}: {:?}", idx + 1, e)))?;

        page.objects_mut()
            .add_image_object(object)
            .map_err(|e| pdf_err(format!("page {}: {:?}", idx + 1, e)))?;

        debug!(
            "Added page {} ({}x{} px)",
            idx + 1,
            image.width(),
            image.height()
        );
    }

    let bytes = document
        .save_to_bytes()
        .map_err(|e| pdf_err(format!("{:?}", e)))?;

    write_atomic(output, &bytes)?;
    info!(
        "Wrote {} pages ({} bytes) to {}",
        images.len(),
        bytes.len(),
        output.display()
    );
    Ok(images.len())
}

/// Write to a temp file in the destination directory, then rename over
/// `output`, replacing any existing file.
fn write_atomic(output: &Path, bytes: &[u8]) -> Result<(), Doc2PdfError> {
    let write_err = |source: std::io::Error| Doc2PdfError::OutputWriteFailed {
        path: output.to_path_buf(),
        source,
    };

    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(write_err)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".doc2pdf-")
        .suffix(".pdf.tmp")
        .tempfile_in(&parent)
        .map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(output).map_err(|e| write_err(e.error))?;
    Ok(())
}
