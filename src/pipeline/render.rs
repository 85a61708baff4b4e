//! Figure rasterisation: turn a PDF figure into PNG bytes via pdfium.
//!
//! ## Why a trait?
//!
//! Papers frequently ship their diagrams as single-page PDFs. Vision APIs and
//! e-mail clients only take raster images, so those must be rendered. pdfium
//! is a native library that may simply be missing on the host; the
//! [`Rasterizer`] trait lets the image resolver treat that as one more
//! recoverable failure, and lets tests swap in a fake.
//!
//! ## Why cap pixels, not DPI?
//!
//! Figure PDFs have arbitrary page boxes: a cropped diagram may be 3 × 2 in,
//! a poster-style teaser 40 × 20 in. `max_rendered_pixels` caps the longest
//! edge regardless of physical size.

use crate::error::ArchiveError;
use image::{DynamicImage, ImageFormat};
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Format of an archive entry, sniffed from magic bytes then extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SourceFormat {
    Pdf,
    Png,
    Jpeg,
    /// Any other raster format the `image` crate recognises.
    OtherRaster,
    /// EPS, SVG, unknown bytes.
    Unknown,
}

impl SourceFormat {
    /// Detect the format of `bytes` stored under `name`.
    pub fn detect(name: &str, bytes: &[u8]) -> Self {
        if bytes.starts_with(b"%PDF") {
            return SourceFormat::Pdf;
        }
        match image::guess_format(bytes) {
            Ok(ImageFormat::Png) => return SourceFormat::Png,
            Ok(ImageFormat::Jpeg) => return SourceFormat::Jpeg,
            Ok(_) => return SourceFormat::OtherRaster,
            Err(_) => {}
        }
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            SourceFormat::Pdf
        } else if lower.ends_with(".png") {
            SourceFormat::Png
        } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
            SourceFormat::Jpeg
        } else {
            SourceFormat::Unknown
        }
    }

    /// MIME type to announce to a vision API.
    pub fn mime_type(self) -> &'static str {
        match self {
            SourceFormat::Pdf => "application/pdf",
            SourceFormat::Png => "image/png",
            SourceFormat::Jpeg => "image/jpeg",
            SourceFormat::OtherRaster | SourceFormat::Unknown => "application/octet-stream",
        }
    }
}

/// Converts a PDF document to PNG bytes.
pub trait Rasterizer: Send + Sync {
    fn rasterize_pdf(&self, pdf: &[u8]) -> Result<Vec<u8>, ArchiveError>;
}

/// Normalise `bytes` to PNG or JPEG.
///
/// PDFs go through the rasterizer, other raster formats are re-encoded as
/// PNG, PNG and JPEG pass through. Anything else cannot be shown.
pub fn to_raster(
    bytes: &[u8],
    from_format: SourceFormat,
    rasterizer: &dyn Rasterizer,
) -> Result<Vec<u8>, ArchiveError> {
    match from_format {
        SourceFormat::Pdf => rasterizer.rasterize_pdf(bytes),
        SourceFormat::Png | SourceFormat::Jpeg => Ok(bytes.to_vec()),
        SourceFormat::OtherRaster => {
            let img = image::load_from_memory(bytes).map_err(|e| {
                ArchiveError::ConversionUnavailable {
                    detail: format!("cannot decode image: {e}"),
                }
            })?;
            encode_png(&img)
        }
        SourceFormat::Unknown => Err(ArchiveError::ConversionUnavailable {
            detail: "not a raster image or PDF".to_string(),
        }),
    }
}

/// [`Rasterizer`] backed by the pdfium shared library.
///
/// Binds on every call: the library is loaded from `library_path` when set,
/// otherwise from the system search path.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    library_path: Option<PathBuf>,
    max_pixels: u32,
}

impl PdfiumRasterizer {
    pub fn new(library_path: Option<PathBuf>, max_pixels: u32) -> Self {
        Self {
            library_path,
            max_pixels,
        }
    }

    fn bind(&self) -> Result<Pdfium, ArchiveError> {
        let bindings = match self.library_path.as_deref() {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| ArchiveError::ConversionUnavailable {
            detail: format!(
                "cannot bind pdfium ({}): {e:?}",
                self.library_path
                    .as_deref()
                    .map(Path::display)
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "system library".into())
            ),
        })?;
        Ok(Pdfium::new(bindings))
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize_pdf(&self, pdf: &[u8]) -> Result<Vec<u8>, ArchiveError> {
        let pdfium = self.bind()?;

        let document = pdfium.load_pdf_from_byte_slice(pdf, None).map_err(|e| {
            ArchiveError::ConversionUnavailable {
                detail: format!("cannot load PDF: {e:?}"),
            }
        })?;

        let page = document
            .pages()
            .get(0)
            .map_err(|e| ArchiveError::ConversionUnavailable {
                detail: format!("PDF has no first page: {e:?}"),
            })?;

        let render_config = PdfRenderConfig::new()
            .set_target_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            ArchiveError::ConversionUnavailable {
                detail: format!("render failed: {e:?}"),
            }
        })?;

        let image = bitmap.as_image();
        debug!("Rendered PDF figure → {}x{} px", image.width(), image.height());
        encode_png(&image)
    }
}

/// PNG-encode a decoded image.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, ArchiveError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| ArchiveError::ConversionUnavailable {
            detail: format!("PNG encoding failed: {e}"),
        })?;
    Ok(buf)
}
