//! Image resolution: map a figure's declared `\includegraphics` reference to
//! an archive entry and normalise it to a raster image.
//!
//! Authors omit extensions, change case, and move files around between the
//! LaTeX source and the bundle. Candidate names are tried in this order:
//!
//! | Tier | Candidates |
//! |------|------------|
//! | declared | the reference as written (trimmed, without `./`) |
//! | extension | reference without its extension + `""`, `.png`, `.pdf`, `.jpg`, `.jpeg`, upper-case variants |
//! | basename | the same with directories stripped |
//! | fuzzy | every entry whose name contains the basename stem, case-insensitively |
//!
//! The first candidate present in the archive that is a raster image or a PDF
//! wins. Other matches (`.tex`, `.eps`, `.svg`) are skipped; if nothing else
//! matched, the first of them is reported as a failed conversion.

use crate::error::ArtifactError;
use crate::pipeline::archive::ArchiveReader;
use crate::pipeline::figure::FigureCandidate;
use crate::pipeline::render::{to_raster, Rasterizer, SourceFormat};
use std::path::Path;
use tracing::debug;

const EXTENSION_VARIANTS: &[&str] = &[
    "", ".png", ".pdf", ".jpg", ".jpeg", ".PNG", ".PDF", ".JPG", ".JPEG",
];

/// Raster bytes of a resolved figure.
#[derive(Debug, Clone)]
pub struct ImageArtifact {
    pub bytes: Vec<u8>,
    /// Archive entry that was actually read.
    pub source_entry: String,
    /// Format of the entry before conversion.
    pub format: SourceFormat,
    /// `true` when the bytes were rasterised from a PDF or re-encoded as PNG.
    pub converted: bool,
}

impl ImageArtifact {
    /// MIME type of `bytes`.
    pub fn mime_type(&self) -> &'static str {
        if self.converted {
            SourceFormat::Png.mime_type()
        } else {
            self.format.mime_type()
        }
    }
}

/// Resolve the image of `figure` inside `archive`.
pub fn resolve_image(
    figure: &FigureCandidate,
    archive: &ArchiveReader,
    rasterizer: &dyn Rasterizer,
) -> Result<ImageArtifact, ArtifactError> {
    let reference = figure
        .image_reference
        .as_deref()
        .ok_or(ArtifactError::NoImageReference {
            figure: figure.index,
        })?;

    let candidates = candidate_names(reference, archive.entries());
    let mut skipped: Option<String> = None;
    let mut found = None;
    for name in &candidates {
        let Ok(bytes) = archive.read_entry(name) else {
            continue;
        };
        let format = SourceFormat::detect(name, bytes);
        if format == SourceFormat::Unknown {
            debug!("Skipping '{name}' for '{reference}': not a raster image or PDF");
            skipped.get_or_insert_with(|| name.clone());
            continue;
        }
        found = Some((name.clone(), bytes, format));
        break;
    }

    let Some((entry, bytes, format)) = found else {
        return Err(match skipped {
            Some(entry) => ArtifactError::ConversionFailed {
                entry,
                detail: "not a raster image or PDF".to_string(),
            },
            None => ArtifactError::ImageNotFound {
                reference: reference.to_string(),
                tried: candidates.len(),
            },
        });
    };
    debug!("Image reference '{reference}' resolved to '{entry}'");

    let raster = to_raster(bytes, format, rasterizer).map_err(|e| {
        ArtifactError::ConversionFailed {
            entry: entry.clone(),
            detail: e.to_string(),
        }
    })?;

    Ok(ImageArtifact {
        bytes: raster,
        source_entry: entry,
        format,
        converted: matches!(format, SourceFormat::Pdf | SourceFormat::OtherRaster),
    })
}

/// Ordered, de-duplicated entry names to try for `reference`.
pub fn candidate_names(reference: &str, entries: &[String]) -> Vec<String> {
    let declared = normalize_reference(reference);
    let stem = strip_extension(declared);
    let base = Path::new(stem)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(stem);

    let mut out: Vec<String> = Vec::new();
    let mut push = |name: String| {
        if !name.is_empty() && !out.contains(&name) {
            out.push(name);
        }
    };

    push(declared.to_string());
    for ext in EXTENSION_VARIANTS {
        push(format!("{stem}{ext}"));
    }
    // `fig/model.v2` may be a stem with a dot rather than a file extension.
    if stem != declared && !has_image_extension(declared) {
        for ext in EXTENSION_VARIANTS {
            push(format!("{declared}{ext}"));
        }
    }
    for ext in EXTENSION_VARIANTS {
        push(format!("{base}{ext}"));
    }

    let needle = base.to_lowercase();
    if !needle.is_empty() {
        for entry in entries {
            if entry.to_lowercase().contains(&needle) {
                push(entry.clone());
            }
        }
    }
    out
}

fn normalize_reference(reference: &str) -> &str {
    let trimmed = reference.trim();
    trimmed.strip_prefix("./").unwrap_or(trimmed)
}

/// Drop the extension of the last path component, whatever it is.
fn strip_extension(name: &str) -> &str {
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some(ext) => name
            .strip_suffix(ext)
            .and_then(|s| s.strip_suffix('.'))
            .unwrap_or(name),
        None => name,
    }
}

fn has_image_extension(name: &str) -> bool {
    EXTENSION_VARIANTS
        .iter()
        .any(|ext| !ext.is_empty() && name.ends_with(ext))
}
