//! Sniffing the uploaded document's type.
//!
//! We never trust a claimed file extension (there is none here — the
//! scratch file is always named `original`), only the magic bytes.

use std::path::Path;

use qvm_sanitize_protocol::SanitizeError;

/// What kind of document did the client upload?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// A PDF document; rasterize page by page with `pdftocairo`.
    Pdf,
    /// A raster image (PNG/JPEG); treat as a single already-rasterized
    /// page, skipping `pdftocairo` entirely.
    Image,
}

/// Detect the kind of document at `path`, or fail with [`SanitizeError::PageError`]
/// if it's neither a PDF nor a supported image — there is nothing to
/// sanitize a video/audio/office file into without the out-of-core
/// LibreOffice ingestion path.
pub fn detect_kind(path: &Path) -> Result<DocumentKind, SanitizeError> {
    let kind = infer::get_from_path(path)
        .map_err(|err| SanitizeError::PageError(format!("failed to read document: {err}")))?
        .ok_or_else(|| SanitizeError::PageError("could not determine document type".to_owned()))?;

    match kind.mime_type() {
        "application/pdf" => Ok(DocumentKind::Pdf),
        "image/png" | "image/jpeg" => Ok(DocumentKind::Image),
        other => Err(SanitizeError::PageError(format!(
            "unsupported document type {other}"
        ))),
    }
}
