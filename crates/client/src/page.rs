//! A single rendered page, on its way from raw pixels to an assembled PDF.

use qvm_sanitize_protocol::Dimensions;

use crate::prelude::*;

/// A page that has been received from the server and re-encoded to PNG,
/// ready for a PDF assembler to embed.
#[derive(Debug, Clone)]
pub struct PageRepresentation {
    /// 1-based page number, matching the order the server streamed pages in.
    pub page_number: u32,
    pub dimensions: Dimensions,
    /// Path to the re-encoded PNG on disk (scratch directory).
    pub png_path: PathBuf,
}
