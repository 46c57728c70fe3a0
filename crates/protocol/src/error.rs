//! The sanitizer's error taxonomy.
//!
//! A single tagged enum covering every failure mode, matched once at the
//! per-file dispatch point in the orchestrator rather than scattered across
//! an exception hierarchy.

use thiserror::Error;

/// Every way a single file's sanitization can fail.
///
/// Recovery happens at the per-file boundary only (see the orchestrator):
/// there is no retry and no partial recovery within a file's pipeline.
#[derive(Debug, Error)]
pub enum SanitizeError {
    /// The transport child exited non-zero, or its stdout/stdin closed
    /// unexpectedly.
    #[error("transport broken: {0}")]
    TransportBroken(String),

    /// EOF mid-message, a malformed dim line, or any other framing decode
    /// failure.
    #[error("receive error: {0}")]
    ReceiveError(String),

    /// Width/height outside `[1, MAX]`, or a non-8 depth.
    #[error("invalid image dimensions: {0}")]
    DimensionError(String),

    /// Page count outside `[1, MAX_PAGES]`, or not an integer.
    #[error("invalid page count: {0}")]
    PageError(String),

    /// An external tool (`pdftocairo`, `identify`, `convert`, `pdfinfo`, ...)
    /// exited non-zero.
    #[error("conversion failed: {0}")]
    ConversionFailed(String),

    /// The PDF assembly step failed to write the trusted output.
    #[error("assembly failed: {0}")]
    AssemblyFailed(String),

    /// The job was cancelled, either by the user (SIGINT) or because a
    /// sibling file's failure triggered cooperative shutdown of this one.
    #[error("cancelled")]
    Cancelled,
}

impl SanitizeError {
    /// A short, stable name for this error kind, used in user-facing
    /// `error: <name>: <cause>` lines.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SanitizeError::TransportBroken(_) => "TransportBroken",
            SanitizeError::ReceiveError(_) => "ReceiveError",
            SanitizeError::DimensionError(_) => "DimensionError",
            SanitizeError::PageError(_) => "PageError",
            SanitizeError::ConversionFailed(_) => "ConversionFailed",
            SanitizeError::AssemblyFailed(_) => "AssemblyFailed",
            SanitizeError::Cancelled => "Cancelled",
        }
    }

    /// Was this a user/sibling-triggered cancellation, as opposed to a
    /// genuine failure?
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SanitizeError::Cancelled)
    }
}
