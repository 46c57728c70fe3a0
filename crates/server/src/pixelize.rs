//! C4: the pixelizer. Converts a PNG to a raw interleaved RGB byte buffer
//! and reports its dimensions, via GraphicsMagick's `gm identify`/`gm
//! convert`.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::instrument;

use qvm_sanitize_protocol::{Dimensions, SanitizeError, constants::DEPTH};

use crate::{cpu_limit::with_cpu_semaphore, process_utils::check_for_command_failure};

/// Identify the pixel dimensions of a PNG file.
///
/// Untrusted documents can legitimately rasterize to pages much larger than
/// `MAX_IMG_WIDTH`/`MAX_IMG_HEIGHT` (the client enforces that bound, not the
/// server), so no bound is applied here — this just reports what
/// GraphicsMagick measured.
#[instrument(level = "debug", skip_all)]
pub async fn identify_dimensions(png_path: &Path) -> Result<(u32, u32), SanitizeError> {
    let output = with_cpu_semaphore(|| async {
        Command::new("gm")
            .arg("identify")
            .arg("-format")
            .arg("%w %h")
            .arg(png_path)
            .output()
            .await
            .map_err(|err| {
                SanitizeError::ConversionFailed(format!("failed to run gm identify: {err}"))
            })
    })
    .await?;
    check_for_command_failure("gm identify", output.status)?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout.lines().next().unwrap_or_default();
    let mut parts = first_line.split_whitespace();
    let w: u32 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| SanitizeError::ConversionFailed(format!("bad identify output: {first_line:?}")))?;
    let h: u32 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| SanitizeError::ConversionFailed(format!("bad identify output: {first_line:?}")))?;
    Ok((w, h))
}

/// Convert a PNG to a raw interleaved RGB file at `rgb_path`, 8 bits/channel,
/// no alpha.
#[instrument(level = "debug", skip_all)]
pub async fn convert_png_to_rgb(png_path: &Path, rgb_path: &Path) -> Result<(), SanitizeError> {
    let rgb_arg = format!("rgb:{}", rgb_path.display());
    let status = with_cpu_semaphore(|| async {
        Command::new("gm")
            .arg("convert")
            .arg(png_path)
            .arg("-depth")
            .arg(DEPTH.to_string())
            .arg(&rgb_arg)
            .status()
            .await
            .map_err(|err| {
                SanitizeError::ConversionFailed(format!("failed to run gm convert: {err}"))
            })
    })
    .await?;
    check_for_command_failure("gm convert", status)
}

/// The result of fully rendering one page: its dimensions and the path to
/// its raw RGB scratch file.
#[derive(Debug)]
pub struct RenderedPage {
    pub dimensions: Dimensions,
    pub rgb_path: PathBuf,
}
