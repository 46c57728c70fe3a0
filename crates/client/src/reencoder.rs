//! C7: re-encoding the raw RGB pixels we received back into PNG, so the
//! assembler can hand the `image` crate something it already knows how to
//! decode.
//!
//! We go through GraphicsMagick rather than encoding the PNG ourselves in
//! process: the server already trusts `gm` to do the PNG<->raw conversion,
//! and keeping that round trip symmetric means a corrupt or adversarial
//! pixel buffer is caught by the same tool on both ends.

use tokio::process::Command;

use qvm_sanitize_protocol::{Dimensions, SanitizeError};

use crate::{async_utils::check_for_command_failure, cpu_limit::with_cpu_semaphore, prelude::*};

/// Convert `rgb_path` (raw interleaved 8-bit RGB, `dimensions` wide/tall)
/// into a PNG at `png_path`.
pub async fn reencode_to_png(
    rgb_path: &Path,
    dimensions: Dimensions,
    png_path: &Path,
) -> Result<(), SanitizeError> {
    let geometry = format!("{}x{}", dimensions.width, dimensions.height);
    let rgb_arg = format!("rgb:{}", rgb_path.display());

    with_cpu_semaphore(|| async {
        let status = Command::new("gm")
            .arg("convert")
            .arg("-size")
            .arg(&geometry)
            .arg("-depth")
            .arg(dimensions.depth().to_string())
            .arg(&rgb_arg)
            .arg(png_path)
            .status()
            .await
            .map_err(|err| SanitizeError::ConversionFailed(format!("failed to run gm: {err}")))?;
        check_for_command_failure("gm convert (rgb -> png)", status)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_string_matches_dimensions() {
        let dim = Dimensions::validate(800, 600).unwrap();
        assert_eq!(format!("{}x{}", dim.width, dim.height), "800x600");
    }
}
