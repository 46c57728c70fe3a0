//! C3: the rasterizer. Converts page *n* of a document to a PNG at native
//! resolution, using the Poppler CLI tools (`pdfinfo`, `pdftocairo`).

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::instrument;

use qvm_sanitize_protocol::{PageCount, SanitizeError};

use crate::{cpu_limit::with_cpu_semaphore, mime::DocumentKind, process_utils::check_for_command_failure};

/// Determine the page count of `doc_path`.
///
/// For a PDF, this shells out to `pdfinfo` and parses the `Pages: <n>` line.
/// For a plain image, the page count is always 1 — there is nothing to
/// separate.
#[instrument(level = "debug", skip_all)]
pub async fn page_count(doc_path: &Path, kind: DocumentKind) -> Result<PageCount, SanitizeError> {
    match kind {
        DocumentKind::Image => PageCount::validate(1),
        DocumentKind::Pdf => {
            let output = with_cpu_semaphore(|| async {
                Command::new("pdfinfo")
                    .arg(doc_path)
                    .output()
                    .await
                    .map_err(|err| {
                        SanitizeError::ConversionFailed(format!("failed to run pdfinfo: {err}"))
                    })
            })
            .await?;
            check_for_command_failure("pdfinfo", output.status)?;

            let stdout = String::from_utf8_lossy(&output.stdout);
            let pages = stdout
                .lines()
                .find_map(|line| line.strip_prefix("Pages:"))
                .map(str::trim)
                .ok_or_else(|| {
                    SanitizeError::PageError("pdfinfo output had no Pages: line".to_owned())
                })?;
            let untrusted: i64 = pages
                .parse()
                .map_err(|_| SanitizeError::PageError(format!("non-integer page count: {pages:?}")))?;
            PageCount::validate(untrusted)
        }
    }
}

/// Rasterize page `page` (1-based) of `doc_path` to a PNG file inside
/// `scratch_dir`, returning the PNG's path.
///
/// For an already-rasterized image document, this just returns `doc_path`
/// itself — there is no `pdftocairo` step to run.
#[instrument(level = "debug", skip(doc_path, scratch_dir))]
pub async fn rasterize_page(
    doc_path: &Path,
    scratch_dir: &Path,
    kind: DocumentKind,
    page: u32,
) -> Result<PathBuf, SanitizeError> {
    match kind {
        DocumentKind::Image => Ok(doc_path.to_owned()),
        DocumentKind::Pdf => {
            let out_prefix = scratch_dir.join(page.to_string());
            let page_str = page.to_string();
            let status = with_cpu_semaphore(|| async {
                Command::new("pdftocairo")
                    .arg("-png")
                    .arg("-f")
                    .arg(&page_str)
                    .arg("-l")
                    .arg(&page_str)
                    .arg("-singlefile")
                    .arg(doc_path)
                    .arg(&out_prefix)
                    .status()
                    .await
                    .map_err(|err| {
                        SanitizeError::ConversionFailed(format!("failed to run pdftocairo: {err}"))
                    })
            })
            .await?;
            check_for_command_failure("pdftocairo", status)?;
            Ok(out_prefix.with_extension("png"))
        }
    }
}
