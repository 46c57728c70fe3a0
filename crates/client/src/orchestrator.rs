//! C9: driving one file through its whole lifecycle — spawn, upload, read
//! the page count, receive and re-encode every page, assemble the
//! sanitized PDF, and archive or replace the original.
//!
//! The receive/re-encode stage mirrors the server's own bounded
//! producer/consumer (`qvm_sanitize_server::pipeline`), but mirrored: here
//! the "producer" is a single sequential reader pulling pages off the one
//! shared stdio stream (it cannot run concurrently with itself — there is
//! only one stream), while the CPU-bound re-encode of each page is what
//! gets farmed out, bounded by the same channel-capacity trick.

use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};

use qvm_sanitize_protocol::{PageCount, SanitizeError, framing};

use crate::{
    archive, assembler,
    document::{Document, DocumentStatus},
    page::PageRepresentation,
    prelude::*,
    receiver::receive_page,
    reencoder::reencode_to_png,
    transport::Transport,
};

/// Where a document's archive directory resolves to, if any. `None` means
/// in-place mode: the sanitized output replaces the original directly.
pub struct ArchiveConfig {
    pub archive_dir: Option<PathBuf>,
}

/// Run one document through the full client-side pipeline, mutating its
/// status as it progresses. Returns `Ok(())` on success; on failure the
/// document's status is set to `Failed` and the original file is left
/// untouched.
pub async fn process_document(
    doc: &mut Document,
    transport: &dyn Transport,
    batch_size: usize,
    archive: &ArchiveConfig,
) -> Result<()> {
    doc.status = DocumentStatus::Running;

    let result = process_document_inner(doc, transport, batch_size, archive).await;

    match &result {
        Ok(()) => doc.status = DocumentStatus::Done,
        Err(_) => doc.status = DocumentStatus::Failed,
    }
    result
}

async fn process_document_inner(
    doc: &mut Document,
    transport: &dyn Transport,
    batch_size: usize,
    archive: &ArchiveConfig,
) -> Result<()> {
    let original_bytes = tokio::fs::read(&doc.original_path)
        .await
        .with_context(|| format!("failed to read {}", doc.original_path.display()))?;

    let mut server = transport
        .spawn()
        .await
        .context("failed to spawn disposable-VM server")?;

    {
        let stdin = server
            .stdin
            .as_mut()
            .context("server stdin already closed")?;
        framing::write_document_bytes(stdin, &original_bytes)
            .await
            .context("failed to upload document")?;
    }
    server.close_stdin();

    let pagecount = framing::read_pagecount_line(&mut server.stdout)
        .await
        .context("failed to read page count from server")?;
    doc.pagecount = Some(pagecount);

    let scratch_dir = tempfile::Builder::new()
        .prefix("qvm-sanitize-client-")
        .tempdir()
        .context("failed to create scratch directory")?;

    let pages = receive_and_reencode_pages(
        &mut server.stdout,
        scratch_dir.path(),
        pagecount,
        batch_size,
    )
    .await
    .context("failed to receive sanitized pages from server")?;

    let status = server.wait().await.context("failed to wait on server process")?;
    if !status.success() {
        return Err(anyhow!("disposable-VM server exited with status {status}"));
    }

    let assembled = assembler::assemble_pdf(pages, batch_size)
        .await
        .context("failed to assemble sanitized PDF")?;

    write_trusted_output(&assembled, &doc.trusted_output_path).await?;

    if let Some(archive_dir) = &archive.archive_dir {
        archive::archive_original(&doc.original_path, archive_dir)
            .await
            .context("failed to archive original file")?;
    }

    Ok(())
}

/// Write `data` to a `.partial` sibling of `final_path` and atomically
/// rename it into place, so a crash or I/O error mid-write never leaves a
/// truncated file at `final_path` (and, in `--in-place` mode, never
/// clobbers the original with a half-written replacement). The sibling is
/// on the same filesystem as `final_path`, so the rename is a single atomic
/// syscall rather than a cross-device copy. The temp file is removed on any
/// failure.
async fn write_trusted_output(data: &[u8], final_path: &Path) -> Result<()> {
    let mut temp_name = final_path.as_os_str().to_owned();
    temp_name.push(".partial");
    let temp_path = PathBuf::from(temp_name);

    if let Err(err) = tokio::fs::write(&temp_path, data).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(err).with_context(|| format!("failed to write {}", temp_path.display()));
    }

    if let Err(err) = tokio::fs::rename(&temp_path, final_path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(err).with_context(|| {
            format!(
                "failed to move sanitized output into place at {}",
                final_path.display()
            )
        });
    }

    Ok(())
}

async fn receive_and_reencode_pages<R>(
    reader: &mut R,
    scratch_dir: &Path,
    pagecount: PageCount,
    concurrency_limit: usize,
) -> Result<Vec<PageRepresentation>, SanitizeError>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let (tx, mut rx) = mpsc::channel::<JoinHandle<Result<PageRepresentation, SanitizeError>>>(
        concurrency_limit.max(1),
    );

    let scratch_dir = Arc::new(scratch_dir.to_owned());

    // This runs inline (not spawned) because `reader` cannot be shared
    // across tasks; it blocks on `tx.send` exactly when `concurrency_limit`
    // re-encodes are already in flight, which is the backpressure we want.
    let produce = async move {
        for page_number in pagecount.page_indices() {
            let received = receive_page(reader, &scratch_dir, page_number).await?;
            let scratch_dir = scratch_dir.clone();
            let handle = tokio::spawn(async move {
                let png_path = scratch_dir.join(format!("{page_number}.png"));
                reencode_to_png(&received.rgb_path, received.dimensions, &png_path).await?;
                let _ = tokio::fs::remove_file(&received.rgb_path).await;
                Ok(PageRepresentation {
                    page_number,
                    dimensions: received.dimensions,
                    png_path,
                })
            });
            if tx.send(handle).await.is_err() {
                break;
            }
        }
        Ok::<(), SanitizeError>(())
    };

    let consume = async move {
        let mut pages = Vec::new();
        for _ in pagecount.page_indices() {
            let handle = rx.recv().await.ok_or_else(|| {
                SanitizeError::ConversionFailed(
                    "page producer ended before all pages arrived".to_owned(),
                )
            })?;
            let page = handle
                .await
                .map_err(|err| SanitizeError::ConversionFailed(format!("re-encode task panicked: {err}")))??;
            pages.push(page);
        }
        Ok::<Vec<PageRepresentation>, SanitizeError>(pages)
    };

    let (produce_result, consume_result) = tokio::join!(produce, consume);
    produce_result?;
    consume_result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_trusted_output_atomically_replaces_final_path() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("a.trusted.pdf");
        tokio::fs::write(&final_path, b"stale").await.unwrap();

        write_trusted_output(b"fresh", &final_path).await.unwrap();

        assert_eq!(tokio::fs::read(&final_path).await.unwrap(), b"fresh");
        let temp_path = {
            let mut name = final_path.as_os_str().to_owned();
            name.push(".partial");
            PathBuf::from(name)
        };
        assert!(!temp_path.exists());
    }

    #[tokio::test]
    async fn write_trusted_output_leaves_no_partial_file_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A final path under a directory that doesn't exist makes the write
        // to the sibling `.partial` file fail outright.
        let final_path = dir.path().join("missing-subdir").join("a.trusted.pdf");

        let result = write_trusted_output(b"fresh", &final_path).await;
        assert!(result.is_err());

        let temp_path = {
            let mut name = final_path.as_os_str().to_owned();
            name.push(".partial");
            PathBuf::from(name)
        };
        assert!(!temp_path.exists());
    }
}
