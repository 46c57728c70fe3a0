//! C5: the server pipeline. A bounded producer/consumer that rasterizes and
//! pixelizes every page of a document, in page order, while streaming
//! finished pages to the client as soon as they're ready.
//!
//! The producer spawns one rendering task per page (bounded indirectly by
//! [`crate::cpu_limit`], which caps concurrent external processes) and hands
//! each task's [`tokio::task::JoinHandle`] to the consumer over a bounded
//! channel. Because the channel itself is bounded to `concurrency_limit`,
//! trying to enqueue page *n+limit* blocks until the consumer has taken page
//! *n* — this is the queue-with-ownership-transfer pattern, generalized from
//! a single work item to a whole page stream.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use tokio::{io::AsyncWrite, sync::mpsc, task::JoinHandle};
use tracing::{debug, instrument};

use qvm_sanitize_protocol::{Dimensions, PageCount, SanitizeError, framing};

use crate::{
    mime::DocumentKind,
    pixelize::{RenderedPage, convert_png_to_rgb, identify_dimensions},
    rasterize::rasterize_page,
};

/// Abstraction over "render page N to raw RGB," so the bounded
/// producer/consumer logic in [`run_pipeline`] can be tested without
/// shelling out to `pdftocairo`/`gm`.
#[async_trait]
pub trait PageRenderer: Send + Sync + 'static {
    async fn render(&self, page: u32) -> Result<RenderedPage, SanitizeError>;
}

/// The real renderer: rasterize with `pdftocairo` (or pass through an
/// already-rasterized image), measure with `gm identify`, convert with `gm
/// convert`.
pub struct DocumentPageRenderer {
    pub doc_path: PathBuf,
    pub scratch_dir: PathBuf,
    pub kind: DocumentKind,
}

#[async_trait]
impl PageRenderer for DocumentPageRenderer {
    #[instrument(level = "debug", skip(self), fields(page))]
    async fn render(&self, page: u32) -> Result<RenderedPage, SanitizeError> {
        let png_path = rasterize_page(&self.doc_path, &self.scratch_dir, self.kind, page).await?;
        let (w, h) = identify_dimensions(&png_path).await?;
        let dimensions = Dimensions::validate(i64::from(w), i64::from(h))?;

        let rgb_path = self.scratch_dir.join(format!("{page}.rgb"));
        convert_png_to_rgb(&png_path, &rgb_path).await?;

        // Only unlink the intermediate PNG if we created it ourselves; for
        // plain-image passthrough, `png_path` is the client's own upload.
        if self.kind == DocumentKind::Pdf {
            let _ = tokio::fs::remove_file(&png_path).await;
        }

        Ok(RenderedPage { dimensions, rgb_path })
    }
}

/// Run the bounded producer/consumer over every page of `pagecount`,
/// writing `"<w> <h>\n"` plus raw RGB bytes for each page, in order, to
/// `writer`.
///
/// On any failure, outstanding render tasks are aborted, their scratch
/// files are best-effort deleted, and the error is returned. The caller is
/// responsible for tearing down the scratch directory as a whole afterward.
#[instrument(level = "debug", skip_all, fields(pagecount = %pagecount))]
pub async fn run_pipeline<R, W>(
    renderer: Arc<R>,
    pagecount: PageCount,
    concurrency_limit: usize,
    writer: &mut W,
) -> Result<(), SanitizeError>
where
    R: PageRenderer,
    W: AsyncWrite + Unpin + Send,
{
    let (tx, mut rx) = mpsc::channel::<JoinHandle<Result<RenderedPage, SanitizeError>>>(
        concurrency_limit.max(1),
    );

    let producer_renderer = renderer.clone();
    let producer = tokio::spawn(async move {
        for page in pagecount.page_indices() {
            let renderer = producer_renderer.clone();
            let handle = tokio::spawn(async move { renderer.render(page).await });
            if tx.send(handle).await.is_err() {
                // Consumer gave up (an earlier page failed); stop producing.
                break;
            }
        }
    });

    let consume_result = consume(&mut rx, pagecount, writer).await;

    if consume_result.is_err() {
        producer.abort();
        rx.close();
        while let Some(handle) = rx.recv().await {
            handle.abort();
        }
    } else if let Err(err) = producer.await {
        if !err.is_cancelled() {
            return Err(SanitizeError::ConversionFailed(format!(
                "producer task panicked: {err}"
            )));
        }
    }

    consume_result
}

async fn consume<W>(
    rx: &mut mpsc::Receiver<JoinHandle<Result<RenderedPage, SanitizeError>>>,
    pagecount: PageCount,
    writer: &mut W,
) -> Result<(), SanitizeError>
where
    W: AsyncWrite + Unpin + Send,
{
    for _ in pagecount.page_indices() {
        let handle = rx.recv().await.ok_or_else(|| {
            SanitizeError::ConversionFailed("producer ended before all pages were rendered".to_owned())
        })?;
        let rendered = handle
            .await
            .map_err(|err| SanitizeError::ConversionFailed(format!("render task panicked: {err}")))??;

        framing::write_dim_line(writer, rendered.dimensions).await?;
        let bytes = tokio::fs::read(&rendered.rgb_path)
            .await
            .map_err(|err| SanitizeError::ConversionFailed(format!("failed to read rendered page: {err}")))?;
        framing::write_page_bytes(writer, &bytes).await?;
        let _ = tokio::fs::remove_file(&rendered.rgb_path).await;
        debug!("sent page");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeRenderer {
        fail_on: Option<u32>,
        max_concurrent_seen: AtomicU32,
        concurrent: AtomicU32,
    }

    #[async_trait]
    impl PageRenderer for FakeRenderer {
        async fn render(&self, page: u32) -> Result<RenderedPage, SanitizeError> {
            let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            self.concurrent.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on == Some(page) {
                return Err(SanitizeError::ConversionFailed("boom".to_owned()));
            }

            let dir = std::env::temp_dir();
            let rgb_path = dir.join(format!("pipeline-test-{page}-{:p}.rgb", self));
            tokio::fs::write(&rgb_path, vec![page as u8; 3]).await.unwrap();
            Ok(RenderedPage {
                dimensions: Dimensions::validate(1, 1).unwrap(),
                rgb_path,
            })
        }
    }

    #[tokio::test]
    async fn emits_pages_in_order() {
        let renderer = Arc::new(FakeRenderer {
            fail_on: None,
            max_concurrent_seen: AtomicU32::new(0),
            concurrent: AtomicU32::new(0),
        });
        let pagecount = PageCount::validate(5).unwrap();
        let mut out = Vec::new();
        run_pipeline(renderer, pagecount, 2, &mut out).await.unwrap();

        // Each page is "1 1\n" + 3 bytes equal to the page number.
        let mut cursor = &out[..];
        for page in 1..=5u8 {
            assert!(cursor.starts_with(b"1 1\n"));
            cursor = &cursor[4..];
            assert_eq!(&cursor[..3], &[page, page, page]);
            cursor = &cursor[3..];
        }
        assert!(cursor.is_empty());
    }

    #[tokio::test]
    async fn stops_cleanly_on_mid_stream_failure() {
        let renderer = Arc::new(FakeRenderer {
            fail_on: Some(3),
            max_concurrent_seen: AtomicU32::new(0),
            concurrent: AtomicU32::new(0),
        });
        let pagecount = PageCount::validate(10).unwrap();
        let mut out = Vec::new();
        let result = run_pipeline(renderer, pagecount, 4, &mut out).await;
        assert!(result.is_err());
    }
}
