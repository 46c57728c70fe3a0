//! The disposable-VM half of the sanitizer. Reads one document from stdin,
//! rasterizes every page, and streams raw pixels to the client on stdout.
//!
//! This process is assumed compromised the moment it touches the uploaded
//! document, so it has no business being clever: it must emit exactly the
//! protocol bytes on stdout (diagnostics go to stderr), and it must never
//! retry or partially recover from a failed page — any subprocess failure
//! is fatal for the whole document.

mod cpu_limit;
mod mime;
mod pixelize;
mod pipeline;
mod process_utils;
mod rasterize;

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

use qvm_sanitize_protocol::framing;

use pipeline::DocumentPageRenderer;

/// Queue depth for the render pipeline. The server has no `--batch` flag of
/// its own (it isn't interactive); it mirrors the client's own default.
const DEFAULT_CONCURRENCY_LIMIT: usize = 50;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::builder().with_default_directive(tracing::Level::INFO.into()).from_env_lossy()),
        )
        .init();

    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    use anyhow::Context as _;

    let mut stdin = tokio::io::stdin();
    let data = framing::read_document_to_end(&mut stdin)
        .await
        .context("failed to read document from stdin")?;

    let scratch_dir = tempfile::Builder::new()
        .prefix("qvm-sanitize-server-")
        .tempdir()
        .context("failed to create scratch directory")?;

    let doc_path = scratch_dir.path().join("original");
    tokio::fs::write(&doc_path, &data)
        .await
        .context("failed to write scratch copy of document")?;

    let kind = mime::detect_kind(&doc_path).context("failed to detect document type")?;
    let pagecount = rasterize::page_count(&doc_path, kind)
        .await
        .context("failed to determine page count")?;

    let mut stdout = tokio::io::stdout();
    framing::write_pagecount_line(&mut stdout, pagecount)
        .await
        .context("failed to send page count")?;

    let renderer = Arc::new(DocumentPageRenderer {
        doc_path,
        scratch_dir: scratch_dir.path().to_owned(),
        kind,
    });

    pipeline::run_pipeline(renderer, pagecount, DEFAULT_CONCURRENCY_LIMIT, &mut stdout)
        .await
        .context("page rendering pipeline failed")?;

    Ok(())
}
