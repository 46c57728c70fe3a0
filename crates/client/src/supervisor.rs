//! Fanning out across every file given on the command line, isolating
//! failures between them, and handling Ctrl-C.
//!
//! Runs N independent per-file state machines concurrently (bounded by
//! `--jobs`) and lets a Ctrl-C cancel whatever hasn't finished yet without
//! corrupting files already written.

use std::sync::Arc;

use futures::{StreamExt as _, stream};

use crate::{
    cli::Opts,
    document::{Document, DocumentStatus},
    orchestrator::{self, ArchiveConfig},
    prelude::*,
    transport::Transport,
    ui::{ProgressConfig, Ui},
};

/// Run every file in `opts.files` to completion (or failure), respecting
/// `--jobs` concurrency and Ctrl-C.
///
/// Every file's failure is isolated from its siblings unconditionally: one
/// file failing never stops or cancels the others. Returns `Ok(())` if every
/// file succeeded, otherwise `Err` naming how many failed, so the caller can
/// set a non-zero exit code.
pub async fn run(opts: &Opts, ui: &Ui, transport: Arc<dyn Transport>) -> Result<()> {
    let archive = ArchiveConfig {
        archive_dir: opts.resolved_archive_dir(),
    };

    let pb = ui.new_progress_bar(
        &ProgressConfig {
            emoji: "📄",
            msg: "Sanitizing files",
            done_msg: "Sanitized files",
        },
        opts.files.len() as u64,
    );

    let job_count = opts.job_count.max(1);
    let batch_size = opts.batch.max(1);

    let results: Vec<Result<()>> = stream::iter(opts.files.iter().cloned())
        .map(move |path| {
            let transport = transport.clone();
            let archive_dir = archive.archive_dir.clone();
            let pb = pb.clone();
            async move {
                let mut doc = Document::new(path.clone(), opts.in_place);
                let archive = ArchiveConfig { archive_dir };

                let outcome = tokio::select! {
                    result = orchestrator::process_document(&mut doc, transport.as_ref(), batch_size, &archive) => result,
                    _ = tokio::signal::ctrl_c() => {
                        doc.status = DocumentStatus::Cancelled;
                        Err(anyhow!("cancelled by signal"))
                    }
                };

                pb.inc(1);
                if let Err(err) = &outcome {
                    error!("failed to sanitize {}: {err:#}", path.display());
                }
                outcome
            }
        })
        .buffer_unordered(job_count)
        .collect()
        .await;

    pb.finish();

    let failures = results.iter().filter(|r| r.is_err()).count();
    if failures == 0 {
        Ok(())
    } else {
        Err(anyhow!(
            "{failures}/{} file(s) failed to sanitize",
            results.len()
        ))
    }
}
