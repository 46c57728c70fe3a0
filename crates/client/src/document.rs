//! The per-file data model tracked by the orchestrator.

use qvm_sanitize_protocol::PageCount;

use crate::prelude::*;

/// Where a single input file is in its conversion lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    /// Queued, not yet handed to a worker.
    Pending,
    /// A disposable VM has been spawned and the pipeline is running.
    Running,
    /// Sanitized output was written successfully.
    Done,
    /// The conversion failed; `original_path` is untouched.
    Failed,
    /// Cancelled by a shutdown signal before completion.
    Cancelled,
}

/// One input file tracked end to end: upload, page count, per-page
/// rendering, and the sanitized PDF written back out.
#[derive(Debug, Clone)]
pub struct Document {
    /// The untrusted file as given on the command line.
    pub original_path: PathBuf,
    /// Where the sanitized PDF will be written once assembly finishes.
    pub trusted_output_path: PathBuf,
    /// Filled in once the server reports its page count line.
    pub pagecount: Option<PageCount>,
    pub status: DocumentStatus,
}

impl Document {
    /// Derive a `Document` from a path the user asked to sanitize.
    ///
    /// `archive_dir` is `None` for in-place mode (output replaces the
    /// original at the same path once the original has been archived) and
    /// `Some` for archive mode (sanitized output sits next to the original,
    /// suffixed, while the plain original moves into the archive).
    pub fn new(original_path: PathBuf, in_place: bool) -> Self {
        let trusted_output_path = if in_place {
            original_path.clone()
        } else {
            with_trusted_suffix(&original_path)
        };
        Document {
            original_path,
            trusted_output_path,
            pagecount: None,
            status: DocumentStatus::Pending,
        }
    }
}

/// Build `foo.pdf` -> `foo.trusted.pdf` for non-in-place mode.
fn with_trusted_suffix(path: &Path) -> PathBuf {
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let mut new_name = format!("{stem}.trusted");
    if let Some(ext) = path.extension() {
        new_name.push('.');
        new_name.push_str(&ext.to_string_lossy());
    } else {
        new_name.push_str(".pdf");
    }
    path.with_file_name(new_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_place_output_matches_input() {
        let doc = Document::new(PathBuf::from("/tmp/a.pdf"), true);
        assert_eq!(doc.trusted_output_path, PathBuf::from("/tmp/a.pdf"));
    }

    #[test]
    fn archive_mode_suffixes_output() {
        let doc = Document::new(PathBuf::from("/tmp/a.pdf"), false);
        assert_eq!(doc.trusted_output_path, PathBuf::from("/tmp/a.trusted.pdf"));
    }

    #[test]
    fn new_document_starts_pending_with_no_pagecount() {
        let doc = Document::new(PathBuf::from("/tmp/a.pdf"), false);
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert!(doc.pagecount.is_none());
    }
}
