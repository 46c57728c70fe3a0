//! Command-line arguments.

use std::io::IsTerminal as _;

use clap::Parser;

use crate::prelude::*;

/// Convert untrusted PDFs and images to sanitized PDFs by rendering them
/// page-by-page in a disposable VM.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
Environment Variables:
  - QVM_SANITIZE_RPC_CMD (optional): Override the disposable-VM spawn
    command. Defaults to `qrexec-client-vm @dispvm qubes.PdfConvert`.

  These variables may be set in a standard `.env` file.
"#
)]
pub struct Opts {
    /// Files to sanitize.
    #[clap(required = true)]
    pub files: Vec<PathBuf>,

    /// Number of pages to hold in flight per file, between receiving raw
    /// pixels from the server and appending them to the assembled PDF. Also
    /// the number of pages folded into the growing PDF per blocking append.
    /// Lower this to bound peak memory use on very large documents; raise it
    /// to reduce the number of blocking handoffs.
    #[clap(short = 'b', long, default_value = "50")]
    pub batch: usize,

    /// Move originals into this directory once sanitized output has been
    /// written, instead of leaving them in place next to a `.trusted`
    /// sibling. Defaults to `~/QubesUntrustedPDFs`.
    #[clap(short = 'a', long = "archive")]
    pub archive_dir: Option<PathBuf>,

    /// Overwrite each original file with its sanitized replacement, instead
    /// of writing a `.trusted` sibling and archiving the original.
    #[clap(short = 'i', long = "in-place", conflicts_with = "archive_dir")]
    pub in_place: bool,

    /// Max number of files to convert concurrently.
    #[clap(short = 'j', long = "jobs", default_value = "4")]
    pub job_count: usize,
}

impl Opts {
    /// Are we using stderr for anything interactive? Used to decide whether
    /// to show progress bars. Every file given always gets its failures
    /// isolated from its siblings, regardless of this setting — it only
    /// controls progress-bar display.
    pub fn using_interactive_output(&self) -> bool {
        std::io::stderr().is_terminal()
    }

    /// Resolve the archive directory to use, applying the default when
    /// neither `--archive` nor `--in-place` was given.
    pub fn resolved_archive_dir(&self) -> Option<PathBuf> {
        if self.in_place {
            return None;
        }
        match &self.archive_dir {
            Some(dir) => Some(dir.clone()),
            None => dirs_home().map(|home| home.join("QubesUntrustedPDFs")),
        }
    }
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}
