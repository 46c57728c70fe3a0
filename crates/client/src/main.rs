//! The trusted half of the sanitizer. Ships each file on the command line
//! to a disposable VM, receives sanitized pixels back, and writes the
//! reassembled PDF.

use std::sync::Arc;

use clap::Parser as _;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

use self::{cli::Opts, prelude::*, transport::QrexecTransport, ui::Ui};

mod archive;
mod assembler;
mod async_utils;
mod cli;
mod cpu_limit;
mod document;
mod orchestrator;
mod page;
mod prelude;
mod receiver;
mod reencoder;
mod supervisor;
mod transport;
mod ui;

#[tokio::main]
async fn main() {
    let ui = Ui::init();

    let env_filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();
    let subscriber = tracing_subscriber::fmt::layer()
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);
    tracing_subscriber::registry().with(subscriber).init();

    if let Err(err) = real_main(ui).await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn real_main(ui: Ui) -> Result<()> {
    dotenvy::dotenv().ok();

    let opts = Opts::parse();
    debug!("parsed options: {opts:?}");

    if !opts.using_interactive_output() {
        ui.hide_progress_bars();
    }

    let transport: Arc<dyn transport::Transport> = Arc::new(QrexecTransport::from_env());
    supervisor::run(&opts, &ui, transport).await
}
