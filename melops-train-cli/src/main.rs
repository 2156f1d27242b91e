//! Mel-train CLI - curriculum-ordered speech model training

use clap::Parser;
use eyre::{Context, Result};
use melops_train::trainer::StopSignal;
use melops_train_cli::cli::{Cli, run};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    color_eyre::install()?;

    let (non_blocking, _guard) = tracing_appender::non_blocking(std::io::stderr());

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let stop = StopSignal::new();
    let handler = stop.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("interrupt received, stopping after the current batch");
        handler.request();
    })
    .wrap_err("failed to install interrupt handler")?;

    run(Cli::parse(), stop)
}
