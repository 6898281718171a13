mod app;
mod cli;
mod eyetracker;
mod keys;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = cli::Args::parse();
    let run = match args.resolve() {
        Ok(run) => run,
        Err(cli::ArgsError::UnknownTask(task)) => {
            error!(task, "unknown task, nothing to run");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    info!(
        platform = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        subject = %run.output_str,
        task = %run.task,
        eyetracker = run.eyetracker,
        "bistable perception"
    );

    app::App::new(run)?.run()
}
