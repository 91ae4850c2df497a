mod app;
mod cli;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use quartet_engine::{OutputPaths, SessionConfig};
use std::fs::File;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

fn main() -> Result<()> {
    let args = cli::Args::parse();

    let mut config = SessionConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if args.debug {
        config = config.debug();
    }
    let monitor = config.monitor(&args.monitor)?.clone();

    let date = chrono::Local::now().format("%Y-%m-%d_%Hh%M.%S").to_string();
    let paths = OutputPaths::new(
        &args.output_dir,
        &args.participant,
        &config.session.experiment_name,
        &date,
    );
    paths.create_dirs()?;
    init_logging(&paths)?;

    info!(
        participant = %args.participant,
        subject_id = args.subject_id,
        monitor = %args.monitor,
        debug = args.debug,
        experiment = %config.session.experiment_name,
        "session starting"
    );

    let font = match &args.font {
        Some(path) => Some(quartet_render::load_font(path)?),
        None => None,
    };

    let app = App::new(config, monitor, paths, font);
    app.run()
}

/// Console gets warnings; the session log file gets everything from INFO up.
fn init_logging(paths: &OutputPaths) -> Result<()> {
    let log_path = paths.log_file();
    let file = File::create(&log_path)
        .with_context(|| format!("creating log file {}", log_path.display()))?;

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(LevelFilter::WARN);
    let logfile = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(file))
        .with_filter(LevelFilter::INFO);

    tracing_subscriber::registry()
        .with(console)
        .with(logfile)
        .try_init()
        .context("installing tracing subscriber")?;
    Ok(())
}
