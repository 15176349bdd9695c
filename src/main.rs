use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod csv_io;
mod domain;
mod inputter;
mod model;
mod persist;
mod store;
mod ui;
mod view;

use controller::Controller;
use domain::{EditorConfig, TedError};
use model::{Model, Status};

#[derive(Parser)]
#[command(version, about = "A tui based tabular data editor.")]
struct Args {
    /// CSV file to import at startup (replaces the restored rows)
    file: Option<String>,

    /// Snapshot location (default: ~/.ted/state.json)
    #[arg(long)]
    state_file: Option<String>,

    /// Start from seed data, ignoring any persisted snapshot
    #[arg(long)]
    fresh: bool,

    /// Write logs to this file; the TED_LOG env var controls the filter
    #[arg(long)]
    log_file: Option<String>,
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

fn run() -> Result<(), TedError> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;
    info!("Starting ted!");

    let cfg = EditorConfig::default().event_poll_time(100);
    let state_path = match &args.state_file {
        Some(path) => PathBuf::from(shellexpand::tilde(path).into_owned()),
        None => persist::default_state_path(),
    };

    let mut model = Model::init(&cfg, state_path);
    let controller = Controller::new(&cfg);

    let mut terminal = ratatui::init();

    // One frame of loading indicator while the snapshot is rehydrated.
    terminal.draw(|frame| ui::draw(model.uidata(), frame))?;
    model.restore(args.fresh);
    if let Some(file) = &args.file {
        model.start_import(file);
    }

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|frame| ui::draw(model.uidata(), frame))?;

        // Deliver a finished import, if any
        model.tick();

        // Handle events and map to a Message
        if let Some(message) = controller.handle_event(&model)? {
            model.update(message)?;
        }
    }

    Ok(())
}

fn init_logging(log_file: Option<&str>) -> Result<(), TedError> {
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = File::create(shellexpand::tilde(path).into_owned())?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("TED_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}
