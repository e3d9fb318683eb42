//! AstroGlue desktop app.
//!
//! Usage:
//!     astroglue
//!     astroglue --config session.json
//!     astroglue --config session.json --export master.parquet --headless

mod app;
mod color;
mod state;
mod ui;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use eframe::egui;

use astroglue::clustering::DensityLink;
use astroglue::config::SessionFile;
use astroglue::data::loader;
use astroglue::pipeline::{Session, ViewRequest};

use app::AstroGlueApp;
use state::AppState;

/// Cluster galaxy data per feature space and explore the clusters in linked views
#[derive(Parser)]
#[command(name = "astroglue")]
#[command(version)]
#[command(about, long_about = None)]
struct Cli {
    /// Session file (JSON) to run instead of opening the setup form
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the master table to this Parquet file after the run
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Run the session, log a summary and exit without opening a window
    #[arg(long, requires = "config")]
    headless: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let state = match &cli.config {
        Some(path) => {
            let session = run_session_file(path)?;
            if let Some(out) = &cli.export {
                loader::save_parquet(&session.master, out)
                    .with_context(|| format!("Failed to export master table to {}", out.display()))?;
                log::info!("Wrote master table to {}", out.display());
            }
            if cli.headless {
                log_summary(&session);
                return Ok(());
            }
            AppState::with_session(session)
        }
        None => AppState::default(),
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([700.0, 450.0]),
        ..Default::default()
    };

    eframe::run_native(
        "AstroGlue",
        options,
        Box::new(|_cc| Ok(Box::new(AstroGlueApp::new(state)))),
    )
    .map_err(|e| anyhow!("{e}"))
}

fn run_session_file(path: &Path) -> Result<Session> {
    let config = SessionFile::read(path)?.into_config()?;
    let session = Session::run(config, &DensityLink)
        .with_context(|| format!("Session from {} failed", path.display()))?;
    Ok(session)
}

fn log_summary(session: &Session) {
    log::info!("Master table: {}", session.master);
    for (space, result) in &session.results {
        log::info!(
            "{space}: {} samples, {} clusters ({})",
            result.n_samples,
            result.clusters.len(),
            result.ids.join(", ")
        );
    }
    for view in &session.views {
        match view {
            ViewRequest::OrderedDensity { .. } => log::info!("View: {}", view.title()),
            ViewRequest::Plot(spec) => log::info!("View: {} over {:?}", spec.kind, spec.axes),
        }
    }
}
