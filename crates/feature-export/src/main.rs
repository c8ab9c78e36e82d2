//! Feature Export - command line front end
//!
//! Reads a project from a directory-backed store and writes the export into an
//! output directory.

mod settings;
mod storage;

use feature_export_lib::{ExportOutcome, Exporter};
use settings::Settings;
use std::process::ExitCode;
use storage::{DirectorySink, DirectoryStore};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_cli();
    tracing::info!(
        "{} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            tracing::error!("Failed to start the async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    let exporter = Exporter::new(
        DirectoryStore::new(&settings.store_dir),
        DirectorySink::new(&settings.output_dir),
        settings.config(),
    );

    let outcome = rt.block_on(exporter.export_project(
        &settings.project,
        &settings.format,
        settings.name.as_deref(),
    ));

    match outcome {
        ExportOutcome::Failed(_) => ExitCode::FAILURE,
        ExportOutcome::Delivered(_) | ExportOutcome::Empty | ExportOutcome::UnsupportedFormat(_) => {
            ExitCode::SUCCESS
        }
    }
}
