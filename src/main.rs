use anyhow::{Context, Result};
use std::path::Path;
use std::process::ExitCode;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod converter;
mod models;
mod playlist;
mod scanner;
mod services;

use config::AppConfig;
use services::tmdb::TmdbClient;

const DEFAULT_FILTER: &str = "m3u2strm=info";

/// Console logging, plus the log file when one is given.
/// The returned guard flushes the file writer on drop.
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| DEFAULT_FILTER.into())
    };

    let Some(log_file) = log_file else {
        tracing_subscriber::registry()
            .with(filter())
            .with(tracing_subscriber::fmt::layer())
            .init();
        return Ok(None);
    };

    let dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log_file
        .file_name()
        .with_context(|| format!("Invalid log file path {}", log_file.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    tracing_subscriber::registry()
        .with(filter())
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            // Logging has no file yet; report on the console only
            let _ = init_tracing(None);
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let _guard = match init_tracing(Some(&config.log_file)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    config.log_config();

    let genre_lookup = match (&config.tmdb_api_key, config.lookup_genres) {
        (Some(key), true) => Some(TmdbClient::new(key.clone())),
        _ => None,
    };

    match converter::run(&config, genre_lookup).await {
        Ok(report) => {
            if report.failed > 0 {
                tracing::warn!("{} entries could not be written", report.failed);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Conversion failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
