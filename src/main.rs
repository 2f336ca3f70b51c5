// Radiosonde Downloader v0.1
use clap::Parser;
use tracing_subscriber::util::SubscriberInitExt;

mod cli;
mod config;
mod errors;
mod logging;
mod models;
mod services;

use cli::Cli;
use config::LoggingConfig;
use errors::AppError;

/// Requests are issued one at a time, so a single-threaded runtime is enough.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Config comes first since it names the log sinks
    let config = cli::load_config(&cli);
    let logging_config = match &config {
        Ok(config) => config.download.logging.clone(),
        Err(_) => LoggingConfig::default(),
    };

    let log_file = logging_config.log_file.as_deref().and_then(|path| {
        match logging::open_log_file(path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Cannot open log file {}: {}", path.display(), e);
                None
            }
        }
    });

    // Initialize tracing
    logging::subscriber(logging::env_filter(), cli.log_json, &logging_config, log_file).init();

    let result = match config {
        Ok(config) => cli::run(cli, config).await,
        Err(e) => Err(AppError::from(e)),
    };
    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
