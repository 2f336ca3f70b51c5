//! Tracing setup: a stdout sink and an optional log file, each with its own level.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing::Subscriber;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Every target of this crate; the sinks decide the level.
pub const DEFAULT_FILTER: &str = "radiosonde_downloader";

/// `RUST_LOG` when set, otherwise [`DEFAULT_FILTER`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
}

/// Open the log file for appending, creating its directory first.
pub fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

pub fn subscriber(
    filter: EnvFilter,
    log_json: bool,
    logging: &LoggingConfig,
    log_file: Option<File>,
) -> impl Subscriber + Send + Sync + 'static {
    let stdout = if log_json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };

    let file = log_file.map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .with_filter(logging.file_level.filter())
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout.with_filter(logging.stdout_level.filter()))
        .with(file)
}
