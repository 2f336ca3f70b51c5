use std::path::PathBuf;

use chrono::NaiveDateTime;

/// Errors loading the TOML configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from querying the sounding archive.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Cannot build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Errors loading the station list.
#[derive(Debug, thiserror::Error)]
pub enum StationListError {
    #[error("IO error on station list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Station list download failed: {0}")]
    Download(#[from] FetchError),
}

/// Errors writing one sounding to disk.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Output directory {0} does not exist")]
    OutputDirMissing(PathBuf),

    #[error("Cannot create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot create temporary file in {dir}: {source}")]
    Staging {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot move finished file to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Sounding from station {0} has no launch time")]
    MissingLaunchTime(i32),

    #[error("Sounding from station {0} has no levels")]
    NoLevels(i32),

    #[error("Dimension '{dim}' of variable '{variable}' is not declared")]
    UnknownDimension { variable: String, dim: String },

    #[error("Variable '{variable}' expects {expected} values, record has {actual}")]
    ShapeMismatch {
        variable: String,
        expected: usize,
        actual: usize,
    },

    #[error("netCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),
}

/// Top-level error surfaced by the command line.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    StationList(#[from] StationListError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}
