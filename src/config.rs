//! Application configuration.
//!
//! Settings live in two TOML files inside a config directory:
//! `download_config.toml` (service URLs, output naming, provenance) and
//! `radiosonde_metadata.toml` (the output schema). The directory comes from
//! `RADIOSONDE_CONFIG_DIR`, falling back to `./config`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::level_filters::LevelFilter;

use crate::errors::ConfigError;

pub const DOWNLOAD_CONFIG_FILE: &str = "download_config.toml";
pub const METADATA_CONFIG_FILE: &str = "radiosonde_metadata.toml";

/// Application configuration, parsed from the config directory.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub download: DownloadConfig,
    pub metadata: MetadataConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadConfig {
    /// Output file name template with `{sitenum}` and `{date}` placeholders.
    pub nc_file_naming: String,
    pub radiosonde: RadiosondeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RadiosondeConfig {
    /// Base URL of the sounding query endpoint.
    pub url: String,
    pub url_station_list: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub netcdf_format: NetcdfFormat,
    pub processor_name: String,
    pub processor_version: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_region() -> String {
    "naconf".to_string()
}

fn default_user_agent() -> String {
    format!("radiosonde-downloader/{}", env!("CARGO_PKG_VERSION"))
}

/// Log sinks: stdout always, plus a plain-text file when `log_file` is set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    pub log_file: Option<PathBuf>,
    #[serde(default = "default_file_level")]
    pub file_level: LogLevel,
    #[serde(default = "default_stdout_level")]
    pub stdout_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            file_level: default_file_level(),
            stdout_level: default_stdout_level(),
        }
    }
}

fn default_file_level() -> LogLevel {
    LogLevel::Debug
}

fn default_stdout_level() -> LogLevel {
    LogLevel::Info
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Error,
    #[serde(alias = "WARN")]
    Warning,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Flavor of the netCDF container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum NetcdfFormat {
    #[default]
    #[serde(rename = "NETCDF4")]
    Netcdf4,
    #[serde(rename = "NETCDF4_CLASSIC")]
    Netcdf4Classic,
    #[serde(rename = "NETCDF3_64BIT_OFFSET")]
    Netcdf3Offset64,
    #[serde(rename = "NETCDF3_CLASSIC")]
    Netcdf3Classic,
}

impl NetcdfFormat {
    /// Whether the flavor is HDF5 based and supports deflate.
    pub fn is_netcdf4(self) -> bool {
        matches!(self, NetcdfFormat::Netcdf4 | NetcdfFormat::Netcdf4Classic)
    }

    pub fn options(self) -> netcdf::Options {
        match self {
            NetcdfFormat::Netcdf4 => netcdf::Options::NETCDF4,
            NetcdfFormat::Netcdf4Classic => netcdf::Options::NETCDF4 | netcdf::Options::CLASSIC,
            NetcdfFormat::Netcdf3Offset64 => netcdf::Options::_64BIT_OFFSET,
            NetcdfFormat::Netcdf3Classic => netcdf::Options::empty(),
        }
    }
}

/// Output schema: dimensions and one entry per variable.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataConfig {
    pub dimensions: BTreeMap<String, DimensionSize>,
    pub variables: BTreeMap<String, VariableSpec>,
}

/// Either a fixed size or the literal `"levels"` (number of levels in the sounding).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DimensionSize {
    Fixed(usize),
    Named(DimensionKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionKind {
    Levels,
}

impl DimensionSize {
    pub fn resolve(&self, level_count: usize) -> usize {
        match self {
            DimensionSize::Fixed(n) => *n,
            DimensionSize::Named(DimensionKind::Levels) => level_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Byte,
    Int,
    Float,
    Double,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariableSpec {
    pub dtype: DataType,
    pub dims: Vec<String>,
    #[serde(rename = "_FillValue")]
    pub fill_value: Option<f64>,
    /// Record field the values come from; defaults to the variable name.
    pub source: Option<String>,
    /// Everything else is written verbatim as a variable attribute.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, toml::Value>,
}

impl VariableSpec {
    pub fn source<'a>(&'a self, variable: &'a str) -> &'a str {
        self.source.as_deref().unwrap_or(variable)
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let dir = std::env::var("RADIOSONDE_CONFIG_DIR").unwrap_or_else(|_| "./config".to_string());
        Self::load(Path::new(&dir))
    }

    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let download: DownloadConfig = read_toml(&dir.join(DOWNLOAD_CONFIG_FILE))?;
        let metadata: MetadataConfig = read_toml(&dir.join(METADATA_CONFIG_FILE))?;
        let config = Self { download, metadata };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.download.nc_file_naming.contains("{date}") {
            return Err(ConfigError::InvalidValue {
                key: "nc_file_naming".to_string(),
                message: "template must contain {date}".to_string(),
            });
        }
        for (name, spec) in &self.metadata.variables {
            for dim in &spec.dims {
                if !self.metadata.dimensions.contains_key(dim) {
                    return Err(ConfigError::InvalidValue {
                        key: format!("variables.{}.dims", name),
                        message: format!("undeclared dimension '{}'", dim),
                    });
                }
            }
        }
        Ok(())
    }
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_toml(&text, path)
}

fn parse_toml<T: serde::de::DeserializeOwned>(text: &str, path: &Path) -> Result<T, ConfigError> {
    toml::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Build the config shipped in `config/` without touching the filesystem.
#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    let download = parse_toml(
        include_str!("../config/download_config.toml"),
        Path::new(DOWNLOAD_CONFIG_FILE),
    )
    .unwrap();
    let metadata = parse_toml(
        include_str!("../config/radiosonde_metadata.toml"),
        Path::new(METADATA_CONFIG_FILE),
    )
    .unwrap();
    AppConfig { download, metadata }
}
