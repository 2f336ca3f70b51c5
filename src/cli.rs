//! Command line surface.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};

use crate::config::AppConfig;
use crate::errors::{AppError, ArchiveError, ConfigError, StationListError};
use crate::services::archive::{SoundingArchiver, WriteOutcome};
use crate::services::fetcher::SoundingFetcher;
use crate::services::stations::{format_station_row, station_table_header, StationDirectory, StationSource};
use crate::services::uwyo::{DateRange, UwyoClient};

/// Wuhan
pub const DEFAULT_STATION: i32 = 57494;

#[derive(Debug, Parser)]
#[command(
    name = "radiosonde-downloader",
    version,
    about = "Download radiosonde soundings from the University of Wyoming archive into netCDF files"
)]
pub struct Cli {
    /// Directory holding download_config.toml and radiosonde_metadata.toml
    /// [default: $RADIOSONDE_CONFIG_DIR or ./config]
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download every sounding in [start, stop) and write one netCDF file each
    Fetch(FetchArgs),
    /// Print the station directory
    ListStations(StationListArg),
    /// Look up the name of one station number
    FindStation {
        station: i32,
        #[command(flatten)]
        list: StationListArg,
    },
    /// Download the station list and save it for later runs
    DownloadStationList { path: PathBuf },
}

#[derive(Debug, Args)]
pub struct StationListArg {
    /// Previously downloaded station list; downloaded when omitted
    #[arg(long)]
    pub station_list: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// First day, YYYYMMDD
    #[arg(long, value_parser = parse_day)]
    pub start: NaiveDateTime,

    /// Day after the last one, YYYYMMDD
    #[arg(long, value_parser = parse_day)]
    pub stop: NaiveDateTime,

    /// WMO station number
    #[arg(long, default_value_t = DEFAULT_STATION)]
    pub station: i32,

    #[arg(long)]
    pub output_dir: PathBuf,

    /// Replace files that already exist
    #[arg(long)]
    pub overwrite: bool,

    /// Create a missing output directory without asking
    #[arg(long)]
    pub yes: bool,

    #[command(flatten)]
    pub list: StationListArg,
}

fn parse_day(s: &str) -> Result<NaiveDateTime, String> {
    NaiveDate::parse_from_str(s, "%Y%m%d")
        .map_err(|e| format!("expected YYYYMMDD: {}", e))?
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| format!("invalid day '{}'", s))
}

/// `--config-dir` when given, otherwise the environment default.
pub fn load_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    match &cli.config_dir {
        Some(dir) => AppConfig::load(dir),
        None => AppConfig::from_env(),
    }
}

pub async fn run(cli: Cli, config: AppConfig) -> Result<(), AppError> {
    let client = UwyoClient::new(&config.download.radiosonde)?;

    match cli.command {
        Command::Fetch(args) => {
            let archiver = if args.yes {
                SoundingArchiver::new(&config).confirm_with(|_| true)
            } else {
                SoundingArchiver::new(&config).confirm_with(ask_create_dir)
            };
            fetch(&config, &client, &args, &archiver).await
        }
        Command::ListStations(list) => {
            let stations = load_stations(&config, &client, &list).await?;
            println!("{}", station_table_header());
            for record in stations.records() {
                println!("{}", format_station_row(record));
            }
            Ok(())
        }
        Command::FindStation { station, list } => {
            let stations = load_stations(&config, &client, &list).await?;
            match stations.find(station) {
                Some(record) => println!("{}", format_station_row(record)),
                None => println!("No station with number {}", station),
            }
            Ok(())
        }
        Command::DownloadStationList { path } => {
            let url = &config.download.radiosonde.url_station_list;
            let stations = StationDirectory::download(&client, url, Some(&path)).await?;
            println!("Saved {} stations to {}", stations.len(), path.display());
            Ok(())
        }
    }
}

async fn load_stations(
    config: &AppConfig,
    client: &UwyoClient,
    list: &StationListArg,
) -> Result<StationDirectory, StationListError> {
    let source = match &list.station_list {
        Some(path) => StationSource::File(path.clone()),
        None => StationSource::Remote {
            url: config.download.radiosonde.url_station_list.clone(),
            save_to: None,
        },
    };
    StationDirectory::load(client, &source).await
}

async fn fetch(
    config: &AppConfig,
    client: &UwyoClient,
    args: &FetchArgs,
    archiver: &SoundingArchiver<'_>,
) -> Result<(), AppError> {
    let range = DateRange::new(args.start, args.stop)?;
    archiver.ensure_output_dir(&args.output_dir)?;

    // Station names are optional on the record, so a missing list only costs names
    let stations = match load_stations(config, client, &args.list).await {
        Ok(stations) => stations,
        Err(e) => {
            tracing::warn!("Station list unavailable, continuing without names: {}", e);
            StationDirectory::empty()
        }
    };

    if stations.is_empty() {
        tracing::warn!("Station directory is empty, files will carry no station name");
    }

    let report = SoundingFetcher::new(client, &stations)
        .fetch(range, args.station)
        .await;
    let failed_days = report.failures().count();
    tracing::info!(
        "Fetched {} soundings over {} days",
        report.sounding_count(),
        report.days().len()
    );

    let (mut written, mut skipped, mut failed) = (0usize, 0usize, 0usize);
    for record in report.into_soundings() {
        let span = tracing::info_span!(
            "station",
            number = record.station_number(),
            launch = ?record.launch_time()
        );
        let _guard = span.enter();

        match archiver.write(record, &args.output_dir, args.overwrite) {
            Ok(WriteOutcome::Written(_)) => written += 1,
            Ok(WriteOutcome::Skipped(_)) => skipped += 1,
            Err(e @ ArchiveError::OutputDirMissing(_)) => return Err(e.into()),
            Err(e) => {
                tracing::error!("Sounding not written: {}", e);
                failed += 1;
            }
        }
    }

    tracing::info!(
        "Done: {} written, {} skipped, {} failed, {} days failed to download",
        written,
        skipped,
        failed,
        failed_days
    );
    Ok(())
}

fn ask_create_dir(dir: &Path) -> bool {
    print!("Output directory {} does not exist. Create it? [y/N] ", dir.display());
    if std::io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => is_yes(&answer),
        Err(e) => {
            tracing::warn!("Cannot read confirmation: {}", e);
            false
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
