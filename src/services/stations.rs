//! Radiosonde station directory.
//!
//! Parses the fixed-width station list (IGRA layout):
//!
//! ```text
//! VQW00011602  17.7000  -64.8000   16.8 VI ST CROIX (BENEDICT FIELD)      1948 1948    346
//! ```
//!
//! The WMO number is the last five characters of the 11-character ID token.
//! The directory is loaded once per session and read-only afterwards.

use std::path::{Path, PathBuf};

use crate::errors::StationListError;
use crate::models::StationRecord;
use crate::services::uwyo::UwyoClient;

const ID: (usize, usize) = (0, 11);
const WMO_NUMBER: (usize, usize) = (6, 11);
const LATITUDE: (usize, usize) = (12, 20);
const LONGITUDE: (usize, usize) = (21, 30);
const ELEVATION: (usize, usize) = (31, 37);
const STATE: (usize, usize) = (38, 40);
const NAME: (usize, usize) = (41, 71);
const FIRST_YEAR: (usize, usize) = (72, 76);
const LAST_YEAR: (usize, usize) = (77, 81);
const OBSERVATIONS: (usize, usize) = (82, 88);

/// Shortest line that still carries a name field.
const MIN_LINE_WIDTH: usize = NAME.1;

/// Where to read the station list from.
#[derive(Debug, Clone)]
pub enum StationSource {
    /// A previously downloaded station-list file.
    File(PathBuf),
    /// Download from the service, optionally keeping a copy.
    Remote { url: String, save_to: Option<PathBuf> },
}

#[derive(Debug, Clone, Default)]
pub struct StationDirectory {
    records: Vec<StationRecord>,
}

impl StationDirectory {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse station-list text, skipping (and logging) malformed lines.
    pub fn parse(text: &str) -> Self {
        let mut records = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            match parse_station_line(line) {
                Some(record) => records.push(record),
                None => tracing::warn!("Skipping malformed station list line {}: '{}'", lineno + 1, line),
            }
        }
        tracing::info!("Loaded {} stations", records.len());
        Self { records }
    }

    pub fn load_file(path: &Path) -> Result<Self, StationListError> {
        let text = std::fs::read_to_string(path).map_err(|source| StationListError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    /// Download the station list, saving the raw artifact when `save_to` is given.
    pub async fn download(
        client: &UwyoClient,
        url: &str,
        save_to: Option<&Path>,
    ) -> Result<Self, StationListError> {
        tracing::info!("Downloading station list from {}", url);
        let text = client.get_text(url).await?;

        if let Some(path) = save_to {
            std::fs::write(path, &text).map_err(|source| StationListError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::info!("Saved station list to {}", path.display());
        }

        Ok(Self::parse(&text))
    }

    pub async fn load(client: &UwyoClient, source: &StationSource) -> Result<Self, StationListError> {
        match source {
            StationSource::File(path) => Self::load_file(path),
            StationSource::Remote { url, save_to } => {
                Self::download(client, url, save_to.as_deref()).await
            }
        }
    }

    pub fn records(&self) -> &[StationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First record with the given station number.
    pub fn find(&self, station_number: i32) -> Option<&StationRecord> {
        self.records.iter().find(|r| r.id == station_number)
    }

    /// Resolve a station number to its name. A miss is logged, not an error.
    pub fn resolve(&self, station_number: i32) -> Option<&str> {
        match self.find(station_number) {
            Some(record) => {
                tracing::debug!("{} -> {}", station_number, record.name);
                Some(record.name.as_str())
            }
            None => {
                tracing::warn!("No station found for station number {}", station_number);
                None
            }
        }
    }
}

/// One row of the station listing: ID, name, latitude, longitude.
pub fn format_station_row(record: &StationRecord) -> String {
    format!(
        "{:>6} {:<30} {:>8.4} {:>9.4}",
        record.id, record.name, record.latitude, record.longitude
    )
}

pub fn station_table_header() -> String {
    format!("{:>6} {:<30} {:>8} {:>9}", "ID", "name", "lat", "lon")
}

fn slice(line: &str, (start, end): (usize, usize)) -> Option<&str> {
    let end = end.min(line.len());
    if start >= end {
        return None;
    }
    line.get(start..end).map(str::trim)
}

fn parse_station_line(line: &str) -> Option<StationRecord> {
    if line.len() < MIN_LINE_WIDTH {
        return None;
    }

    let id_token = slice(line, ID)?;
    if id_token.len() != ID.1 - ID.0 {
        return None;
    }
    let id = slice(line, WMO_NUMBER)?.parse().ok()?;

    let latitude = slice(line, LATITUDE)?.parse().ok()?;
    let longitude = slice(line, LONGITUDE)?.parse().ok()?;
    let elevation = slice(line, ELEVATION)?.parse().ok()?;

    let state = slice(line, STATE)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let name = slice(line, NAME)?.to_string();

    let optional_int = |range| slice(line, range).and_then(|s| s.parse().ok());

    Some(StationRecord {
        id,
        latitude,
        longitude,
        elevation,
        state,
        name,
        first_year: optional_int(FIRST_YEAR),
        last_year: optional_int(LAST_YEAR),
        observation_count: slice(line, OBSERVATIONS).and_then(|s| s.parse().ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ST_CROIX: &str =
        "VQW00011602  17.7000  -64.8000   16.8 VI ST CROIX (BENEDICT FIELD)      1948 1948    346";

    #[allow(clippy::too_many_arguments)]
    fn station_line(
        id: &str,
        lat: f64,
        lon: f64,
        ele: f64,
        state: &str,
        name: &str,
        first: i32,
        last: i32,
        count: u32,
    ) -> String {
        format!(
            "{:<11} {:>8.4} {:>9.4} {:>6.1} {:<2} {:<30} {:>4} {:>4} {:>6}",
            id, lat, lon, ele, state, name, first, last, count
        )
    }

    #[test]
    fn test_literal_line_layout() {
        assert_eq!(ST_CROIX.len(), 88);
        let record = parse_station_line(ST_CROIX).unwrap();
        assert_eq!(record.id, 11602);
        assert_eq!(record.latitude, 17.7);
        assert_eq!(record.longitude, -64.8);
        assert_eq!(record.elevation, 16.8);
        assert_eq!(record.state.as_deref(), Some("VI"));
        assert_eq!(record.name, "ST CROIX (BENEDICT FIELD)");
        assert_eq!(record.first_year, Some(1948));
        assert_eq!(record.last_year, Some(1948));
        assert_eq!(record.observation_count, Some(346));
    }

    #[test]
    fn test_generated_line_matches_layout() {
        let line = station_line("CHM00057494", 30.6, 114.05, 23.0, "", "WUHAN", 1950, 2024, 52000);
        assert_eq!(line.len(), 88);
        let record = parse_station_line(&line).unwrap();
        assert_eq!(record.id, 57494);
        assert_eq!(record.state, None);
        assert_eq!(record.name, "WUHAN");
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let text = [
            ST_CROIX.to_string(),
            "too short".to_string(),
            ST_CROIX.replace("VQW00011602", "VQW000ABCDE"),
            ST_CROIX.replace(" 17.7000", " 17.7O00"),
            String::new(),
            station_line("CHM00057494", 30.6, 114.05, 23.0, "", "WUHAN", 1950, 2024, 52000),
        ]
        .join("\n");

        let directory = StationDirectory::parse(&text);
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.records()[0].id, 11602);
        assert_eq!(directory.records()[1].id, 57494);
    }

    #[test]
    fn test_resolve_hit_and_miss() {
        let directory = StationDirectory::parse(ST_CROIX);
        assert_eq!(directory.resolve(11602), Some("ST CROIX (BENEDICT FIELD)"));
        assert_eq!(directory.resolve(99999), None);
        assert_eq!(StationDirectory::empty().resolve(11602), None);
    }

    #[test]
    fn test_first_match_wins() {
        let text = [
            station_line("CHM00057494", 30.6, 114.05, 23.0, "", "WUHAN", 1950, 2024, 52000),
            station_line("XXM00057494", 0.0, 0.0, 0.0, "", "DUPLICATE", 1990, 1991, 10),
        ]
        .join("\n");
        let directory = StationDirectory::parse(&text);
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.resolve(57494), Some("WUHAN"));
    }

    #[test]
    fn test_trailing_fields_optional() {
        let line = &ST_CROIX[..71];
        let record = parse_station_line(line).unwrap();
        assert_eq!(record.name, "ST CROIX (BENEDICT FIELD)");
        assert_eq!(record.first_year, None);
        assert_eq!(record.observation_count, None);
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("station_list");
        std::fs::write(&path, format!("{}\n", ST_CROIX)).unwrap();

        let directory = StationDirectory::load_file(&path).unwrap();
        assert_eq!(directory.len(), 1);

        let missing = StationDirectory::load_file(&dir.path().join("nope"));
        assert!(matches!(missing, Err(StationListError::Io { .. })));
    }

    #[test]
    fn test_format_station_row() {
        let record = parse_station_line(ST_CROIX).unwrap();
        let row = format_station_row(&record);
        assert!(row.starts_with(" 11602 ST CROIX (BENEDICT FIELD)"));
        assert!(row.ends_with(" 17.7000  -64.8000"));
    }

    #[tokio::test]
    async fn test_download_and_save() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/igra2-station-list.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("{}\n", ST_CROIX)))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("station_list");
        let client = UwyoClient::new(&crate::config::test_config().download.radiosonde).unwrap();
        let source = StationSource::Remote {
            url: format!("{}/igra2-station-list.txt", server.uri()),
            save_to: Some(snapshot.clone()),
        };

        let directory = StationDirectory::load(&client, &source).await.unwrap();
        assert_eq!(directory.resolve(11602), Some("ST CROIX (BENEDICT FIELD)"));

        // The saved snapshot loads back to the same directory
        let reloaded = StationDirectory::load(&client, &StationSource::File(snapshot))
            .await
            .unwrap();
        assert_eq!(reloaded.records(), directory.records());
    }

    #[tokio::test]
    async fn test_download_http_error() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = UwyoClient::new(&crate::config::test_config().download.radiosonde).unwrap();
        let result = StationDirectory::download(&client, &server.uri(), None).await;
        assert!(matches!(result, Err(StationListError::Download(_))));
    }
}
