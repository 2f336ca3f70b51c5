//! Day-by-day sounding retrieval.
//!
//! Each day window is one request. The returned page holds `<pre>` blocks in
//! (data, metadata) order per sounding; every complete pair becomes one
//! [`SoundingRecord`]. A failed day is recorded and the loop moves on.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use tracing::Instrument;

use crate::errors::FetchError;
use crate::models::SoundingRecord;
use crate::services::metadata;
use crate::services::profile;
use crate::services::stations::StationDirectory;
use crate::services::uwyo::{DateRange, DayWindow, UwyoClient};

lazy_static! {
    static ref PRE_SELECTOR: Selector = Selector::parse("pre").expect("static selector is valid");
}

/// Outcome of one day window.
#[derive(Debug)]
pub struct DayOutcome {
    pub day: NaiveDate,
    pub result: Result<Vec<SoundingRecord>, FetchError>,
}

/// Per-day outcomes of a fetch, in calendar order.
#[derive(Debug, Default)]
pub struct FetchReport {
    days: Vec<DayOutcome>,
}

impl FetchReport {
    pub fn days(&self) -> &[DayOutcome] {
        &self.days
    }

    pub fn failures(&self) -> impl Iterator<Item = (NaiveDate, &FetchError)> {
        self.days
            .iter()
            .filter_map(|d| d.result.as_ref().err().map(|e| (d.day, e)))
    }

    pub fn sounding_count(&self) -> usize {
        self.days
            .iter()
            .filter_map(|d| d.result.as_ref().ok())
            .map(Vec::len)
            .sum()
    }

    /// Concatenate the soundings of every successful day.
    pub fn into_soundings(self) -> Vec<SoundingRecord> {
        self.days
            .into_iter()
            .filter_map(|d| d.result.ok())
            .flatten()
            .collect()
    }
}

pub struct SoundingFetcher<'a> {
    client: &'a UwyoClient,
    stations: &'a StationDirectory,
}

impl<'a> SoundingFetcher<'a> {
    pub fn new(client: &'a UwyoClient, stations: &'a StationDirectory) -> Self {
        Self { client, stations }
    }

    /// Fetch every day of the range. A failed day never stops the loop.
    pub async fn fetch(&self, range: DateRange, station_number: i32) -> FetchReport {
        let mut report = FetchReport::default();
        tracing::info!(
            "Fetching station {:05} from {} to {}",
            station_number,
            range.start(),
            range.end()
        );

        for window in range.days() {
            let span = tracing::info_span!("day", date = %window.day(), station = station_number);
            let result = self.fetch_day(&window, station_number).instrument(span).await;

            match &result {
                Ok(soundings) => {
                    tracing::info!("{}: {} soundings", window.day(), soundings.len())
                }
                Err(e) => tracing::error!("{}: fetch failed: {}", window.day(), e),
            }
            report.days.push(DayOutcome {
                day: window.day(),
                result,
            });
        }

        report
    }

    /// Fetch and parse all soundings of one day window.
    pub async fn fetch_day(
        &self,
        window: &DayWindow,
        station_number: i32,
    ) -> Result<Vec<SoundingRecord>, FetchError> {
        let url = self.client.build_query_url(window, station_number);
        let html = self.client.get_text(&url).await?;
        Ok(parse_soundings(&html, self.stations))
    }
}

/// Text content of every `<pre>` element, in document order.
pub fn extract_pre_blocks(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&PRE_SELECTOR)
        .map(|el| el.text().collect::<String>())
        .collect()
}

/// Pair blocks as (data, metadata). A trailing unpaired block is dropped.
pub fn pair_blocks(blocks: &[String]) -> Vec<(&str, &str)> {
    if blocks.len() % 2 != 0 {
        tracing::warn!(
            "Odd number of <pre> blocks ({}), discarding the last one",
            blocks.len()
        );
    }
    blocks
        .chunks_exact(2)
        .map(|pair| (pair[0].as_str(), pair[1].as_str()))
        .collect()
}

/// Build one record from a data block and its metadata block.
pub fn assemble_sounding(
    data_block: &str,
    metadata_block: &str,
    stations: &StationDirectory,
) -> SoundingRecord {
    let levels = profile::parse_block(data_block);
    let meta = metadata::extract(metadata_block);

    let station_number = meta.station_number();
    if station_number.is_default() {
        tracing::warn!("Metadata block has no station number");
    }
    let station_name = stations.resolve(station_number.value()).map(str::to_string);

    let launch_time = meta.launch_time();
    if launch_time.is_none() {
        tracing::warn!(
            "Cannot parse observation time '{}'",
            meta.launch_time_token()
        );
    }

    if levels.is_empty() {
        tracing::warn!("Data block for station {} has no levels", station_number.value());
    }

    SoundingRecord::new(
        levels,
        meta.lcl_temperature(),
        meta.lcl_pressure(),
        meta.precipitable_water(),
        launch_time,
        station_number.value(),
        station_name,
        meta.station_latitude(),
        meta.station_longitude(),
        meta.station_elevation(),
    )
}

/// All soundings found in one result page.
pub fn parse_soundings(html: &str, stations: &StationDirectory) -> Vec<SoundingRecord> {
    let blocks = extract_pre_blocks(html);
    if blocks.is_empty() {
        tracing::warn!("No <pre> blocks in response");
    }
    pair_blocks(&blocks)
        .into_iter()
        .map(|(data, meta)| assemble_sounding(data, meta, stations))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{NaiveDateTime, TimeZone, Utc};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::{test_config, RadiosondeConfig};
    use crate::models::Scalar;

    const DATA_BLOCK: &str = "
-----------------------------------------------------------------------------
   PRES   HGHT   TEMP   DWPT   RELH   MIXR   DRCT   SKNT   THTA   THTE   THTV
    hPa     m      C      C      %    g/kg    deg   knot     K      K      K
-----------------------------------------------------------------------------
 1007.0     35   25.6   20.6     74  15.41    330      4  298.2  343.2  301.0
 1000.0     96   24.6   20.6     78  15.51    335      6  297.8  343.0  300.6
  925.0    779   19.4   18.6     95  14.62    350     12  299.3  341.5  301.9
";

    const METADATA_BLOCK: &str = "
                             Station number: 57494
                           Observation time: 190916/1200
                           Station latitude: 32.00
                          Station longitude: 34.81
                          Station elevation: 35.0
";

    /// A result page with `pairs` soundings and optionally one stray block.
    pub(crate) fn sample_page(pairs: usize, stray: bool) -> String {
        let mut body = String::from("<HTML><TITLE>University of Wyoming - Radiosonde Data</TITLE><BODY>");
        for _ in 0..pairs {
            body.push_str("<H2>57494 Wuhan Observations at 12Z 16 Sep 2019</H2>");
            body.push_str(&format!("<PRE>{}</PRE>", DATA_BLOCK));
            body.push_str("<H3>Station information and sounding indices</H3>");
            body.push_str(&format!("<PRE>{}</PRE>", METADATA_BLOCK));
        }
        if stray {
            body.push_str(&format!("<PRE>{}</PRE>", DATA_BLOCK));
        }
        body.push_str("</BODY></HTML>");
        body
    }

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn mock_config(server: &MockServer) -> RadiosondeConfig {
        let mut config = test_config().download.radiosonde;
        config.url = format!("{}/cgi-bin/sounding", server.uri());
        config
    }

    #[test]
    fn test_extract_pre_blocks_text() {
        let blocks = extract_pre_blocks(&sample_page(1, false));
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("PRES   HGHT"));
        assert!(blocks[1].contains("Station number: 57494"));
    }

    #[test]
    fn test_single_pair_example() {
        let records = parse_soundings(&sample_page(1, false), &StationDirectory::empty());
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.levels().len(), 3);
        assert_eq!(record.station_number(), 57494);
        assert_eq!(
            record.launch_time(),
            Utc.with_ymd_and_hms(2019, 9, 16, 12, 0, 0).single()
        );
        assert_eq!(record.station_latitude().value(), 32.0);
        assert_eq!(record.station_longitude().value(), 34.81);
        assert_eq!(record.station_elevation().value(), 35.0);
        assert_eq!(record.lcl_temperature(), Scalar::Defaulted(0.0));
        assert_eq!(record.lcl_pressure(), Scalar::Defaulted(0.0));
        assert_eq!(record.precipitable_water(), Scalar::Defaulted(0.0));
        assert_eq!(record.station_name(), None);
    }

    #[test]
    fn test_levels_in_source_order() {
        let records = parse_soundings(&sample_page(1, false), &StationDirectory::empty());
        let heights: Vec<Option<f64>> = records[0].levels().iter().map(|l| l.height).collect();
        assert_eq!(heights, vec![Some(35.0), Some(96.0), Some(779.0)]);
    }

    #[test]
    fn test_last_row_closed_by_tag() {
        let page = sample_page(1, false).replace("301.9\n</PRE>", "301.9</PRE>");
        assert!(page.contains("301.9</PRE>"));
        let records = parse_soundings(&page, &StationDirectory::empty());
        assert_eq!(records[0].levels().len(), 3);
        assert_eq!(records[0].levels()[2].pressure, Some(925.0));
    }

    #[test]
    fn test_odd_block_count_discards_trailing() {
        let records = parse_soundings(&sample_page(2, true), &StationDirectory::empty());
        assert_eq!(records.len(), 2);

        let blocks = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(pair_blocks(&blocks), vec![("a", "b")]);
    }

    #[test]
    fn test_page_without_soundings() {
        let records = parse_soundings(
            "<HTML><BODY><H2>Can't get 57494 Wuhan Observations at 00Z 01 Jan 2019</H2></BODY></HTML>",
            &StationDirectory::empty(),
        );
        assert!(records.is_empty());
    }

    #[test]
    fn test_station_name_resolved() {
        let stations = StationDirectory::parse(
            "CHM00057494  30.6000  114.0500   23.0    WUHAN                          1950 2024  52000",
        );
        let records = parse_soundings(&sample_page(1, false), &stations);
        assert_eq!(records[0].station_name(), Some("WUHAN"));
    }

    #[tokio::test]
    async fn test_fetch_day_builds_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cgi-bin/sounding"))
            .and(query_param("region", "naconf"))
            .and(query_param("TYPE", "TEXT:LIST"))
            .and(query_param("YEAR", "2019"))
            .and(query_param("MONTH", "09"))
            .and(query_param("FROM", "1600"))
            .and(query_param("TO", "1700"))
            .and(query_param("STNM", "57494"))
            .respond_with(ResponseTemplate::new(200).set_body_string(sample_page(2, false)))
            .expect(1)
            .mount(&server)
            .await;

        let client = UwyoClient::new(&mock_config(&server)).unwrap();
        let stations = StationDirectory::empty();
        let fetcher = SoundingFetcher::new(&client, &stations);
        let window = DayWindow {
            start: at(2019, 9, 16),
            end: at(2019, 9, 17),
        };

        let records = fetcher.fetch_day(&window, 57494).await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_continues_past_failed_day() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("FROM", "1700"))
            .respond_with(ResponseTemplate::new(500))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(sample_page(1, false)))
            .mount(&server)
            .await;

        let client = UwyoClient::new(&mock_config(&server)).unwrap();
        let stations = StationDirectory::empty();
        let fetcher = SoundingFetcher::new(&client, &stations);
        let range = DateRange::new(at(2019, 9, 16), at(2019, 9, 19)).unwrap();

        let report = fetcher.fetch(range, 57494).await;
        assert_eq!(report.days().len(), 3);

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, chrono::NaiveDate::from_ymd_opt(2019, 9, 17).unwrap());
        assert!(matches!(failures[0].1, FetchError::HttpStatus { status: 500, .. }));

        assert_eq!(report.sounding_count(), 2);
        assert_eq!(report.into_soundings().len(), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_is_absorbed() {
        // Nothing listens on this port once the server is dropped
        let server = MockServer::start().await;
        let config = mock_config(&server);
        drop(server);

        let client = UwyoClient::new(&config).unwrap();
        let stations = StationDirectory::empty();
        let fetcher = SoundingFetcher::new(&client, &stations);
        let range = DateRange::new(at(2019, 9, 16), at(2019, 9, 18)).unwrap();

        let report = fetcher.fetch(range, 57494).await;
        assert_eq!(report.failures().count(), 2);
        assert!(report.into_soundings().is_empty());
    }
}
