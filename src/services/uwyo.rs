//! University of Wyoming sounding archive client.
//!
//! One GET per query, no retry. The `TEXT:LIST` result type returns the
//! soundings as `<pre>` blocks inside an HTML page.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::config::RadiosondeConfig;
use crate::errors::FetchError;

/// Caller supplied `[start, end)` bound for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

/// One calendar-day sub-window of a [`DateRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DayWindow {
    pub fn day(&self) -> NaiveDate {
        self.start.date()
    }
}

impl DateRange {
    /// Fails when `start` is after `end`. An empty range is valid and yields no days.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, FetchError> {
        if start > end {
            return Err(FetchError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Split into consecutive day windows; the last one is cut at the range end.
    pub fn days(&self) -> Vec<DayWindow> {
        let mut windows = Vec::new();
        let mut cursor = self.start;
        while cursor < self.end {
            let next = cursor + Duration::days(1);
            windows.push(DayWindow {
                start: cursor,
                end: next.min(self.end),
            });
            cursor = next;
        }
        windows
    }
}

/// Client for the sounding query endpoint.
#[derive(Debug, Clone)]
pub struct UwyoClient {
    client: reqwest::Client,
    base_url: String,
    region: String,
}

impl UwyoClient {
    pub fn new(config: &RadiosondeConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(FetchError::ClientBuild)?;
        Ok(Self {
            client,
            base_url: config.url.clone(),
            region: config.region.clone(),
        })
    }

    /// Query URL for one day window and station.
    ///
    /// `YEAR`/`MONTH` come from the window start; `FROM`/`TO` are `DDHH`.
    /// The service only searches inside one month, so a window ending in the
    /// next month stops at 23 UTC of its first day.
    pub fn build_query_url(&self, window: &DayWindow, station_number: i32) -> String {
        let to = if window.end.year() == window.start.year()
            && window.end.month() == window.start.month()
        {
            window.end.format("%d%H").to_string()
        } else {
            format!("{}23", window.start.format("%d"))
        };
        format!(
            "{}?region={}&TYPE=TEXT%3ALIST&YEAR={}&MONTH={}&FROM={}&TO={}&STNM={:05}",
            self.base_url,
            self.region,
            window.start.format("%Y"),
            window.start.format("%m"),
            window.start.format("%d%H"),
            to,
            station_number
        )
    }

    /// GET a URL and return the body text. Non-2xx statuses are errors.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.text().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })
    }
}
