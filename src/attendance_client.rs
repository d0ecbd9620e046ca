// src/attendance_client.rs

use crate::attendance_data::{parse_employee_map, AttendanceMap, RawAttendanceMap};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

// --- Configuration ---

/// Client configuration, read from `PUNCHCARD_`-prefixed environment
/// variables (optionally via a `.env` file).
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Base URL of the CRM backend, e.g. `https://crm.example.com/api`.
    pub api_base_url: String,
    /// Optional bearer token for authenticated deployments.
    pub api_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        // Load .env file if it exists
        dotenv::dotenv().ok();
        envy::prefixed("PUNCHCARD_").from_env::<Config>()
    }
}

// --- Errors ---

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("URL parsing failed: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("Attendance API returned an error: {status} - {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
}

// --- Attendance Source Port ---

/// Upstream source of raw punch events. The HTTP client implements this for
/// the real backend; tests implement it in memory.
#[async_trait]
pub trait AttendanceSource {
    /// Fetches the punch events for an inclusive date range, optionally
    /// filtered to a single employee. An empty map means "no records".
    async fn fetch_range(
        &self,
        employee: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AttendanceMap, ApiError>;
}

/// Reqwest-backed source talking to the CRM attendance endpoint.
pub struct HttpAttendanceSource {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpAttendanceSource {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let mut base_url = Url::parse(&config.api_base_url)?;
        // Url::join treats a path without a trailing slash as a file and
        // would drop its last segment.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        Ok(Self {
            client: Client::new(),
            base_url,
            api_token: config.api_token.clone(),
        })
    }
}

#[async_trait]
impl AttendanceSource for HttpAttendanceSource {
    async fn fetch_range(
        &self,
        employee: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AttendanceMap, ApiError> {
        let mut url = self.base_url.join("attendance/report")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("from", &from.format("%Y-%m-%d").to_string());
            query.append_pair("to", &to.format("%Y-%m-%d").to_string());
            if let Some(employee) = employee {
                query.append_pair("employee", employee);
            }
        }

        debug!("Fetching attendance report from {}", url);
        let mut request = self.client.get(url);
        if let Some(token) = &self.api_token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Attendance API request failed: {} - {}", status, body);
            return Err(ApiError::UnexpectedStatus { status, body });
        }

        let raw: RawAttendanceMap = response.json().await?;
        let map = parse_employee_map(raw);
        info!(
            "Fetched attendance for {} employee(s), {} to {}",
            map.len(),
            from,
            to
        );
        Ok(map)
    }
}

// --- Last-Request-Wins Sequencing ---

/// Tracks which fetch is the newest so a slow response for a superseded
/// range can be discarded. `begin` hands out a ticket; `accept` only lets a
/// value through while its ticket is still the latest one issued.
#[derive(Debug, Default)]
pub struct FetchSequence {
    latest: AtomicU64,
}

impl FetchSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new fetch and returns its ticket, superseding all
    /// previously issued tickets.
    pub fn begin(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }

    /// Returns the value only if `ticket` still belongs to the newest fetch;
    /// a stale response yields `None` and is dropped.
    pub fn accept<T>(&self, ticket: u64, value: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(value)
        } else {
            debug!("Discarding stale fetch response (ticket {})", ticket);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance_data::{AttendanceEvent, Punch};
    use std::collections::BTreeMap;

    struct FakeSource {
        map: AttendanceMap,
    }

    #[async_trait]
    impl AttendanceSource for FakeSource {
        async fn fetch_range(
            &self,
            employee: Option<&str>,
            _from: NaiveDate,
            _to: NaiveDate,
        ) -> Result<AttendanceMap, ApiError> {
            Ok(match employee {
                Some(name) => self
                    .map
                    .iter()
                    .filter(|(k, _)| k.as_str() == name)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                None => self.map.clone(),
            })
        }
    }

    fn sample_map() -> AttendanceMap {
        let day = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let mut by_day = BTreeMap::new();
        by_day.insert(
            day,
            vec![AttendanceEvent {
                time_stamp: 1000,
                status: Punch::In,
            }],
        );
        let mut map = AttendanceMap::new();
        map.insert("Alice".to_string(), by_day.clone());
        map.insert("Bob".to_string(), by_day);
        map
    }

    #[tokio::test]
    async fn fake_source_honors_employee_filter() {
        let source = FakeSource { map: sample_map() };
        let from = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 1, 12).unwrap();

        let all = source.fetch_range(None, from, to).await.unwrap();
        assert_eq!(all.len(), 2);

        let alice_only = source.fetch_range(Some("Alice"), from, to).await.unwrap();
        assert_eq!(alice_only.len(), 1);
        assert!(alice_only.contains_key("Alice"));
    }

    #[test]
    fn fetch_sequence_accepts_only_the_newest_ticket() {
        let seq = FetchSequence::new();
        let first = seq.begin();
        let second = seq.begin();

        assert!(!seq.is_current(first));
        assert!(seq.is_current(second));
        assert_eq!(seq.accept(first, "stale"), None);
        assert_eq!(seq.accept(second, "fresh"), Some("fresh"));
    }

    #[test]
    fn fetch_sequence_latest_request_wins_regardless_of_completion_order() {
        let seq = FetchSequence::new();
        let a = seq.begin();
        let b = seq.begin();
        let c = seq.begin();

        // Responses arrive out of order; only the newest survives.
        assert_eq!(seq.accept(b, 2), None);
        assert_eq!(seq.accept(c, 3), Some(3));
        assert_eq!(seq.accept(a, 1), None);
    }

    #[test]
    fn http_source_rejects_invalid_base_url() {
        let config = Config {
            api_base_url: "not a url".to_string(),
            api_token: None,
        };
        assert!(matches!(
            HttpAttendanceSource::new(&config),
            Err(ApiError::UrlParse(_))
        ));
    }
}
