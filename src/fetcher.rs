//! ==============================================================================
//! fetcher.rs - reads the record window from the data endpoint
//! ==============================================================================
//!
//! purpose:
//!     GET {base}/api/data?limit=N[&device=ID] and decode the json array of
//!     {key, value} records. every request asks intermediaries not to cache.
//!     there is no retry here; the next scheduled tick is the retry.
//!
//! relationships:
//!     - used by: scheduler.rs (through the RecordSource trait)
//!     - used by: server.rs (session summary proxy)
//!
//! ==============================================================================

use crate::config::SourceConfig;
use crate::domain::{number_of, RawRecord};
use crate::error::{PollError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// parameters of one read
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DataQuery {
    pub device: Option<String>,
    pub limit: u32,
}

impl DataQuery {
    pub fn new(device: Option<&str>, limit: u32) -> Self {
        Self {
            device: device.filter(|d| !d.is_empty()).map(String::from),
            limit,
        }
    }

    pub fn from_config(source: &SourceConfig) -> Self {
        Self::new(source.device_filter(), source.limit)
    }
}

/// anything that can hand back an ordered (newest-first) record window
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, query: &DataQuery) -> Result<Vec<RawRecord>>;
}

/// summary of the device's latest session as the hub reports it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub session_key: Option<String>,
    #[serde(default)]
    pub start_ts: Option<Value>,
    #[serde(default)]
    pub end_ts: Option<Value>,
    #[serde(default, deserialize_with = "whole_seconds")]
    pub duration_sec: Option<i64>,
    /// stats, alerts, status... passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// firmware sometimes reports 12.0 instead of 12
fn whole_seconds<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.as_ref().and_then(number_of).map(|s| s.trunc() as i64))
}

impl SessionSummary {
    /// fill a missing duration from start/end milliseconds
    pub fn with_duration(mut self) -> Self {
        if self.duration_sec.is_none() {
            let start = self.start_ts.as_ref().filter(|v| v.is_number()).and_then(number_of);
            let end = self.end_ts.as_ref().filter(|v| v.is_number()).and_then(number_of);
            if let (Some(start), Some(end)) = (start, end) {
                self.duration_sec = Some(((end - start) / 1000.0).trunc() as i64);
            }
        }
        self
    }
}

#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: Client,
    base: Url,
}

impl HttpFetcher {
    pub fn new(base: &str, timeout: std::time::Duration) -> Result<Self> {
        let mut base = Url::parse(base).map_err(|e| PollError::Config {
            url: base.to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(PollError::Config {
                url: base.to_string(),
                reason: "not a base url".to_string(),
            });
        }
        // "http://host/prefix" must keep "prefix" when joining "api/data"
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, base })
    }

    pub fn from_config(source: &SourceConfig) -> Result<Self> {
        Self::new(&source.base, source.timeout())
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base.join(path).map_err(|e| PollError::Config {
            url: format!("{}{}", self.base, path),
            reason: e.to_string(),
        })
    }

    /// the exact url a query is sent to
    pub fn data_url(&self, query: &DataQuery) -> Result<Url> {
        let mut url = self.endpoint("api/data")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("limit", &query.limit.to_string());
            if let Some(device) = &query.device {
                pairs.append_pair("device", device);
            }
        }
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PollError::Status { status, url: url.to_string() });
        }
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn fetch_session_summary(&self, device: Option<&str>) -> Result<SessionSummary> {
        let mut url = self.endpoint("api/session-summary")?;
        if let Some(device) = device.filter(|d| !d.is_empty()) {
            url.query_pairs_mut().append_pair("device", device);
        }
        let summary: SessionSummary = self.get_json(url).await?;
        Ok(summary.with_duration())
    }
}

#[async_trait]
impl RecordSource for HttpFetcher {
    async fn fetch(&self, query: &DataQuery) -> Result<Vec<RawRecord>> {
        let url = self.data_url(query)?;
        debug!(%url, "fetching records");
        let records: Vec<RawRecord> = self.get_json(url).await?;
        debug!(count = records.len(), "records fetched");
        Ok(records)
    }
}
