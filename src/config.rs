//! ==============================================================================
//! config.rs - runtime configuration loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `dash.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - SourceConfig: where the records come from (base url, device, limit).
//!     - PollingConfig: refresh interval and whether auto-refresh starts on.
//!     - DisplayConfig: placeholder text and timestamp formatting.
//!     - TargetsConfig: which render targets the view carries.
//!     - ControlsConfig: which controls the dashboard exposes.
//!     - ServerConfig: where the local dashboard listens.
//!
//! ==============================================================================

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// bounds the data endpoint accepts for `limit`
pub const MIN_LIMIT: u32 = 1;
pub const MAX_LIMIT: u32 = 200;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DashConfig {
    pub source: SourceConfig,
    pub polling: PollingConfig,
    pub display: DisplayConfig,
    pub targets: TargetsConfig,
    pub controls: ControlsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    /// api origin, e.g. "http://192.168.1.20:5000"
    pub base: String,
    /// device filter; empty means every device
    pub device: String,
    pub limit: u32,
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub auto_refresh: bool,
    /// drop responses that are not from the latest issued request
    pub drop_stale: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Timezone {
    #[default]
    Local,
    Utc,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub placeholder: String,
    /// strftime pattern
    pub time_format: String,
    pub timezone: Timezone,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TargetsConfig {
    pub table: bool,
    pub metrics: bool,
    pub chart: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ControlsConfig {
    pub auto_refresh_toggle: bool,
    pub manual_refresh: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base: "http://127.0.0.1:5000".to_string(),
            device: String::new(),
            limit: 50,
            timeout_ms: 10_000,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_ms: 5_000, auto_refresh: true, drop_stale: true }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            placeholder: "—".to_string(),
            time_format: "%Y-%m-%d %H:%M:%S".to_string(),
            timezone: Timezone::Local,
        }
    }
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self { table: true, metrics: true, chart: true }
    }
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self { auto_refresh_toggle: true, manual_refresh: true }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { enabled: true, bind: "0.0.0.0:3000".to_string() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

/// result of config discovery; logged once tracing is up
#[derive(Debug)]
pub struct Loaded {
    pub config: DashConfig,
    pub origin: Option<PathBuf>,
    pub skipped: Vec<(PathBuf, String)>,
}

impl Loaded {
    pub fn log(&self) {
        for (path, reason) in &self.skipped {
            warn!(path = %path.display(), "config ignored: {}", reason);
        }
        match &self.origin {
            Some(path) => info!(path = %path.display(), "config loaded"),
            None => warn!("no config file found - using defaults"),
        }
    }
}

impl SourceConfig {
    /// `None` when no device filter is set
    pub fn device_filter(&self) -> Option<&str> {
        Some(self.device.as_str()).filter(|d| !d.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

impl DashConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// parse and validate; out-of-range numbers are left for `clamp`
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: DashConfig = toml::from_str(content)?;
        if !crate::render::valid_pattern(&config.display.time_format) {
            anyhow::bail!("display.time_format {:?} is not a valid strftime pattern", config.display.time_format);
        }
        Ok(config)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Loaded {
        let paths = [
            PathBuf::from("config").join("dash.toml"),
            PathBuf::from("..").join("config").join("dash.toml"),
        ];

        let mut skipped = Vec::new();
        for path in paths {
            if path.exists() {
                match Self::load(&path) {
                    Ok(config) => {
                        return Loaded { config, origin: Some(path), skipped };
                    }
                    Err(e) => skipped.push((path, format!("{:#}", e))),
                }
            }
        }

        Loaded { config: Self::default(), origin: None, skipped }
    }

    /// keep values inside what the endpoint and the timer accept;
    /// returns what was adjusted (also logged)
    pub fn clamp(&mut self) -> Vec<String> {
        let mut notes = Vec::new();
        let limit = self.source.limit.clamp(MIN_LIMIT, MAX_LIMIT);
        if limit != self.source.limit {
            warn!(requested = self.source.limit, limit, "limit out of range, clamped");
            notes.push(format!("source.limit {} -> {}", self.source.limit, limit));
            self.source.limit = limit;
        }
        if self.polling.interval_ms == 0 {
            let interval = PollingConfig::default().interval_ms;
            warn!(interval_ms = interval, "polling.interval_ms = 0, using default");
            notes.push(format!("polling.interval_ms 0 -> {}", interval));
            self.polling.interval_ms = interval;
        }
        notes
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        info!(
            base = %self.source.base,
            device = self.source.device_filter().unwrap_or("(all)"),
            limit = self.source.limit,
            interval_ms = self.polling.interval_ms,
            auto_refresh = self.polling.auto_refresh,
            "source"
        );
        info!(
            table = self.targets.table,
            metrics = self.targets.metrics,
            chart = self.targets.chart,
            toggle = self.controls.auto_refresh_toggle,
            manual = self.controls.manual_refresh,
            "view"
        );
        if self.server.enabled {
            info!(bind = %self.server.bind, "dashboard server enabled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let c = DashConfig::parse("").unwrap();
        assert_eq!(c.source.limit, 50);
        assert_eq!(c.polling.interval(), Duration::from_millis(5000));
        assert!(c.polling.auto_refresh);
        assert!(c.polling.drop_stale);
        assert_eq!(c.display.placeholder, "—");
        assert!(c.source.device_filter().is_none());
        assert!(c.targets.chart && c.controls.manual_refresh);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let c = DashConfig::parse(
            r#"
            [source]
            base = "http://hub.local:5000"
            device = "GAIDESK-01"

            [polling]
            interval_ms = 2000
            auto_refresh = false

            [display]
            timezone = "utc"

            [targets]
            chart = false
            "#,
        )
        .unwrap();
        assert_eq!(c.source.base, "http://hub.local:5000");
        assert_eq!(c.source.device_filter(), Some("GAIDESK-01"));
        assert_eq!(c.source.limit, 50);
        assert_eq!(c.polling.interval_ms, 2000);
        assert!(!c.polling.auto_refresh);
        assert_eq!(c.display.timezone, Timezone::Utc);
        assert!(!c.targets.chart);
        assert!(c.targets.table);
    }

    #[test]
    fn limit_is_clamped_after_parse() {
        let mut c = DashConfig::parse("[source]\nlimit = 5000").unwrap();
        assert_eq!(c.source.limit, 5000);
        let notes = c.clamp();
        assert_eq!(c.source.limit, MAX_LIMIT);
        assert_eq!(notes, vec!["source.limit 5000 -> 200".to_string()]);

        let mut c = DashConfig::parse("[source]\nlimit = 0\n[polling]\ninterval_ms = 0").unwrap();
        assert_eq!(c.clamp().len(), 2);
        assert_eq!(c.source.limit, MIN_LIMIT);
        assert_eq!(c.polling.interval_ms, 5000);
        assert!(c.clamp().is_empty());
    }

    #[test]
    fn bad_time_format_is_rejected() {
        let err = DashConfig::parse("[display]\ntime_format = \"%Y-%Q\"").unwrap_err();
        assert!(err.to_string().contains("time_format"));
        assert!(DashConfig::parse("[display]\ntime_format = \"%d.%m.%Y %H:%M\"").is_ok());
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(DashConfig::parse("[source\nbase = 1").is_err());
    }
}
