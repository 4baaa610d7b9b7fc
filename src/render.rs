//! ==============================================================================
//! render.rs - normalized records to table, metrics and chart
//! ==============================================================================
//!
//! purpose:
//!     projects one fetch result onto a View. the result fully replaces what
//!     was shown before; nothing is diffed.
//!
//! ordering:
//!     the feed is newest-first. the table keeps that order, the metrics read
//!     the first record, and the chart is reversed to oldest-first.
//!
//! relationships:
//!     - used by: scheduler.rs
//!     - writes: view.rs targets
//!
//! ==============================================================================

use crate::config::{DisplayConfig, Timezone};
use crate::domain::{display_value, number_of, NormalizedRecord};
use crate::view::{ChartData, TableRow, View};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;

/// how epoch-millisecond timestamps become labels
#[derive(Clone, Debug)]
pub struct TimeFormat {
    pub pattern: String,
    pub zone: Timezone,
}

impl Default for TimeFormat {
    fn default() -> Self {
        Self {
            pattern: "%Y-%m-%d %H:%M:%S".to_string(),
            zone: Timezone::Local,
        }
    }
}

impl TimeFormat {
    /// formatted date, or the raw value when it is not a valid epoch-ms date
    pub fn format(&self, v: &Value) -> String {
        let parsed = number_of(v)
            .map(|ms| ms.trunc())
            .filter(|ms| ms.abs() <= i64::MAX as f64)
            .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms as i64));

        let Some(dt) = parsed else {
            return display_value(v);
        };
        // a bad pattern makes chrono's Display fail; show the raw value then
        let mut out = String::new();
        let written = match self.zone {
            Timezone::Utc => write!(out, "{}", dt.format(&self.pattern)),
            Timezone::Local => write!(out, "{}", dt.with_timezone(&Local).format(&self.pattern)),
        };
        match written {
            Ok(()) => out,
            Err(_) => display_value(v),
        }
    }
}

/// true when every strftime specifier in `pattern` is understood
pub fn valid_pattern(pattern: &str) -> bool {
    !StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
}

/// which sub-steps actually ran
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RenderReport {
    pub rows: Option<usize>,
    pub metrics_updated: usize,
    pub chart_points: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct Renderer {
    placeholder: String,
    time: TimeFormat,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new("—", TimeFormat::default())
    }
}

impl Renderer {
    pub fn new(placeholder: impl Into<String>, time: TimeFormat) -> Self {
        Self {
            placeholder: placeholder.into(),
            time,
        }
    }

    pub fn from_config(display: &DisplayConfig) -> Self {
        Self::new(
            display.placeholder.clone(),
            TimeFormat {
                pattern: display.time_format.clone(),
                zone: display.timezone,
            },
        )
    }

    pub fn row(&self, rec: &NormalizedRecord) -> TableRow {
        TableRow {
            time: self.time.format(&rec.timestamp),
            temperature: rec.temperature.display(&self.placeholder),
            co2: rec.co2.display(&self.placeholder),
            presence: rec.presence.display(&self.placeholder),
            risk: rec.risk.display(&self.placeholder),
        }
    }

    pub fn chart_data(&self, records: &[NormalizedRecord]) -> ChartData {
        let mut data = ChartData::default();
        for rec in records.iter().rev() {
            data.labels.push(self.time.format(&rec.timestamp));
            data.temperature.push(rec.temperature.as_number());
            data.co2.push(rec.co2.as_number());
        }
        data
    }

    pub fn render(&self, records: &[NormalizedRecord], view: &mut View) -> RenderReport {
        let mut report = RenderReport::default();

        if let Some(table) = view.table.as_mut() {
            table.replace(records.iter().map(|r| self.row(r)).collect());
            report.rows = Some(records.len());
        }

        let metrics = &mut view.metrics;
        if let Some(cell) = metrics.count.as_mut() {
            cell.set(records.len().to_string());
            report.metrics_updated += 1;
        }
        // empty result: keep the last known readings on screen
        if let Some(latest) = records.first() {
            let cells = [
                (metrics.temperature.as_mut(), &latest.temperature),
                (metrics.co2.as_mut(), &latest.co2),
                (metrics.presence.as_mut(), &latest.presence),
            ];
            for (cell, reading) in cells {
                if let Some(cell) = cell {
                    cell.set(reading.display(&self.placeholder));
                    report.metrics_updated += 1;
                }
            }
        }

        if let Some(canvas) = view.canvas.as_mut() {
            let chart = canvas.draw(self.chart_data(records));
            report.chart_points = Some(chart.labels.len());
        }

        report
    }
}
