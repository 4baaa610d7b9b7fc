//! ==============================================================================
//! normalizer.rs - raw record to display record
//! ==============================================================================
//!
//! purpose:
//!     firmware revisions disagree on field names ("t" vs "temp" vs "T").
//!     each logical field carries an ordered list of candidate keys and the
//!     first one holding a non-null value wins.
//!
//! relationships:
//!     - used by: scheduler.rs (between fetch and render)
//!     - produces: domain::NormalizedRecord
//!
//! ==============================================================================

use crate::domain::{NormalizedRecord, RawRecord, Reading};
use serde_json::{Map, Value};

pub const TIMESTAMP_KEYS: &[&str] = &["ts"];
pub const TEMPERATURE_KEYS: &[&str] = &["t", "temp", "T"];
pub const CO2_KEYS: &[&str] = &["co2"];
pub const PRESENCE_KEYS: &[&str] = &["presence", "p"];
pub const RISK_KEYS: &[&str] = &["risk", "r"];

/// first candidate that exists and is not null
pub fn resolve<'a>(value: &'a Map<String, Value>, candidates: &[&str]) -> Option<&'a Value> {
    candidates
        .iter()
        .filter_map(|k| value.get(*k))
        .find(|v| !v.is_null())
}

fn reading(value: &Map<String, Value>, candidates: &[&str]) -> Reading {
    resolve(value, candidates)
        .cloned()
        .map(Reading::Value)
        .unwrap_or(Reading::Unknown)
}

// the feed writes ts = 0 / "" when the device had no clock; treat like absent
fn usable_timestamp(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

pub fn normalize(raw: &RawRecord) -> NormalizedRecord {
    let v = &raw.value;

    let timestamp = resolve(v, TIMESTAMP_KEYS)
        .filter(|ts| usable_timestamp(ts))
        .cloned()
        .unwrap_or_else(|| Value::String(raw.key.clone()));

    let risk = match reading(v, RISK_KEYS) {
        Reading::Unknown => Reading::Value(Value::from(0)),
        r => r,
    };

    NormalizedRecord {
        key: raw.key.clone(),
        timestamp,
        temperature: reading(v, TEMPERATURE_KEYS),
        co2: reading(v, CO2_KEYS),
        presence: reading(v, PRESENCE_KEYS),
        risk,
    }
}

pub fn normalize_all(raw: &[RawRecord]) -> Vec<NormalizedRecord> {
    raw.iter().map(normalize).collect()
}
