use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// one record exactly as the data source returns it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// opaque identifier, usually the millisecond timestamp as a string
    pub key: String,

    /// field payload; a missing or null `value` decodes to an empty map
    #[serde(default, deserialize_with = "null_as_empty")]
    pub value: Map<String, Value>,
}

impl RawRecord {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        let value = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { key: key.into(), value }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// a logical field after alias resolution
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading {
    /// no alias carried a value
    Unknown,
    /// the first non-null alias value, kept as received
    Value(Value),
}

impl Reading {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Reading::Unknown)
    }

    /// table / metric text; unknown shows the placeholder, never "0" or ""
    pub fn display(&self, placeholder: &str) -> String {
        match self {
            Reading::Unknown => placeholder.to_string(),
            Reading::Value(v) => display_value(v),
        }
    }

    /// numeric view for chart series; `None` means "absent or not a number"
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Reading::Unknown => None,
            Reading::Value(v) => number_of(v),
        }
    }
}

/// a display-ready record
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub key: String,
    /// `value.ts` when usable, otherwise the record key as a string
    pub timestamp: Value,
    pub temperature: Reading,
    pub co2: Reading,
    pub presence: Reading,
    /// always a value; absent risk is the number 0
    pub risk: Reading,
}

/// render a json value the way a template literal would print it
pub fn display_value(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// numeric coercion shared by the chart series and the timestamp formatter
pub fn number_of(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_null_value_as_empty_map() {
        let raw: RawRecord = serde_json::from_str(r#"{"key":"k1","value":null}"#).unwrap();
        assert!(raw.value.is_empty());

        let raw: RawRecord = serde_json::from_str(r#"{"key":"k2"}"#).unwrap();
        assert!(raw.value.is_empty());
    }

    #[test]
    fn display_keeps_json_number_text() {
        assert_eq!(Reading::Value(json!(400)).display("—"), "400");
        assert_eq!(Reading::Value(json!(21.5)).display("—"), "21.5");
        assert_eq!(Reading::Value(json!("on")).display("—"), "on");
        assert_eq!(Reading::Unknown.display("—"), "—");
    }

    #[test]
    fn numeric_coercion_separates_absent_from_garbage() {
        assert_eq!(Reading::Value(json!("22.75")).as_number(), Some(22.75));
        assert_eq!(Reading::Value(json!("warm")).as_number(), None);
        assert_eq!(Reading::Value(json!({"x": 1})).as_number(), None);
        assert_eq!(Reading::Value(json!(true)).as_number(), Some(1.0));
        assert_eq!(Reading::Unknown.as_number(), None);
    }

    #[test]
    fn blank_strings_are_gaps_not_zero() {
        assert_eq!(Reading::Value(json!("")).as_number(), None);
        assert_eq!(Reading::Value(json!("   ")).as_number(), None);
        assert_eq!(Reading::Value(json!(" 0 ")).as_number(), Some(0.0));
    }
}
