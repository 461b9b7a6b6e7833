//! Cell values
//!
//! [`RowValue`] is the closed set of shapes a cell can take once it leaves a
//! backend. Serialized form is tagged (`{"type": "binary", "value": "AAEC"}`)
//! so every variant, binary included, survives a JSON round trip.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One cell's value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum RowValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Binary(#[serde(with = "base64_bytes")] Vec<u8>),
    Timestamp(NaiveDateTime),
}

/// Column name to value, in caller order
pub type RowData = IndexMap<String, RowValue>;

impl RowValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RowValue::Null)
    }

    /// Convert an untagged JSON value as sent by a client
    ///
    /// Objects shaped like the tagged form are decoded as such, which is the
    /// only way to pass binary or timestamp values explicitly. Other objects
    /// and arrays become their JSON text.
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => RowValue::Null,
            Value::Bool(flag) => RowValue::Boolean(flag),
            Value::Number(number) => {
                if let Some(integer) = number.as_i64() {
                    RowValue::Integer(integer)
                } else if number.is_u64() {
                    // Beyond i64; keep the digits rather than lose precision
                    RowValue::Text(number.to_string())
                } else {
                    number
                        .as_f64()
                        .map(RowValue::Float)
                        .unwrap_or_else(|| RowValue::Text(number.to_string()))
                }
            }
            Value::String(text) => RowValue::Text(text),
            Value::Object(map) if is_tagged_shape(&map) => {
                let fallback = Value::Object(map.clone()).to_string();
                serde_json::from_value(Value::Object(map)).unwrap_or(RowValue::Text(fallback))
            }
            other => RowValue::Text(other.to_string()),
        }
    }
}

fn is_tagged_shape(map: &serde_json::Map<String, serde_json::Value>) -> bool {
    map.contains_key("type") && map.len() <= 2 && map.keys().all(|key| key == "type" || key == "value")
}

impl fmt::Display for RowValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowValue::Null => write!(f, "NULL"),
            RowValue::Integer(value) => write!(f, "{value}"),
            RowValue::Float(value) => write!(f, "{value}"),
            RowValue::Text(value) => write!(f, "{value}"),
            RowValue::Boolean(value) => write!(f, "{value}"),
            RowValue::Binary(bytes) => write!(f, "<{} bytes>", bytes.len()),
            RowValue::Timestamp(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for RowValue {
    fn from(value: i64) -> Self {
        RowValue::Integer(value)
    }
}

impl From<i32> for RowValue {
    fn from(value: i32) -> Self {
        RowValue::Integer(value.into())
    }
}

impl From<f64> for RowValue {
    fn from(value: f64) -> Self {
        RowValue::Float(value)
    }
}

impl From<bool> for RowValue {
    fn from(value: bool) -> Self {
        RowValue::Boolean(value)
    }
}

impl From<&str> for RowValue {
    fn from(value: &str) -> Self {
        RowValue::Text(value.to_string())
    }
}

impl From<String> for RowValue {
    fn from(value: String) -> Self {
        RowValue::Text(value)
    }
}

impl From<Vec<u8>> for RowValue {
    fn from(value: Vec<u8>) -> Self {
        RowValue::Binary(value)
    }
}

impl From<NaiveDateTime> for RowValue {
    fn from(value: NaiveDateTime) -> Self {
        RowValue::Timestamp(value)
    }
}

impl<T: Into<RowValue>> From<Option<T>> for RowValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RowValue::Null)
    }
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Serde adapters for request fields that carry untagged JSON values
pub mod plain {
    use super::*;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RowValue, D::Error> {
        Ok(RowValue::from_json(serde_json::Value::deserialize(deserializer)?))
    }

    pub fn deserialize_row<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RowData, D::Error> {
        let raw = IndexMap::<String, serde_json::Value>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|(column, value)| (column, RowValue::from_json(value)))
            .collect())
    }

    pub fn deserialize_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<RowValue>, D::Error> {
        let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
        Ok(raw.into_iter().map(RowValue::from_json).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_binary_survives_tagged_json() {
        let value = RowValue::Binary(vec![0, 159, 146, 150, 255]);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json, json!({ "type": "binary", "value": "AJ+Slv8=" }));
        assert_eq!(serde_json::from_value::<RowValue>(json).unwrap(), value);
    }

    #[test]
    fn test_null_serializes_without_content() {
        assert_eq!(serde_json::to_value(RowValue::Null).unwrap(), json!({ "type": "null" }));
    }

    #[test]
    fn test_from_json_maps_plain_values() {
        assert_eq!(RowValue::from_json(json!(null)), RowValue::Null);
        assert_eq!(RowValue::from_json(json!(42)), RowValue::Integer(42));
        assert_eq!(RowValue::from_json(json!(1.5)), RowValue::Float(1.5));
        assert_eq!(RowValue::from_json(json!(true)), RowValue::Boolean(true));
        assert_eq!(RowValue::from_json(json!("héllo")), RowValue::Text("héllo".into()));
        assert_eq!(
            RowValue::from_json(json!(u64::MAX)),
            RowValue::Text(u64::MAX.to_string())
        );
        assert_eq!(
            RowValue::from_json(json!({ "a": [1, 2] })),
            RowValue::Text(r#"{"a":[1,2]}"#.into())
        );
    }

    #[test]
    fn test_from_json_accepts_tagged_objects() {
        assert_eq!(
            RowValue::from_json(json!({ "type": "binary", "value": "AQI=" })),
            RowValue::Binary(vec![1, 2])
        );
        assert_eq!(
            RowValue::from_json(json!({ "type": "timestamp", "value": "2024-03-01T12:30:00" })),
            RowValue::Timestamp(
                NaiveDateTime::parse_from_str("2024-03-01 12:30:00", "%Y-%m-%d %H:%M:%S").unwrap()
            )
        );
        // Tagged-looking but not decodable stays as text
        assert_eq!(
            RowValue::from_json(json!({ "type": "binary", "value": "%%%" })),
            RowValue::Text(r#"{"type":"binary","value":"%%%"}"#.into())
        );
    }

    #[test]
    fn test_plain_row_keeps_column_order() {
        #[derive(Deserialize)]
        struct Body {
            #[serde(deserialize_with = "plain::deserialize_row")]
            data: RowData,
        }

        let body: Body =
            serde_json::from_str(r#"{ "data": { "zeta": 1, "alpha": "x", "mid": null } }"#).unwrap();
        let columns: Vec<&str> = body.data.keys().map(String::as_str).collect();
        assert_eq!(columns, vec!["zeta", "alpha", "mid"]);
        assert!(body.data["mid"].is_null());
    }
}
