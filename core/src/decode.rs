//! Tolerant decoding of HAT JSON into typed records.
//!
//! # Design
//! Scalar fields are tolerant: a missing field or one of the wrong JSON type
//! resolves to the field's default. Nested objects whose shape varies across
//! server versions are decoded strictly with serde; when that fails the
//! failure is logged and the sub-object is treated as absent. Lists decode
//! element by element and skip the elements that fail.
//!
//! Records may still declare required fields. Those are the only way a
//! record-level decode can fail.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("required field `{0}` is missing or malformed")]
    MissingField(&'static str),

    #[error("expected a JSON object")]
    NotAnObject,
}

/// A record built from one JSON object returned by the HAT.
pub trait HatRecord: Sized {
    fn from_json(map: &Map<String, Value>) -> Result<Self, DecodeError>;

    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        value
            .as_object()
            .ok_or(DecodeError::NotAnObject)
            .and_then(Self::from_json)
    }
}

/// Field accessor with per-field defaults.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key)
    }

    pub fn string(&self, key: &str, default: &str) -> String {
        self.opt_string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn opt_string(&self, key: &str) -> Option<String> {
        self.map.get(key).and_then(Value::as_str).map(str::to_string)
    }

    pub fn int(&self, key: &str, default: i64) -> i64 {
        self.map.get(key).and_then(Value::as_i64).unwrap_or(default)
    }

    pub fn float(&self, key: &str, default: f64) -> f64 {
        self.map.get(key).and_then(Value::as_f64).unwrap_or(default)
    }

    pub fn bool(&self, key: &str, default: bool) -> bool {
        self.map.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn string_list(&self, key: &str) -> Vec<String> {
        self.map
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A tolerant nested record; absent or non-object falls back to default.
    pub fn object<T: HatRecord + Default>(&self, key: &str) -> T {
        self.opt_object(key).unwrap_or_default()
    }

    pub fn opt_object<T: HatRecord>(&self, key: &str) -> Option<T> {
        let map = self.map.get(key)?.as_object()?;
        match T::from_json(map) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(field = key, error = %err, "nested record failed to decode");
                None
            }
        }
    }

    /// A nested object decoded strictly; any failure is logged and yields
    /// `None`.
    pub fn strict<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.map.get(key)?;
        if value.is_null() {
            return None;
        }
        match T::deserialize(value) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                warn!(field = key, error = %err, "strict sub-object failed to decode");
                None
            }
        }
    }

    pub fn required_string(&self, key: &'static str) -> Result<String, DecodeError> {
        self.opt_string(key).ok_or(DecodeError::MissingField(key))
    }

    pub fn required_object(&self, key: &'static str) -> Result<Fields<'a>, DecodeError> {
        self.map
            .get(key)
            .and_then(Value::as_object)
            .map(Fields::new)
            .ok_or(DecodeError::MissingField(key))
    }

    pub fn required_float(&self, key: &'static str) -> Result<f64, DecodeError> {
        self.map
            .get(key)
            .and_then(Value::as_f64)
            .ok_or(DecodeError::MissingField(key))
    }
}

/// Decode every element of `values`, skipping the ones that fail.
pub fn decode_list<T: HatRecord>(values: &[Value]) -> Vec<T> {
    values
        .iter()
        .filter_map(|value| match T::from_value(value) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(error = %err, "skipping list element that failed to decode");
                None
            }
        })
        .collect()
}

/// Strictly decode the value at `pointer` (e.g. `/data`) of every element,
/// skipping elements where it is missing or does not match `T`.
pub fn decode_strict_list<T: DeserializeOwned>(values: &[Value], pointer: &str) -> Vec<T> {
    values
        .iter()
        .filter_map(|value| {
            let target = value.pointer(pointer)?;
            match T::deserialize(target) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(pointer, error = %err, "skipping element that failed strict decode");
                    None
                }
            }
        })
        .collect()
}
