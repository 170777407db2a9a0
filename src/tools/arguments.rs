//! Typed access to tool call arguments.

use serde_json::{Map, Value};

use crate::error::HostError;

/// Argument map handed to a collaborator, with typed extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments {
    values: Map<String, Value>,
}

impl ToolArguments {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Build from any JSON value; anything but an object becomes an empty map.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(values) => Self { values },
            _ => Self::default(),
        }
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, HostError> {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| HostError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Get an integer argument.
    pub fn get_i64(&self, key: &str) -> Result<i64, HostError> {
        self.values
            .get(key)
            .and_then(Value::as_i64)
            .ok_or_else(|| HostError::InvalidArgument(format!("Missing integer argument: {key}")))
    }

    /// Get a float argument.
    pub fn get_f64(&self, key: &str) -> Result<f64, HostError> {
        self.values
            .get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| HostError::InvalidArgument(format!("Missing float argument: {key}")))
    }

    /// Get a boolean argument.
    pub fn get_bool(&self, key: &str) -> Result<bool, HostError> {
        self.values
            .get(key)
            .and_then(Value::as_bool)
            .ok_or_else(|| HostError::InvalidArgument(format!("Missing boolean argument: {key}")))
    }

    /// Deserialize the whole map into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, HostError> {
        serde_json::from_value(Value::Object(self.values.clone())).map_err(|e| {
            HostError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}

impl From<Map<String, Value>> for ToolArguments {
    fn from(values: Map<String, Value>) -> Self {
        Self::new(values)
    }
}
