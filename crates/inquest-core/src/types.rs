//! Shared value types used across the engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Argument payload handed to a flow when it is started or scheduled.
///
/// Wraps an arbitrary JSON value. Flow argument schemas are owned by the
/// remote endpoint; the engine treats them as opaque apart from the
/// shallow merge used when a configuration form is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FlowArgs(Value);

impl FlowArgs {
    /// Create a new argument payload from a JSON value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Borrow the underlying JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume the payload, returning the underlying JSON value.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Shallow-merge `self` over `defaults`.
    ///
    /// Keys present in `self` win. When either side is not a JSON object
    /// the non-object `self` wins outright, unless it is `null`, in which
    /// case the defaults are kept as-is.
    pub fn merged_over(&self, defaults: &FlowArgs) -> FlowArgs {
        match (&self.0, &defaults.0) {
            (Value::Object(overrides), Value::Object(base)) => {
                let mut merged = base.clone();
                for (key, value) in overrides {
                    merged.insert(key.clone(), value.clone());
                }
                FlowArgs(Value::Object(merged))
            }
            (Value::Null, _) => defaults.clone(),
            _ => self.clone(),
        }
    }
}

impl From<Value> for FlowArgs {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
