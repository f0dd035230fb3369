use crate::common::errors::AppError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub struct JsonUtil;

impl JsonUtil {
    pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, AppError> {
        serde_json::from_value(value).map_err(|e| AppError::InvalidInput(e.to_string()))
    }

    pub fn to_value<T: Serialize>(value: T) -> Result<Value, AppError> {
        serde_json::to_value(value).map_err(|e| AppError::InvalidInput(e.to_string()))
    }

    pub fn to_pretty_text(value: &Value) -> String {
        serde_json::to_string_pretty(value)
            .unwrap_or_else(|_| "{\"error\":\"failed to render tool result\"}".to_string())
    }

    /// Human-readable kind of a JSON value, used in coercion error messages.
    pub fn kind_of(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}
