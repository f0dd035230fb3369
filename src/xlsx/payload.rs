use crate::common::errors::AppError;
use crate::common::json::JsonUtil;
use crate::xlsx::cell_writer::CellValue;
use crate::xlsx::layout::{BoolRendering, ValueKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Caller data for one generated document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    #[serde(default)]
    pub header: Map<String, Value>,
    #[serde(default)]
    pub items: Vec<Map<String, Value>>,
    #[serde(default)]
    pub footer: Map<String, Value>,
}

impl ReportPayload {
    /// Footer first, then header: signature shapes usually read footer fields.
    pub fn lookup(&self, field: &str) -> Option<&Value> {
        self.footer.get(field).or_else(|| self.header.get(field))
    }
}

/// Turns a payload value into a cell write of the slot's kind.
///
/// `null` and blank strings clear the cell. Booleans need a rendering on the
/// slot; arrays and objects are never valid cell content.
pub fn coerce(
    value: &Value,
    kind: ValueKind,
    boolean: Option<&BoolRendering>,
    field: &str,
) -> Result<CellValue, AppError> {
    let text = match value {
        Value::Null => return Ok(CellValue::Empty),
        Value::Bool(flag) => {
            let rendering = boolean.ok_or_else(|| {
                AppError::InvalidInput(format!("{field}: boolean given but the slot has no rendering"))
            })?;
            if *flag {
                rendering.when_true.clone()
            } else {
                rendering.when_false.clone()
            }
        }
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => {
            return Err(AppError::InvalidInput(format!(
                "{field}: expected a string, number or boolean, got {}",
                JsonUtil::kind_of(other)
            )))
        }
    };

    if text.trim().is_empty() {
        return Ok(CellValue::Empty);
    }
    match kind {
        ValueKind::Number => CellValue::number(&text)
            .map_err(|_| AppError::InvalidInput(format!("{field}: {text:?} is not a number"))),
        ValueKind::TextInline => Ok(CellValue::InlineText(text)),
        ValueKind::TextShared => Ok(CellValue::SharedText(text)),
    }
}

/// Plain text for a drawing label; `None` when there is nothing to show.
pub fn shape_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
