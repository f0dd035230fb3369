use crate::common::errors::AppError;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

/// Which worksheet of the workbook a layout or inspection targets.
///
/// Clients send `{"name": ..}`, `{"index": ..}`, a bare sheet name, a bare
/// index, or the object form JSON-encoded inside a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetRef {
    Name { name: String },
    Index { index: usize },
}

impl Default for SheetRef {
    fn default() -> Self {
        SheetRef::Index { index: 0 }
    }
}

impl SheetRef {
    /// Position and name of the selected sheet in workbook order.
    pub fn resolve_in_names(&self, sheet_names: &[String]) -> Result<(usize, String), AppError> {
        let found = match self {
            SheetRef::Name { name } => sheet_names.iter().position(|n| n == name),
            SheetRef::Index { index } => (*index < sheet_names.len()).then_some(*index),
        };
        found
            .map(|idx| (idx, sheet_names[idx].clone()))
            .ok_or_else(|| AppError::SheetNotFound(self.to_string()))
    }
}

impl std::fmt::Display for SheetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetRef::Name { name } => write!(f, "{name}"),
            SheetRef::Index { index } => write!(f, "#{index}"),
        }
    }
}

impl TryFrom<Value> for SheetRef {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(mut map) => match (map.remove("name"), map.remove("index")) {
                (Some(Value::String(name)), _) => Ok(SheetRef::Name { name }),
                (Some(_), _) => Err("sheet.name must be a string".to_string()),
                (None, Some(index)) => index_from(&index),
                (None, None) => Err("sheet needs a name or an index".to_string()),
            },
            Value::String(text) if text.trim_start().starts_with('{') => {
                let nested: Value = serde_json::from_str(text.trim())
                    .map_err(|_| "sheet string holds invalid JSON".to_string())?;
                SheetRef::try_from(nested)
            }
            Value::String(name) => Ok(SheetRef::Name { name }),
            number @ Value::Number(_) => index_from(&number),
            _ => Err("sheet must be an object, a name or an index".to_string()),
        }
    }
}

fn index_from(value: &Value) -> Result<SheetRef, String> {
    let index = match value {
        Value::Number(n) => n.as_u64().and_then(|i| usize::try_from(i).ok()),
        Value::String(text) => text.trim().parse::<usize>().ok(),
        _ => None,
    };
    index
        .map(|index| SheetRef::Index { index })
        .ok_or_else(|| "sheet.index must be a non-negative integer".to_string())
}

impl Serialize for SheetRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SheetRef::Name { name } => json!({ "name": name }),
            SheetRef::Index { index } => json!({ "index": index }),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SheetRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        SheetRef::try_from(Value::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}
