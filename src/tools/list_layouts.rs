use crate::common::errors::AppError;
use crate::common::json::JsonUtil;
use crate::xlsx::builtin_layouts::BuiltinLayouts;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
struct LayoutSummary {
    name: String,
    template: String,
    capacity: Option<u32>,
    first_row: Option<u32>,
    shapes: bool,
}

#[derive(Debug, Serialize)]
struct ListLayoutsOutput {
    layouts: Vec<LayoutSummary>,
}

pub fn handle(_params: Value) -> Result<Value, AppError> {
    let layouts = BuiltinLayouts::all()
        .into_iter()
        .map(|layout| LayoutSummary {
            capacity: layout.capacity(),
            first_row: layout.item_block.as_ref().map(|b| b.first_row),
            shapes: !layout.shapes.is_empty(),
            name: layout.name,
            template: layout.template,
        })
        .collect();
    JsonUtil::to_value(ListLayoutsOutput { layouts })
}
