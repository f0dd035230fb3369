use crate::common::config::AppConfig;
use crate::common::errors::AppError;
use crate::common::fs::FsUtil;
use crate::common::json::JsonUtil;
use crate::xlsx::builtin_layouts::BuiltinLayouts;
use crate::xlsx::engine::ReportEngine;
use crate::xlsx::layout::TemplateLayout;
use crate::xlsx::package::TemplatePackage;
use crate::xlsx::payload::ReportPayload;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LayoutArg {
    Name(String),
    Descriptor(Box<TemplateLayout>),
}

#[derive(Debug, Deserialize)]
struct GenerateReportInput {
    layout: LayoutArg,
    #[serde(default)]
    template_path: Option<String>,
    #[serde(default)]
    payload: ReportPayload,
    output_path: String,
    #[serde(default)]
    overwrite: bool,
}

#[derive(Debug, Serialize)]
struct GenerateReportOutput {
    written: bool,
    path: String,
    layout: String,
    bytes: usize,
    items: usize,
    extra_rows: u32,
}

pub fn handle(params: Value) -> Result<Value, AppError> {
    let input: GenerateReportInput = JsonUtil::from_value(params)?;
    let layout = match input.layout {
        LayoutArg::Name(name) => BuiltinLayouts::get(&name)?,
        LayoutArg::Descriptor(layout) => *layout,
    };

    // Fail before touching the template when the target is already taken.
    let output = FsUtil::resolve_xlsx_path(&input.output_path)?;
    if output.exists() && !input.overwrite {
        return Err(AppError::AlreadyExists(output.display().to_string()));
    }

    let template_id = input.template_path.as_deref().unwrap_or(&layout.template);
    let template_path = AppConfig::current().locator().resolve(template_id)?;
    let template = TemplatePackage::read_template(&template_path)?;

    let report = ReportEngine::generate(template, &layout, &input.payload)?;
    FsUtil::write_output(&output, &report.bytes, input.overwrite)?;

    JsonUtil::to_value(GenerateReportOutput {
        written: true,
        path: output.display().to_string(),
        layout: layout.name,
        bytes: report.bytes.len(),
        items: report.items,
        extra_rows: report.extra_rows,
    })
}
