use crate::common::config::AppConfig;
use crate::common::errors::AppError;
use crate::common::json::JsonUtil;
use crate::xlsx::drawing::{AnchorSummary, Drawing};
use crate::xlsx::merge_regions::MergeRegions;
use crate::xlsx::package::TemplatePackage;
use crate::xlsx::shared_strings::SharedStringTable;
use crate::xlsx::sheet_ref::SheetRef;
use crate::xlsx::worksheet::Worksheet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct InspectTemplateInput {
    path: String,
    #[serde(default)]
    sheet: SheetRef,
}

#[derive(Debug, Serialize)]
struct LabelCell {
    cell: String,
    text: String,
}

#[derive(Debug, Serialize)]
struct InspectTemplateOutput {
    path: String,
    sheets: Vec<String>,
    sheet: String,
    worksheet_part: String,
    drawing_part: Option<String>,
    shared_strings_part: Option<String>,
    shared_strings: usize,
    dimension: Option<String>,
    rows: usize,
    max_row: u32,
    merge_regions: Vec<String>,
    anchors: Vec<AnchorSummary>,
    labels: Vec<LabelCell>,
}

pub fn handle(params: Value) -> Result<Value, AppError> {
    // Read-only: lists what a layout author needs to map fields onto a template.
    let input: InspectTemplateInput = JsonUtil::from_value(params)?;
    let path = AppConfig::current().locator().resolve(&input.path)?;
    let mut package = TemplatePackage::from_path(&path)?;

    let sheets = package.sheet_names()?;
    let worksheet = package.resolve_worksheet_part(&input.sheet)?;
    let sheet = Worksheet::parse(&package.read_part(&worksheet.part)?)?;

    let shared_strings_part = package.shared_strings_part()?;
    let sst = match &shared_strings_part {
        Some(part) => Some(SharedStringTable::load(&package.read_part(part)?)?),
        None => None,
    };

    let drawing_part = package.drawing_part_for(&worksheet.part)?;
    let anchors = match &drawing_part {
        Some(part) => Drawing::parse(&package.read_part(part)?)?.summaries(),
        None => Vec::new(),
    };

    let merge_regions = MergeRegions::read(&sheet)?
        .iter()
        .map(|region| region.to_ref())
        .collect::<Result<Vec<_>, _>>()?;
    let labels = sheet
        .text_cells(sst.as_ref())
        .into_iter()
        .map(|(cell, text)| LabelCell { cell, text })
        .collect();

    JsonUtil::to_value(InspectTemplateOutput {
        path: path.display().to_string(),
        sheets,
        sheet: worksheet.name,
        worksheet_part: worksheet.part,
        drawing_part,
        shared_strings_part,
        shared_strings: sst.as_ref().map(SharedStringTable::len).unwrap_or(0),
        dimension: sheet.dimension().map(str::to_string),
        rows: sheet.row_numbers()?.len(),
        max_row: sheet.max_row()?,
        merge_regions,
        anchors,
        labels,
    })
}
