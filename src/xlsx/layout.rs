use crate::common::errors::AppError;
use crate::xlsx::cell_address::{column_to_number, CellAddress, MAX_ROW};
use crate::xlsx::sheet_ref::SheetRef;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    #[default]
    TextShared,
    TextInline,
    Number,
}

/// How a boolean payload value is rendered into a cell (`SI`/`NO`, `X`/``).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoolRendering {
    pub when_true: String,
    #[serde(default)]
    pub when_false: String,
}

/// One header or footer value. The target is the cell found next to `label`
/// when the label exists in the sheet, otherwise the fixed `cell`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSlot {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub col_offset: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub row_offset: i64,
    #[serde(default)]
    pub kind: ValueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean: Option<BoolRendering>,
    // Authored cell whose style index is copied onto the target after the write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_from: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemColumn {
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    // Writes the 1-based item number instead of a payload field.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sequence: bool,
    #[serde(default)]
    pub kind: ValueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean: Option<BoolRendering>,
}

/// Locates the item block from a worksheet label instead of a fixed row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowAnchor {
    pub label: String,
    #[serde(default)]
    pub row_offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemBlock {
    pub first_row: u32,
    pub capacity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_row: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawing_pivot_row: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_row_label: Option<RowAnchor>,
    #[serde(default)]
    pub min_items: usize,
    pub columns: Vec<ItemColumn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeLabel {
    pub label: String,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeGroup {
    pub marker: String,
    pub labels: Vec<ShapeLabel>,
}

/// Picks drawing anchors by what a template author can see in the sheet:
/// the shape name (`xdr:cNvPr/@name`) or where its top-left corner sits.
/// Coordinates refer to the template as authored, before rows move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorSelector {
    Name(String),
    // A1 cell holding the anchor's `from` corner.
    FromCell(String),
    // Every anchor whose `from` row is this 1-based row or further down.
    FromRowAtLeast(u32),
}

/// A payload value written as the whole text of one drawing shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeValue {
    pub field: String,
    pub anchor: AnchorSelector,
    // DrawingML paragraph alignment: l, ctr, r, just or dist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
}

/// Everything that distinguishes one document type from another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateLayout {
    pub name: String,
    pub template: String,
    #[serde(default)]
    pub sheet: SheetRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_block: Option<ItemBlock>,
    #[serde(default)]
    pub header: Vec<FieldSlot>,
    #[serde(default)]
    pub footer: Vec<FieldSlot>,
    #[serde(default)]
    pub shapes: Vec<ShapeGroup>,
    // Template leftovers blanked on every run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clear_cells: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shape_values: Vec<ShapeValue>,
    // Template shapes dropped on every run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_anchors: Vec<AnchorSelector>,
}

const PARAGRAPH_ALIGNMENTS: [&str; 5] = ["l", "ctr", "r", "just", "dist"];

fn is_zero(value: &i64) -> bool {
    *value == 0
}

impl FieldSlot {
    pub fn at(field: &str, cell: &str) -> Self {
        Self {
            field: field.to_string(),
            cell: Some(cell.to_string()),
            label: None,
            col_offset: 0,
            row_offset: 0,
            kind: ValueKind::default(),
            boolean: None,
            style_from: None,
        }
    }

    pub fn beside(field: &str, label: &str, col_offset: i64, row_offset: i64) -> Self {
        Self {
            field: field.to_string(),
            cell: None,
            label: Some(label.to_string()),
            col_offset,
            row_offset,
            kind: ValueKind::default(),
            boolean: None,
            style_from: None,
        }
    }

    pub fn or_at(mut self, cell: &str) -> Self {
        self.cell = Some(cell.to_string());
        self
    }

    pub fn number(mut self) -> Self {
        self.kind = ValueKind::Number;
        self
    }

    pub fn inline(mut self) -> Self {
        self.kind = ValueKind::TextInline;
        self
    }

    pub fn boolean(mut self, when_true: &str, when_false: &str) -> Self {
        self.boolean = Some(BoolRendering {
            when_true: when_true.to_string(),
            when_false: when_false.to_string(),
        });
        self
    }

    pub fn style_from(mut self, cell: &str) -> Self {
        self.style_from = Some(cell.to_string());
        self
    }

    fn validate(&self, section: &str) -> Result<(), AppError> {
        if self.field.trim().is_empty() {
            return Err(AppError::InvalidInput(format!(
                "{section} slot has an empty field name"
            )));
        }
        for cell in self.cell.iter().chain(&self.style_from) {
            CellAddress::parse(cell).map_err(|_| {
                AppError::InvalidInput(format!(
                    "{section}.{}: invalid cell {cell:?}",
                    self.field
                ))
            })?;
        }
        match &self.label {
            Some(label) if label.trim().is_empty() => Err(AppError::InvalidInput(format!(
                "{section}.{}: empty label",
                self.field
            ))),
            None if self.cell.is_none() => Err(AppError::InvalidInput(format!(
                "{section}.{}: needs a cell or a label",
                self.field
            ))),
            _ => Ok(()),
        }
    }
}

impl ItemColumn {
    pub fn field(column: &str, field: &str) -> Self {
        Self {
            column: column.to_string(),
            field: Some(field.to_string()),
            sequence: false,
            kind: ValueKind::default(),
            boolean: None,
        }
    }

    pub fn sequence(column: &str) -> Self {
        Self {
            column: column.to_string(),
            field: None,
            sequence: true,
            kind: ValueKind::Number,
            boolean: None,
        }
    }

    pub fn number(mut self) -> Self {
        self.kind = ValueKind::Number;
        self
    }

    pub fn inline(mut self) -> Self {
        self.kind = ValueKind::TextInline;
        self
    }

    pub fn boolean(mut self, when_true: &str, when_false: &str) -> Self {
        self.boolean = Some(BoolRendering {
            when_true: when_true.to_string(),
            when_false: when_false.to_string(),
        });
        self
    }
}

impl ShapeGroup {
    pub fn new(marker: &str, labels: &[(&str, &str)]) -> Self {
        Self {
            marker: marker.to_string(),
            labels: labels
                .iter()
                .map(|(label, field)| ShapeLabel {
                    label: label.to_string(),
                    field: field.to_string(),
                })
                .collect(),
        }
    }
}

impl AnchorSelector {
    fn validate(&self) -> Result<(), AppError> {
        match self {
            AnchorSelector::Name(name) if name.trim().is_empty() => Err(AppError::InvalidInput(
                "anchor selector has an empty shape name".to_string(),
            )),
            AnchorSelector::FromCell(cell) => CellAddress::parse(cell)
                .map(|_| ())
                .map_err(|_| AppError::InvalidInput(format!("invalid anchor cell {cell:?}"))),
            AnchorSelector::FromRowAtLeast(0) => Err(AppError::InvalidInput(
                "anchor selector rows are 1-based".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl ShapeValue {
    pub fn at(field: &str, anchor: AnchorSelector) -> Self {
        Self {
            field: field.to_string(),
            anchor,
            align: None,
        }
    }

    pub fn aligned(mut self, align: &str) -> Self {
        self.align = Some(align.to_string());
        self
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.field.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "shape value has an empty field name".to_string(),
            ));
        }
        if let Some(align) = &self.align {
            if !PARAGRAPH_ALIGNMENTS.contains(&align.as_str()) {
                return Err(AppError::InvalidInput(format!(
                    "shape value {}: unknown alignment {align:?}",
                    self.field
                )));
            }
        }
        self.anchor.validate()
    }
}

impl ItemBlock {
    pub fn last_authored_row(&self) -> u32 {
        self.first_row + self.capacity.saturating_sub(1)
    }

    /// Same block moved so it starts at `first_row`; source and drawing
    /// pivot rows move with it.
    pub fn rebased(&self, first_row: u32) -> Result<Self, AppError> {
        let delta = i64::from(first_row) - i64::from(self.first_row);
        let shift = |row: u32| -> Result<u32, AppError> {
            u32::try_from(i64::from(row) + delta)
                .ok()
                .filter(|r| *r >= 1 && *r <= MAX_ROW)
                .ok_or_else(|| {
                    AppError::MalformedTemplate(format!(
                        "item block anchor moves row {row} off the sheet"
                    ))
                })
        };
        Ok(Self {
            first_row,
            source_row: self.source_row.map(&shift).transpose()?,
            drawing_pivot_row: self.drawing_pivot_row.map(&shift).transpose()?,
            ..self.clone()
        })
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.first_row == 0 {
            return Err(AppError::InvalidInput(
                "item_block.first_row must be at least 1".to_string(),
            ));
        }
        if self.capacity == 0 {
            return Err(AppError::InvalidInput(
                "item_block.capacity must be at least 1".to_string(),
            ));
        }
        if u64::from(self.first_row) + u64::from(self.capacity) > u64::from(MAX_ROW) {
            return Err(AppError::InvalidInput(
                "item_block runs past the last sheet row".to_string(),
            ));
        }
        if let Some(source) = self.source_row {
            if source < self.first_row || source > self.last_authored_row() {
                return Err(AppError::InvalidInput(format!(
                    "item_block.source_row {source} is outside rows {}..={}",
                    self.first_row,
                    self.last_authored_row()
                )));
            }
        }
        if self.drawing_pivot_row == Some(0) {
            return Err(AppError::InvalidInput(
                "item_block.drawing_pivot_row is 1-based".to_string(),
            ));
        }
        if self.columns.is_empty() {
            return Err(AppError::InvalidInput(
                "item_block.columns is empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            let number = column_to_number(&column.column).map_err(|_| {
                AppError::InvalidInput(format!("invalid item column {:?}", column.column))
            })?;
            if !seen.insert(number) {
                return Err(AppError::InvalidInput(format!(
                    "item column {} is mapped twice",
                    column.column
                )));
            }
            match (&column.field, column.sequence) {
                (Some(field), false) if !field.trim().is_empty() => {}
                (None, true) => {}
                _ => {
                    return Err(AppError::InvalidInput(format!(
                        "item column {} needs exactly one of field or sequence",
                        column.column
                    )))
                }
            }
        }
        Ok(())
    }
}

impl TemplateLayout {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::InvalidInput("layout name is empty".to_string()));
        }
        if self.template.trim().is_empty() {
            return Err(AppError::InvalidInput(format!(
                "layout {} has no template",
                self.name
            )));
        }
        if let Some(block) = &self.item_block {
            block.validate()?;
        }
        for slot in &self.header {
            slot.validate("header")?;
        }
        for slot in &self.footer {
            slot.validate("footer")?;
        }
        for group in &self.shapes {
            if group.marker.trim().is_empty() || group.labels.is_empty() {
                return Err(AppError::InvalidInput(
                    "shape groups need a marker and at least one label".to_string(),
                ));
            }
        }
        for cell in &self.clear_cells {
            CellAddress::parse(cell)
                .map_err(|_| AppError::InvalidInput(format!("invalid clear cell {cell:?}")))?;
        }
        for shape in &self.shape_values {
            shape.validate()?;
        }
        for selector in &self.remove_anchors {
            selector.validate()?;
        }
        Ok(())
    }

    pub fn capacity(&self) -> Option<u32> {
        self.item_block.as_ref().map(|b| b.capacity)
    }
}
