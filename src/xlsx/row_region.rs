use crate::common::errors::AppError;
use crate::xlsx::cell_address::{CellAddress, MAX_ROW};
use crate::xlsx::worksheet::{row_number, Worksheet};
use crate::xlsx::xml_tree::{XmlElement, XmlNode};
use tracing::debug;

pub struct RowRegion;

impl RowRegion {
    /// Renumbers every row at or below `pivot_row` by `delta`, rewriting the
    /// cell references inside them. Returns how many rows moved.
    pub fn shift_rows_from(
        sheet: &mut Worksheet,
        pivot_row: u32,
        delta: i64,
    ) -> Result<usize, AppError> {
        if delta == 0 {
            return Ok(0);
        }
        let sheet_data = sheet.sheet_data_mut()?;

        let mut moving = Vec::new();
        let mut staying = Vec::new();
        for (idx, node) in sheet_data.children.iter().enumerate() {
            let XmlNode::Element(el) = node else { continue };
            if !el.is("row") {
                continue;
            }
            let number = row_number(el)?;
            if number >= pivot_row {
                moving.push((idx, number));
            } else {
                staying.push(number);
            }
        }
        if moving.is_empty() {
            return Ok(0);
        }

        for (_, number) in &moving {
            let target = i64::from(*number) + delta;
            if target < 1 || target > i64::from(MAX_ROW) {
                return Err(AppError::InvalidInput(format!(
                    "row {number} shifted by {delta} leaves the sheet"
                )));
            }
            if delta < 0 && staying.iter().any(|r| i64::from(*r) == target) {
                return Err(AppError::InvalidInput(format!(
                    "row {number} shifted by {delta} collides with row {target}"
                )));
            }
        }

        // Descending when growing so no two rows ever share a number.
        if delta > 0 {
            moving.reverse();
        }
        for (idx, number) in &moving {
            // Range was checked above.
            let target = (i64::from(*number) + delta) as u32;
            if let XmlNode::Element(row) = &mut sheet_data.children[*idx] {
                Self::renumber_row(row, target)?;
            }
        }
        debug!(pivot_row, delta, rows = moving.len(), "shifted rows");
        Ok(moving.len())
    }

    /// Copies the structure and styles of `source_row` to a new row
    /// `target_row`, with every cell value cleared.
    pub fn duplicate_row(
        sheet: &mut Worksheet,
        source_row: u32,
        target_row: u32,
    ) -> Result<(), AppError> {
        if target_row == 0 || target_row > MAX_ROW {
            return Err(AppError::InvalidInput(format!(
                "target row out of range: {target_row}"
            )));
        }
        if sheet.row(target_row).is_some() {
            return Err(AppError::InvalidInput(format!(
                "row {target_row} already exists"
            )));
        }
        let mut copy = sheet.row(source_row).cloned().ok_or_else(|| {
            AppError::MalformedTemplate(format!("template has no row {source_row} to copy"))
        })?;
        Self::renumber_row(&mut copy, target_row)?;
        for cell in copy.children_named_mut("c") {
            cell.children.clear();
            cell.remove_attr("t");
        }

        let sheet_data = sheet.sheet_data_mut()?;
        let mut insert_at = sheet_data.children.len();
        for (idx, node) in sheet_data.children.iter().enumerate() {
            let XmlNode::Element(el) = node else { continue };
            if el.is("row") && row_number(el)? > target_row {
                insert_at = idx;
                break;
            }
        }
        sheet_data.children.insert(insert_at, XmlNode::Element(copy));
        Ok(())
    }

    fn renumber_row(row: &mut XmlElement, target: u32) -> Result<(), AppError> {
        row.set_attr("r", &target.to_string());
        for cell in row.children_named_mut("c") {
            let Some(reference) = cell.attr("r") else { continue };
            let moved = CellAddress::parse(reference)?.with_row(target);
            cell.set_attr("r", &moved.to_a1());
        }
        Ok(())
    }
}

/// Shift/duplicate operations needed to fit `item_count` items into a block
/// authored with `capacity` rows starting at `first_row`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowExpansionPlan {
    pub first_row: u32,
    pub capacity: u32,
    pub source_row: u32,
    pub item_count: u32,
    pub extra: u32,
}

impl RowExpansionPlan {
    pub fn new(
        first_row: u32,
        capacity: u32,
        source_row: Option<u32>,
        item_count: usize,
    ) -> Result<Self, AppError> {
        if first_row == 0 || capacity == 0 {
            return Err(AppError::InvalidInput(
                "item block needs a first row and a capacity of at least 1".to_string(),
            ));
        }
        let last_authored = first_row
            .checked_add(capacity - 1)
            .filter(|row| *row < MAX_ROW)
            .ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "item block of {capacity} rows at row {first_row} leaves the sheet"
                ))
            })?;
        let source_row = source_row.unwrap_or(last_authored);
        if source_row < first_row || source_row > last_authored {
            return Err(AppError::InvalidInput(format!(
                "source row {source_row} is outside the item block {first_row}..={last_authored}"
            )));
        }
        let item_count = u32::try_from(item_count)
            .map_err(|_| AppError::InvalidInput("too many items".to_string()))?;
        let extra = item_count.saturating_sub(capacity);
        if u64::from(last_authored) + u64::from(extra) > u64::from(MAX_ROW) {
            return Err(AppError::InvalidInput(format!(
                "{item_count} items do not fit below row {first_row}"
            )));
        }
        Ok(Self {
            first_row,
            capacity,
            source_row,
            item_count,
            extra,
        })
    }

    /// First row after the authored block; everything from here moves down.
    pub fn pivot_row(&self) -> u32 {
        self.first_row + self.capacity
    }

    pub fn row_for_item(&self, index: u32) -> u32 {
        self.first_row + index
    }

    /// Authored rows left without an item.
    pub fn unused_rows(&self) -> impl Iterator<Item = u32> {
        (self.first_row + self.item_count.min(self.capacity))..self.pivot_row()
    }

    pub fn new_rows(&self) -> impl Iterator<Item = u32> {
        self.pivot_row()..(self.pivot_row() + self.extra)
    }

    /// Where a template row ends up once the plan has been applied.
    pub fn translate_row(&self, row: u32) -> u32 {
        if row >= self.pivot_row() {
            row + self.extra
        } else {
            row
        }
    }

    pub fn apply(&self, sheet: &mut Worksheet) -> Result<(), AppError> {
        if self.extra == 0 {
            return Ok(());
        }
        debug!(
            pivot_row = self.pivot_row(),
            extra = self.extra,
            source_row = self.source_row,
            "expanding item block"
        );
        RowRegion::shift_rows_from(sheet, self.pivot_row(), i64::from(self.extra))?;
        for target in self.new_rows() {
            RowRegion::duplicate_row(sheet, self.source_row, target)?;
        }
        Ok(())
    }
}
