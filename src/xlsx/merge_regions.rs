use crate::common::errors::AppError;
use crate::xlsx::cell_address::{CellAddress, MAX_ROW};
use crate::xlsx::worksheet::Worksheet;
use crate::xlsx::xml_tree::{XmlElement, XmlNode};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Rectangular merged range, 1-based and inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeRegion {
    pub min_col: u32,
    pub min_row: u32,
    pub max_col: u32,
    pub max_row: u32,
}

impl MergeRegion {
    pub fn parse(reference: &str) -> Result<Self, AppError> {
        let (start, end) = reference.split_once(':').unwrap_or((reference, reference));
        let start = CellAddress::parse(start)?;
        let end = CellAddress::parse(end)?;
        let (a, b) = (start.column_number(), end.column_number());
        Ok(Self {
            min_col: a.min(b),
            min_row: start.row.min(end.row),
            max_col: a.max(b),
            max_row: start.row.max(end.row),
        })
    }

    pub fn to_ref(&self) -> Result<String, AppError> {
        let start = CellAddress::from_numbers(self.min_col, self.min_row)?;
        let end = CellAddress::from_numbers(self.max_col, self.max_row)?;
        Ok(format!("{start}:{end}"))
    }

    pub fn is_single_row(&self, row: u32) -> bool {
        self.min_row == row && self.max_row == row
    }
}

impl fmt::Display for MergeRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_ref() {
            Ok(reference) => f.write_str(&reference),
            Err(_) => write!(
                f,
                "R{}C{}:R{}C{}",
                self.min_row, self.min_col, self.max_row, self.max_col
            ),
        }
    }
}

/// Moves regions below `pivot_row` by `delta`. A region straddling the pivot
/// keeps its top edge and only stretches its bottom edge.
pub fn shift_merge_regions(
    regions: &mut [MergeRegion],
    pivot_row: u32,
    delta: i64,
) -> Result<usize, AppError> {
    let moved = |row: u32| -> Result<u32, AppError> {
        let target = i64::from(row) + delta;
        if target < 1 || target > i64::from(MAX_ROW) {
            return Err(AppError::InvalidInput(format!(
                "merge row {row} shifted by {delta} leaves the sheet"
            )));
        }
        Ok(target as u32)
    };

    let mut touched = 0;
    for region in regions.iter_mut() {
        if region.min_row >= pivot_row {
            region.min_row = moved(region.min_row)?;
            region.max_row = moved(region.max_row)?;
            touched += 1;
        } else if region.max_row >= pivot_row {
            region.max_row = moved(region.max_row)?.max(region.min_row);
            touched += 1;
        }
    }
    Ok(touched)
}

/// Copies every single-row merge of `source_row` onto `target_row`.
pub fn duplicate_merge_regions_for_row(
    regions: &[MergeRegion],
    source_row: u32,
    target_row: u32,
) -> Vec<MergeRegion> {
    regions
        .iter()
        .filter(|r| r.is_single_row(source_row))
        .map(|r| MergeRegion {
            min_row: target_row,
            max_row: target_row,
            ..*r
        })
        .collect()
}

pub struct MergeRegions;

impl MergeRegions {
    pub fn read(sheet: &Worksheet) -> Result<Vec<MergeRegion>, AppError> {
        let Some(merge_cells) = sheet.root().child("mergeCells") else {
            return Ok(Vec::new());
        };
        merge_cells
            .children_named("mergeCell")
            .filter_map(|m| m.attr("ref"))
            .map(MergeRegion::parse)
            .collect()
    }

    /// Replaces the `<mergeCell>` list and keeps `count` in step with it.
    pub fn write(sheet: &mut Worksheet, regions: &[MergeRegion]) -> Result<(), AppError> {
        let mut cells = Vec::with_capacity(regions.len());
        for region in regions {
            cells.push(XmlElement::new("mergeCell").with_attr("ref", &region.to_ref()?));
        }

        let root = sheet.root_mut();
        if root.child("mergeCells").is_none() {
            if regions.is_empty() {
                return Ok(());
            }
            // Schema order puts <mergeCells> right after the sheet-level
            // protection/scenario/filter/sort blocks that follow <sheetData>.
            let anchor = Self::insertion_point(root);
            root.children
                .insert(anchor, XmlNode::Element(XmlElement::new("mergeCells")));
        }
        if let Some(merge_cells) = root.child_mut("mergeCells") {
            merge_cells.children.clear();
            for cell in cells {
                merge_cells.push_element(cell);
            }
            merge_cells.set_attr("count", &regions.len().to_string());
        }
        Ok(())
    }

    fn insertion_point(root: &XmlElement) -> usize {
        const BEFORE: [&str; 9] = [
            "sheetData",
            "sheetCalcPr",
            "sheetProtection",
            "protectedRanges",
            "scenarios",
            "autoFilter",
            "sortState",
            "dataConsolidate",
            "customSheetViews",
        ];
        let mut at = root.children.len();
        for (idx, node) in root.children.iter().enumerate() {
            if let XmlNode::Element(el) = node {
                if BEFORE.contains(&el.local_name()) {
                    at = idx + 1;
                }
            }
        }
        at
    }

    /// Shifts stored regions and copies single-row merges of `source_row`
    /// onto each of `new_rows`.
    pub fn apply_expansion(
        sheet: &mut Worksheet,
        pivot_row: u32,
        delta: i64,
        source_row: u32,
        new_rows: impl IntoIterator<Item = u32>,
    ) -> Result<(), AppError> {
        let mut regions = Self::read(sheet)?;
        if regions.is_empty() {
            return Ok(());
        }
        let shifted = shift_merge_regions(&mut regions, pivot_row, delta)?;
        let mut added = Vec::new();
        for target in new_rows {
            added.extend(duplicate_merge_regions_for_row(&regions, source_row, target));
        }
        debug!(shifted, added = added.len(), "adjusted merge regions");
        regions.extend(added);
        Self::write(sheet, &regions)
    }
}
