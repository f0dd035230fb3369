use crate::common::errors::AppError;
use crate::xlsx::cell_address::CellAddress;
use crate::xlsx::merge_regions::{shift_merge_regions, MergeRegion};
use crate::xlsx::worksheet::Worksheet;
use crate::xlsx::xml_tree::{XmlDocument, XmlElement};
use tracing::debug;

const PRINT_AREA: &str = "_xlnm.Print_Area";

/// Row expansion as seen by range references: rows from `pivot_row` move
/// down by `delta`, new rows are copies of `source_row`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeShift {
    pub pivot_row: u32,
    pub delta: i64,
    pub source_row: u32,
}

impl RangeShift {
    /// Same rule as merged ranges. A range that covers the source row and
    /// stops right above the pivot also grows over the new rows.
    fn apply(&self, region: &mut MergeRegion, grow_with_block: bool) -> Result<(), AppError> {
        shift_merge_regions(std::slice::from_mut(region), self.pivot_row, self.delta)?;
        let ends_on_block = region.min_row <= self.source_row
            && region.max_row >= self.source_row
            && region.max_row + 1 == self.pivot_row;
        if let Ok(extra) = u32::try_from(self.delta) {
            if grow_with_block && ends_on_block {
                region.max_row += extra;
            }
        }
        Ok(())
    }

    /// Rewrites a space-separated list of A1 ranges. Tokens that are not
    /// plain cell ranges (whole columns, whole rows) are kept as written.
    pub fn shift_sqref(&self, sqref: &str, grow_with_block: bool) -> Result<String, AppError> {
        let mut out = Vec::new();
        for token in sqref.split_whitespace() {
            match MergeRegion::parse(token) {
                Ok(mut region) => {
                    self.apply(&mut region, grow_with_block)?;
                    out.push(region_ref(&region, !token.contains(':'), false)?);
                }
                Err(_) => out.push(token.to_string()),
            }
        }
        Ok(out.join(" "))
    }

    /// Rewrites a defined-name formula such as `'Hoja 1'!$A$1:$N$40`; every
    /// comma-separated area is shifted on its own.
    pub fn shift_area_formula(&self, formula: &str) -> Result<String, AppError> {
        let mut out = Vec::new();
        for area in formula.split(',') {
            let Some((sheet, range)) = area.rsplit_once('!') else {
                out.push(area.to_string());
                continue;
            };
            let plain = range.replace('$', "");
            match MergeRegion::parse(&plain) {
                Ok(mut region) => {
                    self.apply(&mut region, false)?;
                    let absolute = range.contains('$');
                    out.push(format!(
                        "{sheet}!{}",
                        region_ref(&region, !plain.contains(':'), absolute)?
                    ));
                }
                Err(_) => out.push(area.to_string()),
            }
        }
        Ok(out.join(","))
    }
}

fn region_ref(region: &MergeRegion, single: bool, absolute: bool) -> Result<String, AppError> {
    let corner = |col: u32, row: u32| -> Result<String, AppError> {
        let address = CellAddress::from_numbers(col, row)?;
        Ok(if absolute {
            format!("${}${}", address.column, address.row)
        } else {
            address.to_a1()
        })
    };
    let start = corner(region.min_col, region.min_row)?;
    if single && region.min_row == region.max_row && region.min_col == region.max_col {
        return Ok(start);
    }
    Ok(format!("{start}:{}", corner(region.max_col, region.max_row)?))
}

pub struct SheetRanges;

impl SheetRanges {
    /// Moves the `sqref` of conditional formats and data validations and the
    /// `ref` of hyperlinks. Formulas are left as written.
    pub fn apply_shift(sheet: &mut Worksheet, shift: &RangeShift) -> Result<usize, AppError> {
        let mut touched = 0;
        let root = sheet.root_mut();
        for formatting in root.children_named_mut("conditionalFormatting") {
            touched += Self::rewrite(formatting, "sqref", |v| shift.shift_sqref(v, true))?;
        }
        if let Some(validations) = root.child_mut("dataValidations") {
            for validation in validations.children_named_mut("dataValidation") {
                touched += Self::rewrite(validation, "sqref", |v| shift.shift_sqref(v, true))?;
            }
        }
        if let Some(links) = root.child_mut("hyperlinks") {
            for link in links.children_named_mut("hyperlink") {
                touched += Self::rewrite(link, "ref", |v| shift.shift_sqref(v, false))?;
            }
        }
        debug!(touched, "shifted sheet range references");
        Ok(touched)
    }

    fn rewrite<F>(element: &mut XmlElement, key: &str, f: F) -> Result<usize, AppError>
    where
        F: Fn(&str) -> Result<String, AppError>,
    {
        let Some(current) = element.attr(key) else {
            return Ok(0);
        };
        let updated = f(current)?;
        if updated == current {
            return Ok(0);
        }
        element.set_attr(key, &updated);
        Ok(1)
    }

    /// Shifts the print area the workbook defines for the sheet at
    /// `sheet_index`. Returns whether the workbook part changed.
    pub fn shift_print_area(
        workbook: &mut XmlDocument,
        sheet_index: usize,
        shift: &RangeShift,
    ) -> Result<bool, AppError> {
        let Some(names) = workbook.root.child_mut("definedNames") else {
            return Ok(false);
        };
        let local_id = sheet_index.to_string();
        let mut changed = false;
        for name in names.children_named_mut("definedName") {
            let is_print_area = name.attr("name") == Some(PRINT_AREA)
                && name.attr("localSheetId") == Some(local_id.as_str());
            if !is_print_area {
                continue;
            }
            let formula = name.text();
            let updated = shift.shift_area_formula(&formula)?;
            if updated != formula {
                debug!(from = %formula, to = %updated, "shifted print area");
                name.set_text(&updated);
                changed = true;
            }
        }
        Ok(changed)
    }
}
