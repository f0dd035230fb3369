use crate::common::errors::AppError;
use crate::xlsx::cell_address::CellAddress;
use crate::xlsx::cell_writer::{CellValue, CellWriter};
use crate::xlsx::drawing::{Drawing, LabelGroup};
use crate::xlsx::layout::{FieldSlot, ItemBlock, TemplateLayout};
use crate::xlsx::merge_regions::MergeRegions;
use crate::xlsx::package::TemplatePackage;
use crate::xlsx::payload::{coerce, shape_text, ReportPayload};
use crate::xlsx::row_region::RowExpansionPlan;
use crate::xlsx::shared_strings::SharedStringTable;
use crate::xlsx::sheet_ranges::{RangeShift, SheetRanges};
use crate::xlsx::worksheet::Worksheet;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub bytes: Vec<u8>,
    pub worksheet_part: String,
    pub items: usize,
    pub extra_rows: u32,
    pub replaced_parts: Vec<String>,
}

struct PendingWrite {
    address: CellAddress,
    value: CellValue,
    // Style index copied from another authored cell.
    style: Option<String>,
}

pub struct ReportEngine;

impl ReportEngine {
    /// Fills `template` according to `layout`. Either the whole document is
    /// produced or an error is returned; nothing partial ever escapes.
    pub fn generate(
        template: Vec<u8>,
        layout: &TemplateLayout,
        payload: &ReportPayload,
    ) -> Result<GeneratedReport, AppError> {
        layout.validate()?;
        let mut package = TemplatePackage::open(template)?;

        let worksheet_part = package.resolve_worksheet_part(&layout.sheet)?;
        let mut sheet = Worksheet::parse(&package.read_part(&worksheet_part.part)?)?;

        let sst_part = package.shared_strings_part()?;
        let mut sst = match &sst_part {
            Some(part) => Some(SharedStringTable::load(&package.read_part(part)?)?),
            None => {
                warn!(layout = %layout.name, "template has no shared string part; text is written inline");
                None
            }
        };

        // Every target is resolved against the template as authored, before
        // any row moves.
        let block = Self::resolve_block(layout.item_block.as_ref(), &sheet, sst.as_ref())?;
        let header = Self::resolve_slots(&layout.header, &payload.header, &sheet, sst.as_ref())?;
        let footer = Self::resolve_slots(&layout.footer, &payload.footer, &sheet, sst.as_ref())?;

        let plan = match &block {
            Some(block) => {
                if payload.items.len() < block.min_items {
                    return Err(AppError::InvalidInput(format!(
                        "layout {} needs at least {} items, got {}",
                        layout.name,
                        block.min_items,
                        payload.items.len()
                    )));
                }
                Some(RowExpansionPlan::new(
                    block.first_row,
                    block.capacity,
                    block.source_row,
                    payload.items.len(),
                )?)
            }
            None if !payload.items.is_empty() => {
                return Err(AppError::InvalidInput(format!(
                    "layout {} has no item block but {} items were given",
                    layout.name,
                    payload.items.len()
                )));
            }
            None => None,
        };

        let mut drawing_part = None;
        let mut drawing = None;
        let edits_shapes = !layout.shapes.is_empty()
            || !layout.shape_values.is_empty()
            || !layout.remove_anchors.is_empty();
        let needs_drawing = plan.map(|p| p.extra > 0).unwrap_or(false) || edits_shapes;
        if needs_drawing {
            if let Some(part) = package.drawing_part_for(&worksheet_part.part)? {
                drawing = Some(Drawing::parse(&package.read_part(&part)?)?);
                drawing_part = Some(part);
            } else if edits_shapes {
                warn!(layout = %layout.name, "worksheet has no drawing; shape edits skipped");
            }
        }
        // Selectors name anchors as authored, so these run before any shift.
        if let Some(drawing) = drawing.as_mut() {
            if !layout.remove_anchors.is_empty() {
                drawing.remove_anchors(&layout.remove_anchors)?;
            }
            Self::fill_shape_values(drawing, layout, payload)?;
        }

        let extra_rows = plan.map(|p| p.extra).unwrap_or(0);
        let mut workbook_update = None;
        if let (Some(plan), Some(block)) = (&plan, &block) {
            debug!(
                layout = %layout.name,
                items = payload.items.len(),
                capacity = plan.capacity,
                pivot_row = plan.pivot_row(),
                extra = plan.extra,
                "row expansion plan"
            );
            if plan.extra > 0 {
                plan.apply(&mut sheet)?;
                MergeRegions::apply_expansion(
                    &mut sheet,
                    plan.pivot_row(),
                    i64::from(plan.extra),
                    plan.source_row,
                    plan.new_rows(),
                )?;
                let shift = RangeShift {
                    pivot_row: plan.pivot_row(),
                    delta: i64::from(plan.extra),
                    source_row: plan.source_row,
                };
                SheetRanges::apply_shift(&mut sheet, &shift)?;
                let workbook_part = package.workbook_part()?;
                let mut workbook = package.read_xml(&workbook_part)?;
                if SheetRanges::shift_print_area(&mut workbook, worksheet_part.index, &shift)? {
                    workbook_update = Some((workbook_part, workbook.to_bytes()?));
                }
                if let Some(drawing) = drawing.as_mut() {
                    let pivot = block.drawing_pivot_row.unwrap_or(plan.pivot_row());
                    drawing.shift_anchors_from(pivot - 1, i64::from(plan.extra))?;
                }
                let max_row = sheet.max_row()?;
                sheet.extend_dimension(max_row)?;
            }
            Self::fill_items(&mut sheet, sst.as_mut(), block, plan, &payload.items)?;
        }

        for pending in header.into_iter().chain(footer) {
            let address = match &plan {
                Some(plan) => pending.address.with_row(plan.translate_row(pending.address.row)),
                None => pending.address,
            };
            CellWriter::set_value(&mut sheet, sst.as_mut(), &address, &pending.value)?;
            if let Some(style) = &pending.style {
                CellWriter::set_style(&mut sheet, &address, Some(style.as_str()))?;
            }
        }
        for cell in &layout.clear_cells {
            let address = CellAddress::parse(cell)?;
            let address = match &plan {
                Some(plan) => address.with_row(plan.translate_row(address.row)),
                None => address,
            };
            if sheet.cell(&address).is_some() {
                CellWriter::clear(&mut sheet, &address)?;
            }
        }

        if let Some(drawing) = drawing.as_mut() {
            let groups = Self::label_groups(layout, payload);
            if !groups.is_empty() {
                let written = drawing.inject_labeled_text(&groups);
                debug!(written, "injected shape labels");
            }
        }

        sheet.validate()?;

        let mut replacements = BTreeMap::new();
        replacements.insert(worksheet_part.part.clone(), sheet.to_bytes()?);
        if let Some((part, bytes)) = workbook_update {
            replacements.insert(part, bytes);
        }
        if let (Some(part), Some(sst)) = (&sst_part, sst.as_mut()) {
            if sst.is_dirty() {
                replacements.insert(part.clone(), sst.serialize()?);
            }
        }
        if let (Some(part), Some(drawing)) = (&drawing_part, &drawing) {
            if drawing.is_changed() {
                replacements.insert(part.clone(), drawing.to_bytes()?);
            }
        }

        let bytes = package.assemble(&replacements)?;
        let replaced_parts: Vec<String> = replacements.into_keys().collect();
        info!(
            layout = %layout.name,
            sheet = %worksheet_part.name,
            items = payload.items.len(),
            extra_rows,
            bytes = bytes.len(),
            "generated report"
        );
        Ok(GeneratedReport {
            bytes,
            worksheet_part: worksheet_part.part,
            items: payload.items.len(),
            extra_rows,
            replaced_parts,
        })
    }

    fn resolve_block(
        block: Option<&ItemBlock>,
        sheet: &Worksheet,
        sst: Option<&SharedStringTable>,
    ) -> Result<Option<ItemBlock>, AppError> {
        let Some(block) = block else {
            return Ok(None);
        };
        let Some(anchor) = &block.first_row_label else {
            return Ok(Some(block.clone()));
        };
        match sheet.find_label(&anchor.label, sst) {
            Some(found) => {
                let first_row = i64::from(found.row) + anchor.row_offset;
                let first_row = u32::try_from(first_row)
                    .ok()
                    .filter(|r| *r >= 1)
                    .ok_or_else(|| {
                        AppError::MalformedTemplate(format!(
                            "item block anchor {:?} points above the sheet",
                            anchor.label
                        ))
                    })?;
                debug!(label = %anchor.label, first_row, "item block located by label");
                Ok(Some(block.rebased(first_row)?))
            }
            None => {
                debug!(label = %anchor.label, "item block label not found; using authored rows");
                Ok(Some(block.clone()))
            }
        }
    }

    fn resolve_slots(
        slots: &[FieldSlot],
        values: &Map<String, Value>,
        sheet: &Worksheet,
        sst: Option<&SharedStringTable>,
    ) -> Result<Vec<PendingWrite>, AppError> {
        let mut out = Vec::new();
        for slot in slots {
            // Absent keys leave the template cell as authored.
            let Some(value) = values.get(&slot.field) else {
                continue;
            };
            let value = coerce(value, slot.kind, slot.boolean.as_ref(), &slot.field)?;
            let Some(address) = Self::slot_address(slot, sheet, sst)? else {
                warn!(field = %slot.field, label = ?slot.label, "slot target not found in template");
                continue;
            };
            let style = Self::borrowed_style(slot, sheet)?;
            out.push(PendingWrite {
                address,
                value,
                style,
            });
        }
        Ok(out)
    }

    fn borrowed_style(slot: &FieldSlot, sheet: &Worksheet) -> Result<Option<String>, AppError> {
        let Some(source) = &slot.style_from else {
            return Ok(None);
        };
        let style = sheet
            .cell(&CellAddress::parse(source)?)
            .and_then(|cell| cell.attr("s"))
            .map(str::to_string);
        if style.is_none() {
            debug!(field = %slot.field, source = %source, "style source has no style; keeping target style");
        }
        Ok(style)
    }

    fn slot_address(
        slot: &FieldSlot,
        sheet: &Worksheet,
        sst: Option<&SharedStringTable>,
    ) -> Result<Option<CellAddress>, AppError> {
        if let Some(label) = &slot.label {
            if let Some(found) = sheet.find_label(label, sst) {
                return found.offset(slot.col_offset, slot.row_offset).map(Some);
            }
        }
        slot.cell.as_deref().map(CellAddress::parse).transpose()
    }

    fn fill_items(
        sheet: &mut Worksheet,
        mut sst: Option<&mut SharedStringTable>,
        block: &ItemBlock,
        plan: &RowExpansionPlan,
        items: &[Map<String, Value>],
    ) -> Result<(), AppError> {
        for (idx, item) in items.iter().enumerate() {
            let row = plan.row_for_item(idx as u32);
            for column in &block.columns {
                let value = if column.sequence {
                    CellValue::Number((idx + 1).to_string())
                } else {
                    let field = column.field.as_deref().unwrap_or_default();
                    match item.get(field) {
                        Some(value) => coerce(
                            value,
                            column.kind,
                            column.boolean.as_ref(),
                            &format!("items[{idx}].{field}"),
                        )?,
                        None => CellValue::Empty,
                    }
                };
                let address = CellAddress::new(&column.column, row)?;
                CellWriter::set_value(sheet, sst.as_deref_mut(), &address, &value)?;
            }
        }

        for row in plan.unused_rows() {
            for column in &block.columns {
                let address = CellAddress::new(&column.column, row)?;
                if sheet.cell(&address).is_some() {
                    CellWriter::clear(sheet, &address)?;
                }
            }
        }
        Ok(())
    }

    /// A missing key leaves the shape as authored; `null` empties it.
    fn fill_shape_values(
        drawing: &mut Drawing,
        layout: &TemplateLayout,
        payload: &ReportPayload,
    ) -> Result<(), AppError> {
        for shape in &layout.shape_values {
            let text = match payload.lookup(&shape.field) {
                None => continue,
                Some(Value::Null) => String::new(),
                Some(value) => shape_text(value).unwrap_or_default(),
            };
            drawing.set_shape_text(&shape.anchor, &text, shape.align.as_deref())?;
        }
        Ok(())
    }

    fn label_groups(layout: &TemplateLayout, payload: &ReportPayload) -> Vec<LabelGroup> {
        layout
            .shapes
            .iter()
            .map(|group| LabelGroup {
                marker: group.marker.clone(),
                values: group
                    .labels
                    .iter()
                    .filter_map(|l| {
                        let text = shape_text(payload.lookup(&l.field)?)?;
                        Some((l.label.clone(), text))
                    })
                    .collect(),
            })
            .filter(|g| !g.values.is_empty())
            .collect()
    }
}
