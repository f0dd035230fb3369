use crate::common::errors::AppError;
use crate::xlsx::cell_address::CellAddress;
use crate::xlsx::shared_strings::SharedStringTable;
use crate::xlsx::xml_tree::{XmlDocument, XmlElement, XmlNode};
use std::cmp::Ordering;

/// Parsed worksheet part with row/cell accessors over `<sheetData>`.
#[derive(Debug, Clone)]
pub struct Worksheet {
    doc: XmlDocument,
}

impl Worksheet {
    pub fn parse(bytes: &[u8]) -> Result<Self, AppError> {
        let mut doc = XmlDocument::parse(bytes)?;
        if !doc.root.is("worksheet") {
            return Err(AppError::MalformedTemplate(format!(
                "worksheet root is <{}>",
                doc.root.name
            )));
        }
        let sheet_data = doc.root.child_mut("sheetData").ok_or_else(|| {
            AppError::MalformedTemplate("worksheet has no <sheetData>".to_string())
        })?;
        fill_implicit_references(sheet_data)?;
        Ok(Self { doc })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, AppError> {
        self.doc.to_bytes()
    }

    pub fn root(&self) -> &XmlElement {
        &self.doc.root
    }

    pub fn root_mut(&mut self) -> &mut XmlElement {
        &mut self.doc.root
    }

    pub fn sheet_data(&self) -> Result<&XmlElement, AppError> {
        self.doc
            .root
            .child("sheetData")
            .ok_or_else(|| AppError::MalformedTemplate("worksheet has no <sheetData>".to_string()))
    }

    pub fn sheet_data_mut(&mut self) -> Result<&mut XmlElement, AppError> {
        self.doc
            .root
            .child_mut("sheetData")
            .ok_or_else(|| AppError::MalformedTemplate("worksheet has no <sheetData>".to_string()))
    }

    pub fn row_numbers(&self) -> Result<Vec<u32>, AppError> {
        self.sheet_data()?
            .children_named("row")
            .map(row_number)
            .collect()
    }

    pub fn row(&self, number: u32) -> Option<&XmlElement> {
        self.sheet_data()
            .ok()?
            .children_named("row")
            .find(|row| row_number(row).ok() == Some(number))
    }

    /// Returns the `<row>` with this number, creating an empty one at its
    /// ascending position when the template has none.
    pub fn find_or_create_row(&mut self, number: u32) -> Result<&mut XmlElement, AppError> {
        let sheet_data = self.sheet_data_mut()?;

        let mut insert_at = sheet_data.children.len();
        let mut found = None;
        for (idx, node) in sheet_data.children.iter().enumerate() {
            let XmlNode::Element(el) = node else { continue };
            if !el.is("row") {
                continue;
            }
            let current = row_number(el)?;
            match current.cmp(&number) {
                Ordering::Equal => {
                    found = Some(idx);
                    break;
                }
                Ordering::Greater => {
                    insert_at = idx;
                    break;
                }
                Ordering::Less => {}
            }
        }

        let idx = match found {
            Some(idx) => idx,
            None => {
                let row = XmlElement::new("row").with_attr("r", &number.to_string());
                sheet_data.children.insert(insert_at, XmlNode::Element(row));
                insert_at
            }
        };
        match &mut sheet_data.children[idx] {
            XmlNode::Element(el) => Ok(el),
            _ => Err(AppError::MalformedTemplate(format!("row {number} vanished"))),
        }
    }

    /// Returns the `<c>` for `address`, inserting a new one so the row's cells
    /// stay ordered by column.
    pub fn find_or_create_cell(
        &mut self,
        address: &CellAddress,
    ) -> Result<&mut XmlElement, AppError> {
        let reference = address.to_a1();
        let target_col = address.column_number();
        let row = self.find_or_create_row(address.row)?;

        let mut insert_at = row.children.len();
        let mut found = None;
        for (idx, node) in row.children.iter().enumerate() {
            let XmlNode::Element(el) = node else { continue };
            if !el.is("c") {
                continue;
            }
            let Some(existing) = el.attr("r") else { continue };
            let existing = CellAddress::parse(existing)?;
            match existing.column_number().cmp(&target_col) {
                Ordering::Equal => {
                    found = Some(idx);
                    break;
                }
                Ordering::Greater => {
                    insert_at = idx;
                    break;
                }
                Ordering::Less => {}
            }
        }

        let idx = match found {
            Some(idx) => idx,
            None => {
                let cell = XmlElement::new("c").with_attr("r", &reference);
                row.children.insert(insert_at, XmlNode::Element(cell));
                insert_at
            }
        };
        match &mut row.children[idx] {
            XmlNode::Element(el) => Ok(el),
            _ => Err(AppError::MalformedTemplate(format!("cell {reference} vanished"))),
        }
    }

    pub fn cell(&self, address: &CellAddress) -> Option<&XmlElement> {
        let reference = address.to_a1();
        self.row(address.row)?
            .children_named("c")
            .find(|c| c.attr("r").map(|r| r.eq_ignore_ascii_case(&reference)) == Some(true))
    }

    /// Visible text of a cell, resolving shared-string indexes.
    pub fn cell_text(&self, address: &CellAddress, sst: Option<&SharedStringTable>) -> Option<String> {
        let cell = self.cell(address)?;
        displayed_text(cell, sst)
    }

    /// First cell, in row/column order, whose trimmed upper-cased text equals `label`.
    pub fn find_label(&self, label: &str, sst: Option<&SharedStringTable>) -> Option<CellAddress> {
        let wanted = label.trim().to_uppercase();
        let sheet_data = self.sheet_data().ok()?;
        for row in sheet_data.children_named("row") {
            for cell in row.children_named("c") {
                let Some(text) = displayed_text(cell, sst) else { continue };
                if text.trim().to_uppercase() == wanted {
                    if let Some(reference) = cell.attr("r") {
                        return CellAddress::parse(reference).ok();
                    }
                }
            }
        }
        None
    }

    /// All non-empty text cells, used when inspecting a template.
    pub fn text_cells(&self, sst: Option<&SharedStringTable>) -> Vec<(String, String)> {
        let mut out = Vec::new();
        let Ok(sheet_data) = self.sheet_data() else {
            return out;
        };
        for row in sheet_data.children_named("row") {
            for cell in row.children_named("c") {
                if !matches!(cell.attr("t"), Some("s") | Some("inlineStr") | Some("str")) {
                    continue;
                }
                let (Some(reference), Some(text)) = (cell.attr("r"), displayed_text(cell, sst)) else {
                    continue;
                };
                if !text.trim().is_empty() {
                    out.push((reference.to_string(), text.trim().to_string()));
                }
            }
        }
        out
    }

    pub fn dimension(&self) -> Option<&str> {
        self.doc.root.child("dimension")?.attr("ref")
    }

    /// Grows the `<dimension>` range so it covers `max_row`. Never shrinks it.
    pub fn extend_dimension(&mut self, max_row: u32) -> Result<bool, AppError> {
        let Some(dimension) = self.doc.root.child_mut("dimension") else {
            return Ok(false);
        };
        let Some(current) = dimension.attr("ref") else {
            return Ok(false);
        };
        let (start, end) = match current.split_once(':') {
            Some((start, end)) => (start.to_string(), end.to_string()),
            None => (current.to_string(), current.to_string()),
        };
        let start_addr = CellAddress::parse(&start)?;
        let end_addr = CellAddress::parse(&end)?;
        if end_addr.row >= max_row {
            return Ok(false);
        }
        let new_ref = format!("{}:{}", start_addr, end_addr.with_row(max_row));
        dimension.set_attr("ref", &new_ref);
        Ok(true)
    }

    pub fn max_row(&self) -> Result<u32, AppError> {
        Ok(self.row_numbers()?.into_iter().max().unwrap_or(0))
    }

    /// Checks the invariants consuming applications enforce silently: rows
    /// strictly ascending, cells ordered by column, every cell reference on
    /// its own row.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut previous_row = 0u32;
        for row in self.sheet_data()?.children_named("row") {
            let number = row_number(row)?;
            if number <= previous_row {
                return Err(AppError::MalformedTemplate(format!(
                    "row {number} follows row {previous_row}"
                )));
            }
            previous_row = number;

            let mut previous_col = 0u32;
            for cell in row.children_named("c") {
                let Some(reference) = cell.attr("r") else { continue };
                let address = CellAddress::parse(reference)?;
                if address.row != number {
                    return Err(AppError::MalformedTemplate(format!(
                        "cell {reference} sits in row {number}"
                    )));
                }
                let col = address.column_number();
                if col <= previous_col {
                    return Err(AppError::MalformedTemplate(format!(
                        "cell {reference} is out of column order in row {number}"
                    )));
                }
                previous_col = col;
            }
        }
        Ok(())
    }
}

pub fn row_number(row: &XmlElement) -> Result<u32, AppError> {
    row.attr("r")
        .and_then(|r| r.trim().parse::<u32>().ok())
        .filter(|n| *n > 0)
        .ok_or_else(|| AppError::MalformedTemplate("row without a valid r attribute".to_string()))
}

/// `r` is optional on `<row>` and `<c>`: a missing one means "right after
/// the previous sibling". Writing the inferred reference back keeps every
/// later lookup exact.
fn fill_implicit_references(sheet_data: &mut XmlElement) -> Result<(), AppError> {
    let mut previous_row = 0u32;
    for row in sheet_data.children_named_mut("row") {
        if row.attr("r").is_none() {
            row.attributes.insert(0, ("r".to_string(), (previous_row + 1).to_string()));
        }
        let number = row_number(row)?;
        previous_row = number;

        let mut previous_col = 0u32;
        for cell in row.children_named_mut("c") {
            if cell.attr("r").is_none() {
                let address = CellAddress::from_numbers(previous_col + 1, number)?;
                cell.attributes.insert(0, ("r".to_string(), address.to_a1()));
            }
            let reference = cell.attr("r").unwrap_or_default();
            previous_col = CellAddress::parse(reference)?.column_number();
        }
    }
    Ok(())
}

fn displayed_text(cell: &XmlElement, sst: Option<&SharedStringTable>) -> Option<String> {
    match cell.attr("t") {
        Some("s") => {
            let index: usize = cell.child("v")?.text().trim().parse().ok()?;
            sst?.get(index).map(str::to_string)
        }
        Some("inlineStr") => cell.child("is").map(|is| {
            is.descendants("t")
                .iter()
                .map(|t| t.text())
                .collect::<String>()
        }),
        _ => cell.child("v").map(|v| v.text()),
    }
}
