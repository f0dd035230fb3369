use crate::common::errors::AppError;
use crate::xlsx::cell_address::CellAddress;
use crate::xlsx::shared_strings::SharedStringTable;
use crate::xlsx::worksheet::Worksheet;
use crate::xlsx::xml_tree::XmlElement;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Value payload for one cell write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CellValue {
    Empty,
    // Literal written as-is; precision is the caller's concern.
    Number(String),
    InlineText(String),
    SharedText(String),
}

impl CellValue {
    pub fn number(literal: &str) -> Result<Self, AppError> {
        let literal = literal.trim();
        if !matches!(literal.parse::<f64>(), Ok(n) if n.is_finite()) {
            return Err(AppError::InvalidInput(format!(
                "not a numeric literal: {literal:?}"
            )));
        }
        Ok(CellValue::Number(literal.to_string()))
    }
}

pub struct CellWriter;

impl CellWriter {
    /// Writes `value` into the cell at `address`, creating row and cell when
    /// needed. Existing value children are always dropped first; the style
    /// index `s` is never touched.
    ///
    /// Shared text falls back to an inline string when the package has no
    /// shared-string part.
    pub fn set_value(
        sheet: &mut Worksheet,
        sst: Option<&mut SharedStringTable>,
        address: &CellAddress,
        value: &CellValue,
    ) -> Result<(), AppError> {
        let cell = sheet.find_or_create_cell(address)?;
        cell.children.clear();

        match value {
            CellValue::Empty => {
                cell.remove_attr("t");
            }
            CellValue::Number(literal) => {
                cell.remove_attr("t");
                cell.push_element(Self::value_element(literal));
            }
            CellValue::InlineText(text) => Self::write_inline(cell, text),
            CellValue::SharedText(text) => match sst {
                Some(sst) => {
                    let index = sst.get_or_create_index(text);
                    cell.set_attr("t", "s");
                    cell.push_element(Self::value_element(&index.to_string()));
                }
                None => {
                    debug!(cell = %address, "no shared string part; writing inline text");
                    Self::write_inline(cell, text);
                }
            },
        }
        Ok(())
    }

    pub fn clear(sheet: &mut Worksheet, address: &CellAddress) -> Result<(), AppError> {
        Self::set_value(sheet, None, address, &CellValue::Empty)
    }

    /// Points the cell at another style index and leaves its value alone.
    /// `None` falls back to the workbook default style.
    pub fn set_style(
        sheet: &mut Worksheet,
        address: &CellAddress,
        style: Option<&str>,
    ) -> Result<(), AppError> {
        let cell = sheet.find_or_create_cell(address)?;
        match style {
            Some(style) => {
                cell.set_attr("s", style);
            }
            None => {
                cell.remove_attr("s");
            }
        }
        Ok(())
    }

    fn write_inline(cell: &mut XmlElement, text: &str) {
        cell.set_attr("t", "inlineStr");
        let mut t = XmlElement::new("t");
        if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
            t.set_attr("xml:space", "preserve");
        }
        t.set_text(text);
        let mut is = XmlElement::new("is");
        is.push_element(t);
        cell.push_element(is);
    }

    fn value_element(text: &str) -> XmlElement {
        let mut v = XmlElement::new("v");
        v.set_text(text);
        v
    }
}
