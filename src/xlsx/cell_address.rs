use crate::common::errors::AppError;
use std::fmt;

pub const MAX_COLUMN: u32 = 16_384;
pub const MAX_ROW: u32 = 1_048_576;

/// A1-style cell reference: column letters plus a 1-based row number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellAddress {
    pub column: String,
    pub row: u32,
}

impl CellAddress {
    // Parses A1 notation (for example: B3, AA10); letters are upper-cased.
    pub fn parse(input: &str) -> Result<Self, AppError> {
        let (column, row) = parse_address(input)?;
        Ok(Self { column, row })
    }

    pub fn new(column: &str, row: u32) -> Result<Self, AppError> {
        let number = column_to_number(column)?;
        Self::from_numbers(number, row)
    }

    pub fn from_numbers(column: u32, row: u32) -> Result<Self, AppError> {
        if row == 0 || row > MAX_ROW {
            return Err(AppError::InvalidCellAddress(format!("row out of range: {row}")));
        }
        Ok(Self {
            column: number_to_column(column)?,
            row,
        })
    }

    pub fn column_number(&self) -> u32 {
        // Letters were validated on construction.
        self.column
            .bytes()
            .fold(0u32, |acc, b| acc * 26 + u32::from(b - b'A') + 1)
    }

    pub fn with_row(&self, row: u32) -> Self {
        Self {
            column: self.column.clone(),
            row,
        }
    }

    /// Moves the address by signed row/column offsets.
    pub fn offset(&self, columns: i64, rows: i64) -> Result<Self, AppError> {
        let col = i64::from(self.column_number()) + columns;
        let row = i64::from(self.row) + rows;
        if col < 1 || row < 1 {
            return Err(AppError::InvalidCellAddress(format!(
                "{self} offset by ({columns}, {rows}) leaves the sheet"
            )));
        }
        let col = u32::try_from(col)
            .map_err(|_| AppError::InvalidCellAddress(format!("column out of range: {col}")))?;
        let row = u32::try_from(row)
            .map_err(|_| AppError::InvalidCellAddress(format!("row out of range: {row}")))?;
        Self::from_numbers(col, row)
    }

    pub fn to_a1(&self) -> String {
        format!("{}{}", self.column, self.row)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column, self.row)
    }
}

/// Splits `"B20"` into `("B", 20)`. Lower-case letters are accepted and normalized.
pub fn parse_address(input: &str) -> Result<(String, u32), AppError> {
    if input.trim().is_empty() {
        return Err(AppError::InvalidCellAddress("address is empty".to_string()));
    }

    let mut letters = String::new();
    let mut digits = String::new();
    for ch in input.chars() {
        if ch.is_ascii_alphabetic() {
            if !digits.is_empty() {
                return Err(AppError::InvalidCellAddress(input.to_string()));
            }
            letters.push(ch.to_ascii_uppercase());
        } else if ch.is_ascii_digit() {
            digits.push(ch);
        } else {
            return Err(AppError::InvalidCellAddress(input.to_string()));
        }
    }

    if letters.is_empty() || digits.is_empty() {
        return Err(AppError::InvalidCellAddress(input.to_string()));
    }
    column_to_number(&letters)?;

    let row: u32 = digits
        .parse()
        .map_err(|_| AppError::InvalidCellAddress(input.to_string()))?;
    if row == 0 || row > MAX_ROW {
        return Err(AppError::InvalidCellAddress(input.to_string()));
    }
    Ok((letters, row))
}

/// Base-26 column letters to a 1-based number ('A' = 1, 'AA' = 27).
pub fn column_to_number(letters: &str) -> Result<u32, AppError> {
    if letters.is_empty() || letters.len() > 3 {
        return Err(AppError::InvalidCellAddress(format!(
            "invalid column letters: {letters:?}"
        )));
    }
    let mut number = 0u32;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(AppError::InvalidCellAddress(format!(
                "invalid column letters: {letters:?}"
            )));
        }
        number = number * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    if number > MAX_COLUMN {
        return Err(AppError::InvalidCellAddress(format!(
            "column beyond XFD: {letters}"
        )));
    }
    Ok(number)
}

pub fn number_to_column(number: u32) -> Result<String, AppError> {
    if number == 0 || number > MAX_COLUMN {
        return Err(AppError::InvalidCellAddress(format!(
            "column number out of range: {number}"
        )));
    }
    let mut col = number;
    let mut letters = String::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.insert(0, (b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    Ok(letters)
}
