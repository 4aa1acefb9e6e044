use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Error reading Excel file: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("Error reading Excel file: workbook has no worksheets")]
    NoWorksheet,
    #[error("Error reading Excel file: column '{0}' not found")]
    MissingColumn(String),
}

/// Values of `column` from the first worksheet, in row order.
///
/// The first row is the header. Blank cells, whitespace-only strings and
/// error cells are skipped; numbers, booleans and dates are rendered as text.
pub fn extract_column(bytes: &[u8], column: &str) -> Result<Vec<String>, ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ParseError::NoWorksheet)??;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| ParseError::MissingColumn(column.to_string()))?;
    let index = header
        .iter()
        .position(|cell| cell_text(cell).as_deref() == Some(column))
        .ok_or_else(|| ParseError::MissingColumn(column.to_string()))?;

    Ok(rows
        .filter_map(|row| row.get(index))
        .filter_map(cell_text)
        .collect())
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(value) => {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        other => Some(other.to_string()),
    }
}
