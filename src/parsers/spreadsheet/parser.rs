use std::io::Cursor;

use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};
use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use super::types::ExcelSerial;
use crate::errors::{StatementError, StatementResult};
use crate::parsers::traits::{GridParser, extension};
use crate::types::{RawCell, RawTable};

const EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Reads the first worksheet of an Excel or OpenDocument workbook.
pub struct SpreadsheetParser;

impl GridParser for SpreadsheetParser {
    fn is_supported(filename: &str) -> bool {
        extension(filename).is_some_and(|ext| EXTENSIONS.contains(&ext.as_str()))
    }

    fn parse(content: &[u8]) -> StatementResult<RawTable> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(content.to_vec()))
            .map_err(|e| StatementError::Spreadsheet(format!("Failed to open workbook: {e}")))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| StatementError::Spreadsheet("Workbook has no worksheets".to_string()))?
            .map_err(|e| StatementError::Spreadsheet(format!("Failed to read worksheet: {e}")))?;

        Ok(grid_from_range(&range))
    }
}

/// Places the used range back at A1 so cell positions match what the user sees.
fn grid_from_range(range: &Range<Data>) -> RawTable {
    let Some((start_row, start_col)) = range.start() else {
        return RawTable::default();
    };
    debug!("Worksheet used range starts at row {start_row}, column {start_col}");

    let mut rows: Vec<Vec<RawCell>> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells = vec![RawCell::Empty; start_col as usize];
        cells.extend(row.iter().map(cell_from_data));
        rows.push(cells);
    }
    RawTable::new(rows)
}

fn cell_from_data(data: &Data) -> RawCell {
    match data {
        Data::String(s) => RawCell::from(s.as_str()),
        Data::Float(f) => RawCell::Number(*f),
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::Bool(b) => RawCell::Text(b.to_string()),
        Data::DateTime(dt) => NaiveDate::try_from(ExcelSerial::from(*dt))
            .map(RawCell::Date)
            .unwrap_or(RawCell::Number(dt.as_f64())),
        Data::DateTimeIso(s) => parse_iso_date(s)
            .map(RawCell::Date)
            .unwrap_or_else(|| RawCell::from(s.as_str())),
        Data::DurationIso(s) => RawCell::from(s.as_str()),
        Data::Error(_) | Data::Empty => RawCell::Empty,
    }
}

fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}
