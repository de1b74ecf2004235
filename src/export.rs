//! CSV export of a statement for spreadsheets and other tools.
//!
//! Text columns that only hold dates, like the anchor column `"Data contabile"`,
//! are written as dates too, so every date in the output is `YYYY-MM-DD`.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use csv::WriterBuilder;
use tracing::debug;

use crate::errors::{StatementError, StatementResult};
use crate::normalizer::parse_statement_date;
use crate::types::{ColumnKind, Statement, Value};

const EXPORT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Writes `statement` as CSV with a header row.
pub fn write_csv<W: Write>(statement: &Statement, writer: W) -> StatementResult<()> {
    let date_like = date_columns(statement);
    let mut writer = WriterBuilder::new().from_writer(writer);

    writer.write_record(statement.columns().iter().map(|c| c.name.as_str()))?;
    for row in statement.rows() {
        writer.write_record(
            row.iter()
                .zip(&date_like)
                .map(|(value, is_date)| export_value(value, *is_date)),
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Creates (or truncates) `path` and writes `statement` to it.
pub fn to_path(statement: &Statement, path: &Path) -> StatementResult<()> {
    let file = File::create(path).map_err(|e| StatementError::store_io(path, e))?;
    write_csv(statement, file)?;
    debug!("Exported {} rows to {}", statement.len(), path.display());
    Ok(())
}

/// For each column, whether it is written as dates.
fn date_columns(statement: &Statement) -> Vec<bool> {
    statement
        .columns()
        .iter()
        .enumerate()
        .map(|(i, column)| match column.kind {
            ColumnKind::Date => true,
            ColumnKind::Text => {
                let mut texts = statement.rows().iter().map(|row| &row[i]).filter(|v| !v.is_null()).peekable();
                texts.peek().is_some() && texts.all(|v| v.as_text().and_then(parse_any_date).is_some())
            }
            ColumnKind::Decimal | ColumnKind::Categorical => false,
        })
        .collect()
}

fn parse_any_date(s: &str) -> Option<NaiveDate> {
    parse_statement_date(s).or_else(|| NaiveDate::parse_from_str(s, EXPORT_DATE_FORMAT).ok())
}

fn export_value(value: &Value, is_date: bool) -> String {
    match value {
        Value::Null => String::new(),
        Value::Date(d) => d.format(EXPORT_DATE_FORMAT).to_string(),
        Value::Text(s) if is_date => parse_any_date(s)
            .map(|d| d.format(EXPORT_DATE_FORMAT).to_string())
            .unwrap_or_else(|| s.clone()),
        Value::Amount(a) => a.normalize().to_string(),
        Value::Text(s) => s.clone(),
    }
}
