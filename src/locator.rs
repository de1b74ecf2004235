//! Finds where the real table starts inside a statement export.
//!
//! Banks put titles, account numbers and blank lines above the transactions.
//! The owner's anchor string (for example `"Data contabile"`) marks the header
//! row, and it is only searched for near the top-left corner.

use tracing::debug;

use crate::errors::{StatementError, StatementResult};
use crate::types::{RawCell, RawTable};

/// Rows searched for the anchor.
pub const HEADER_SEARCH_ROWS: usize = 10;
/// Columns searched for the anchor.
pub const HEADER_SEARCH_COLS: usize = 10;

/// Where the headers are, as reported by [`locate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderPosition {
    pub row: usize,
    pub col: usize,
}

/// The table below the header row, with labels taken from it.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<RawCell>>,
}

/// Searches the top-left window for a text cell equal to `anchor`.
///
/// The row is the first window row holding the anchor in any window column,
/// and the column is the first window column holding it in any window row.
/// The two are reduced independently, so with a repeated anchor they need not
/// meet at an anchor cell.
pub fn locate(table: &RawTable, anchor: &str) -> StatementResult<HeaderPosition> {
    let rows = HEADER_SEARCH_ROWS.min(table.height());
    let cols = HEADER_SEARCH_COLS;
    let is_anchor = |r: usize, c: usize| table.cell(r, c).as_text() == Some(anchor);

    let row = (0..rows).find(|&r| (0..cols).any(|c| is_anchor(r, c)));
    let col = (0..cols).find(|&c| (0..rows).any(|r| is_anchor(r, c)));

    match (row, col) {
        (Some(row), Some(col)) => {
            debug!("Header anchor '{anchor}' located at row {row}, column {col}");
            Ok(HeaderPosition { row, col })
        }
        _ => Err(StatementError::HeaderNotFound {
            anchor: anchor.to_string(),
        }),
    }
}

/// Cuts the table at `position`: labels from the header row, data from the next
/// row on, and nothing left of the header column.
///
/// Empty header cells are labelled `column_<n>` by absolute column index.
/// Rows with no content at all are dropped.
pub fn slice(table: &RawTable, position: HeaderPosition) -> HeaderedTable {
    let width = table.width().max(position.col);

    let columns = (position.col..width)
        .map(|c| match table.cell(position.row, c) {
            cell if cell.is_empty() => format!("column_{c}"),
            cell => cell.to_string(),
        })
        .collect::<Vec<_>>();

    let rows = (position.row + 1..table.height())
        .map(|r| {
            (position.col..width)
                .map(|c| table.cell(r, c).clone())
                .collect::<Vec<_>>()
        })
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect();

    HeaderedTable { columns, rows }
}

/// [`locate`] followed by [`slice`].
pub fn locate_and_slice(table: &RawTable, anchor: &str) -> StatementResult<HeaderedTable> {
    let position = locate(table, anchor)?;
    Ok(slice(table, position))
}
