use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::HeaderNames;
use crate::errors::{StatementError, StatementResult};

/// Display format used for dates shown to the user and found in statements.
pub const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y";

/// One cell of an uploaded grid, before any header is known.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawCell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl RawCell {
    pub fn is_empty(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawCell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for RawCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawCell::Empty => Ok(()),
            RawCell::Text(s) => f.write_str(s),
            RawCell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            RawCell::Number(n) => write!(f, "{n}"),
            RawCell::Date(d) => write!(f, "{}", d.format(DISPLAY_DATE_FORMAT)),
        }
    }
}

impl From<&str> for RawCell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            RawCell::Empty
        } else {
            RawCell::Text(value.to_string())
        }
    }
}

impl From<String> for RawCell {
    fn from(value: String) -> Self {
        if value.is_empty() {
            RawCell::Empty
        } else {
            RawCell::Text(value)
        }
    }
}

/// Positionally addressed grid with no assumed header row.
///
/// Rows may be ragged; reading outside a row yields [`RawCell::Empty`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    rows: Vec<Vec<RawCell>>,
}

static EMPTY_CELL: RawCell = RawCell::Empty;

impl RawTable {
    pub fn new(rows: Vec<Vec<RawCell>>) -> Self {
        Self { rows }
    }

    /// Builds a table of text cells; empty strings become empty cells.
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = C>,
        C: Into<RawCell>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> &RawCell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn rows(&self) -> &[Vec<RawCell>] {
        &self.rows
    }
}

/// Declared type of a statement column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Date,
    Decimal,
    Categorical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A typed statement cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Date(NaiveDate),
    Amount(Decimal),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_amount(&self) -> Option<Decimal> {
        match self {
            Value::Amount(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text cell, or null when the text is empty.
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() { Value::Null } else { Value::Text(s) }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Date(d) => write!(f, "{}", d.format(DISPLAY_DATE_FORMAT)),
            Value::Amount(a) => write!(f, "{a}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&RawCell> for Value {
    fn from(cell: &RawCell) -> Self {
        match cell {
            RawCell::Empty => Value::Null,
            other => Value::text(other.to_string()),
        }
    }
}

/// A normalized statement: typed columns over row-major values.
///
/// Every row has exactly one value per column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Statement {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn require_column(&self, name: &str) -> StatementResult<usize> {
        self.column_index(name)
            .ok_or_else(|| StatementError::MissingColumn(name.to_string()))
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Replaces the named column's values and type, appending the column when absent.
    ///
    /// Missing trailing values are filled with nulls.
    pub fn set_column(&mut self, name: &str, kind: ColumnKind, values: Vec<Value>) {
        let mut values = values.into_iter();
        match self.column_index(name) {
            Some(idx) => {
                self.columns[idx].kind = kind;
                for row in &mut self.rows {
                    row[idx] = values.next().unwrap_or(Value::Null);
                }
            }
            None => {
                self.columns.push(Column::new(name, kind));
                for row in &mut self.rows {
                    row.push(values.next().unwrap_or(Value::Null));
                }
            }
        }
    }

    /// New statement with the same columns holding the given rows, in the given order.
    pub fn select(&self, indices: impl IntoIterator<Item = usize>) -> Statement {
        Statement {
            columns: self.columns.clone(),
            rows: indices
                .into_iter()
                .filter_map(|i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Row-oriented view: one mapping of column name to value per row.
    pub fn records(&self) -> Vec<BTreeMap<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(c, v)| (c.name.clone(), v.clone()))
                    .collect()
            })
            .collect()
    }

    /// Typed per-row view using an owner's header names.
    pub fn transactions(&self, headers: &HeaderNames) -> StatementResult<Vec<Transaction>> {
        let date = self.require_column(&headers.date)?;
        let value = self.require_column(&headers.value)?;
        let descript = self.require_column(&headers.descript)?;
        let category = self.column_index(&headers.category);

        Ok(self
            .rows
            .iter()
            .map(|row| Transaction {
                date: row[date].as_date(),
                amount: row[value].as_amount(),
                description: row[descript].to_string(),
                category: category
                    .map(|i| row[i].to_string())
                    .unwrap_or_else(|| crate::categorizer::UNCATEGORIZED.to_string()),
                extra: self
                    .columns
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| ![Some(date), Some(value), Some(descript), category].contains(&Some(*i)))
                    .map(|(i, c)| (c.name.clone(), row[i].clone()))
                    .collect(),
            })
            .collect())
    }
}

/// One statement row with its logical columns pulled out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub description: String,
    pub category: String,
    /// Remaining source columns, in statement order.
    pub extra: Vec<(String, Value)>,
}
