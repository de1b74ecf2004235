use std::str::FromStr;

use chrono::NaiveDate;
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, trace};

use crate::config::HeaderNames;
use crate::errors::{StatementError, StatementResult};
use crate::locator::{HeaderedTable, locate_and_slice};
use crate::types::{Column, ColumnKind, RawCell, RawTable, Statement, Value};

/// Turns a raw upload into a typed [`Statement`] using one owner's header names.
pub struct StatementNormalizer<'a> {
    headers: &'a HeaderNames,
}

impl<'a> StatementNormalizer<'a> {
    pub fn new(headers: &'a HeaderNames) -> Self {
        Self { headers }
    }

    /// Locates the header row, then types the date and amount columns.
    ///
    /// Fails on a missing anchor, a missing date or value column, or any date
    /// cell that is not `DD/MM/YYYY`. Unreadable amounts become null.
    pub fn normalize(&self, raw: &RawTable) -> StatementResult<Statement> {
        let sliced = locate_and_slice(raw, &self.headers.loc_identif)?;
        self.normalize_sliced(sliced)
    }

    /// Same as [`normalize`](Self::normalize) for a table already cut at its headers.
    pub fn normalize_sliced(&self, sliced: HeaderedTable) -> StatementResult<Statement> {
        let HeaderedTable { columns, rows } = sliced;

        let position = |name: &str| {
            columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| StatementError::MissingColumn(name.to_string()))
        };
        let date_idx = position(&self.headers.date)?;
        let value_idx = position(&self.headers.value)?;

        let columns: Vec<Column> = columns
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let kind = match i {
                    i if i == date_idx => ColumnKind::Date,
                    i if i == value_idx => ColumnKind::Decimal,
                    _ => ColumnKind::Text,
                };
                Column::new(name, kind)
            })
            .collect();

        let mut null_amounts = 0usize;
        let mut typed_rows = Vec::with_capacity(rows.len());
        for (row_idx, row) in rows.iter().enumerate() {
            let mut values = Vec::with_capacity(columns.len());
            for (col_idx, cell) in row.iter().enumerate().take(columns.len()) {
                let value = if col_idx == date_idx {
                    parse_date(cell, row_idx)?.map_or(Value::Null, Value::Date)
                } else if col_idx == value_idx {
                    match parse_amount(cell) {
                        Ok(amount) => Value::Amount(amount),
                        Err(e) => {
                            if !cell.is_empty() {
                                trace!("Data row {row_idx}: {e}, keeping row with a null amount");
                            }
                            null_amounts += 1;
                            Value::Null
                        }
                    }
                } else {
                    Value::from(cell)
                };
                values.push(value);
            }
            typed_rows.push(values);
        }

        debug!(
            "Normalized {} rows across {} columns ({null_amounts} null amounts)",
            typed_rows.len(),
            columns.len()
        );
        Ok(Statement::new(columns, typed_rows))
    }
}

/// Reads a date cell. Empty cells give `None`; text must be strictly `DD/MM/YYYY`.
pub fn parse_date(cell: &RawCell, row: usize) -> StatementResult<Option<NaiveDate>> {
    match cell {
        RawCell::Empty => Ok(None),
        RawCell::Date(date) => Ok(Some(*date)),
        RawCell::Text(s) if s.is_empty() => Ok(None),
        RawCell::Text(s) => parse_statement_date(s)
            .map(Some)
            .ok_or_else(|| StatementError::DateParse {
                row,
                value: s.clone(),
            }),
        other => Err(StatementError::DateParse {
            row,
            value: other.to_string(),
        }),
    }
}

/// Day and month of one or two digits, year of exactly four.
pub fn parse_statement_date(s: &str) -> Option<NaiveDate> {
    let mut parts = s.split('/');
    let (day, month, year) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let digits = |p: &str, min: usize, max: usize| {
        (min..=max).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_digit())
    };
    if !digits(day, 1, 2) || !digits(month, 1, 2) || !digits(year, 4, 4) {
        return None;
    }

    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// Reads an amount cell, replacing every `,` with `.` first.
///
/// Thousands separators are not stripped: `"1.234,56"` becomes `"1.234.56"`
/// and fails.
pub fn parse_amount(cell: &RawCell) -> StatementResult<Decimal> {
    match cell {
        RawCell::Number(n) => {
            Decimal::from_f64(*n).ok_or_else(|| StatementError::AmountParse(n.to_string()))
        }
        RawCell::Text(s) => {
            let normalized = s.trim().replace(',', ".");
            Decimal::from_str(&normalized)
                .or_else(|_| Decimal::from_scientific(&normalized))
                .map_err(|_| StatementError::AmountParse(s.clone()))
        }
        other => Err(StatementError::AmountParse(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn headers() -> HeaderNames {
        HeaderNames {
            date: "Data valuta".to_string(),
            value: "Importo".to_string(),
            descript: "Descrizione".to_string(),
            category: "Categoria".to_string(),
            loc_identif: "Data contabile".to_string(),
        }
    }

    fn statement_grid(rows: Vec<Vec<&str>>) -> RawTable {
        let mut grid = vec![
            vec!["Estratto conto corrente", "", "", "", ""],
            vec!["", "", "", "", ""],
            vec!["", "Data contabile", "Data valuta", "Descrizione", "Importo"],
        ];
        grid.extend(rows);
        RawTable::from_rows(grid)
    }

    #[rstest]
    #[case("26/12/2025", NaiveDate::from_ymd_opt(2025, 12, 26).unwrap())]
    #[case("01/01/2025", NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())]
    #[case("1/2/2025", NaiveDate::from_ymd_opt(2025, 2, 1).unwrap())]
    #[case("29/02/2024", NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())]
    fn test_parse_statement_date_valid(#[case] input: &str, #[case] expected: NaiveDate) {
        assert_eq!(parse_statement_date(input), Some(expected));
    }

    #[rstest]
    #[case("2025-12-26")]
    #[case("12/26/2025")]
    #[case("26/12/25")]
    #[case("26/12/02025")]
    #[case("29/02/2025")]
    #[case("26-12-2025")]
    #[case(" 26/12/2025")]
    #[case("26/12/2025/1")]
    #[case("")]
    fn test_parse_statement_date_invalid(#[case] input: &str) {
        assert_eq!(parse_statement_date(input), None);
    }

    #[rstest]
    #[case(RawCell::Text("-4,50".to_string()), "-4.50")]
    #[case(RawCell::Text("1500.00".to_string()), "1500.00")]
    #[case(RawCell::Text(" 12 ".to_string()), "12")]
    #[case(RawCell::Number(-4.5), "-4.5")]
    #[case(RawCell::Number(100.0), "100")]
    fn test_parse_amount_valid(#[case] cell: RawCell, #[case] expected: &str) {
        assert_eq!(parse_amount(&cell).unwrap(), Decimal::from_str(expected).unwrap());
    }

    #[rstest]
    #[case(RawCell::Text("1.234,56".to_string()))]
    #[case(RawCell::Text("N/A".to_string()))]
    #[case(RawCell::Text("€ 12,00".to_string()))]
    #[case(RawCell::Empty)]
    #[case(RawCell::Date(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()))]
    fn test_parse_amount_invalid(#[case] cell: RawCell) {
        assert!(matches!(parse_amount(&cell), Err(StatementError::AmountParse(_))));
    }

    #[test]
    fn test_normalize_types_columns_and_keeps_other_columns() {
        let raw = statement_grid(vec![
            vec!["", "01/03/2025", "02/03/2025", "Caffè Bar Roma", "-4,50"],
            vec!["", "03/03/2025", "03/03/2025", "Stipendio", "1500"],
        ]);
        let statement = StatementNormalizer::new(&headers()).normalize(&raw).unwrap();

        let names: Vec<&str> = statement.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Data contabile", "Data valuta", "Descrizione", "Importo"]);
        assert_eq!(statement.columns()[1].kind, ColumnKind::Date);
        assert_eq!(statement.columns()[3].kind, ColumnKind::Decimal);
        assert_eq!(statement.columns()[0].kind, ColumnKind::Text);

        assert_eq!(statement.len(), 2);
        assert_eq!(
            statement.value(0, "Data valuta"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()))
        );
        assert_eq!(
            statement.value(0, "Importo"),
            Some(&Value::Amount(Decimal::from_str("-4.50").unwrap()))
        );
        assert_eq!(statement.value(0, "Data contabile"), Some(&Value::text("01/03/2025")));
    }

    #[test]
    fn test_unparsable_amount_keeps_row() {
        let raw = statement_grid(vec![
            vec!["", "01/03/2025", "02/03/2025", "Rimborso", "N/A"],
            vec!["", "01/03/2025", "02/03/2025", "Bonifico", "1.234,56"],
            vec!["", "01/03/2025", "02/03/2025", "Vuoto", ""],
        ]);
        let statement = StatementNormalizer::new(&headers()).normalize(&raw).unwrap();
        assert_eq!(statement.len(), 3);
        for row in 0..3 {
            assert_eq!(statement.value(row, "Importo"), Some(&Value::Null));
        }
    }

    #[test]
    fn test_bad_date_fails_whole_statement() {
        let raw = statement_grid(vec![
            vec!["", "01/03/2025", "02/03/2025", "Bar", "-1"],
            vec!["", "01/03/2025", "2025-03-02", "Bar", "-1"],
        ]);
        let result = StatementNormalizer::new(&headers()).normalize(&raw);
        assert!(matches!(
            result,
            Err(StatementError::DateParse { row: 1, value }) if value == "2025-03-02"
        ));
    }

    #[test]
    fn test_empty_date_cell_is_null() {
        let raw = statement_grid(vec![vec!["", "", "", "Saldo finale", "100"]]);
        let statement = StatementNormalizer::new(&headers()).normalize(&raw).unwrap();
        assert_eq!(statement.value(0, "Data valuta"), Some(&Value::Null));
    }

    #[test]
    fn test_spreadsheet_date_cells_accepted() {
        let mut grid = statement_grid(vec![]).rows().to_vec();
        grid.push(vec![
            RawCell::Empty,
            RawCell::Date(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()),
            RawCell::Date(NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()),
            RawCell::Text("Coop".to_string()),
            RawCell::Number(-23.4),
        ]);
        let statement = StatementNormalizer::new(&headers())
            .normalize(&RawTable::new(grid))
            .unwrap();
        assert_eq!(
            statement.value(0, "Data valuta"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()))
        );
        assert_eq!(
            statement.value(0, "Importo"),
            Some(&Value::Amount(Decimal::from_str("-23.4").unwrap()))
        );
        assert_eq!(statement.value(0, "Data contabile"), Some(&Value::text("01/03/2025")));
    }

    #[rstest]
    #[case("Data valuta")]
    #[case("Importo")]
    fn test_missing_logical_column(#[case] missing: &str) {
        let header: Vec<&str> = ["Data contabile", "Data valuta", "Descrizione", "Importo"]
            .into_iter()
            .map(|h| if h == missing { "Altro" } else { h })
            .collect();
        let raw = RawTable::from_rows(vec![header]);
        let result = StatementNormalizer::new(&headers()).normalize(&raw);
        assert!(matches!(result, Err(StatementError::MissingColumn(name)) if name == missing));
    }

    #[test]
    fn test_missing_anchor() {
        let raw = RawTable::from_rows(vec![vec!["Data", "Importo"]]);
        let result = StatementNormalizer::new(&headers()).normalize(&raw);
        assert!(matches!(result, Err(StatementError::HeaderNotFound { .. })));
    }

    #[test]
    fn test_source_table_untouched() {
        let raw = statement_grid(vec![vec!["", "01/03/2025", "02/03/2025", "Bar", "-1,00"]]);
        let before = raw.clone();
        StatementNormalizer::new(&headers()).normalize(&raw).unwrap();
        assert_eq!(raw, before);
    }
}
