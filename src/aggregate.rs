//! Views over a categorized statement for charts and tables. Nothing here
//! fails or touches the disk.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use crate::config::HeaderNames;
use crate::types::{ColumnKind, Statement, Value};

/// Column added by [`cumulative_by_category`].
pub const CUMULATIVE_COLUMN: &str = "Cumulative";

/// Rows whose category is one of `categories`.
pub fn filter_categories<S: AsRef<str>>(
    statement: &Statement,
    headers: &HeaderNames,
    categories: &[S],
) -> Statement {
    let wanted: HashSet<&str> = categories.iter().map(AsRef::as_ref).collect();
    let Some(category) = statement.column_index(&headers.category) else {
        return statement.select([]);
    };

    statement.select(
        statement
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, row)| row[category].as_text().is_some_and(|c| wanted.contains(c)))
            .map(|(i, _)| i),
    )
}

/// Rows in ascending date order. Ties keep their order; undated rows go last.
pub fn sort_by_date(statement: &Statement, headers: &HeaderNames) -> Statement {
    let Some(date) = statement.column_index(&headers.date) else {
        return statement.clone();
    };

    let mut order: Vec<usize> = (0..statement.len()).collect();
    order.sort_by_key(|&i| {
        let d = statement.rows()[i][date].as_date();
        (d.is_none(), d)
    });
    statement.select(order)
}

/// Date-ordered rows with a running total of the amount per category.
///
/// A null amount, or one that would overflow the running total, leaves its
/// category's total unchanged and gets a null cumulative value.
pub fn cumulative_by_category(statement: &Statement, headers: &HeaderNames) -> Statement {
    let mut sorted = sort_by_date(statement, headers);
    let (Some(category), Some(value)) = (
        sorted.column_index(&headers.category),
        sorted.column_index(&headers.value),
    ) else {
        return sorted;
    };

    let mut running: BTreeMap<String, Decimal> = BTreeMap::new();
    let cumulative: Vec<Value> = sorted
        .rows()
        .iter()
        .map(|row| {
            let Some(amount) = row[value].as_amount() else {
                return Value::Null;
            };
            let name = row[category].to_string();
            let total = running.entry(name).or_default();
            match total.checked_add(amount) {
                Some(sum) => {
                    *total = sum;
                    Value::Amount(sum)
                }
                None => {
                    warn!("Running total of '{}' overflows at {amount}, leaving it null", row[category]);
                    Value::Null
                }
            }
        })
        .collect();

    sorted.set_column(CUMULATIVE_COLUMN, ColumnKind::Decimal, cumulative);
    sorted
}

/// Distinct categories in order of first appearance.
pub fn categories(statement: &Statement, headers: &HeaderNames) -> Vec<String> {
    let Some(category) = statement.column_index(&headers.category) else {
        return Vec::new();
    };
    let mut seen = Vec::new();
    for row in statement.rows() {
        let name = row[category].to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

/// Width of the time buckets used by [`totals_by_period`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bucket {
    Day,
    #[default]
    Month,
    Year,
}

impl Bucket {
    /// First day of the bucket holding `date`.
    pub fn start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Bucket::Day => date,
            Bucket::Month => date.with_day(1).unwrap_or(date),
            Bucket::Year => date.with_ordinal(1).unwrap_or(date),
        }
    }

    pub fn label(self, start: NaiveDate) -> String {
        match self {
            Bucket::Day => start.format("%d/%m/%Y").to_string(),
            Bucket::Month => start.format("%m/%Y").to_string(),
            Bucket::Year => start.format("%Y").to_string(),
        }
    }
}

impl FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" => Ok(Bucket::Day),
            "month" => Ok(Bucket::Month),
            "year" => Ok(Bucket::Year),
            other => Err(format!("unknown bucket '{other}', expected day, month or year")),
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Bucket::Day => "day",
            Bucket::Month => "month",
            Bucket::Year => "year",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodTotal {
    pub period: NaiveDate,
    pub category: String,
    pub total: Decimal,
    pub count: usize,
}

/// Sum of non-null amounts per bucket and category, ordered by bucket then
/// category. Undated rows are left out. Sums beyond the decimal range saturate.
pub fn totals_by_period(statement: &Statement, headers: &HeaderNames, bucket: Bucket) -> Vec<PeriodTotal> {
    let (Some(date), Some(value)) = (
        statement.column_index(&headers.date),
        statement.column_index(&headers.value),
    ) else {
        return Vec::new();
    };
    let category = statement.column_index(&headers.category);

    let mut totals: BTreeMap<(NaiveDate, String), (Decimal, usize)> = BTreeMap::new();
    for row in statement.rows() {
        let (Some(day), Some(amount)) = (row[date].as_date(), row[value].as_amount()) else {
            continue;
        };
        let name = category
            .map(|c| row[c].to_string())
            .unwrap_or_else(|| crate::categorizer::UNCATEGORIZED.to_string());
        let period = bucket.start(day);
        let (total, count) = totals.entry((period, name)).or_default();
        *total = match total.checked_add(amount) {
            Some(sum) => sum,
            None => {
                warn!("Total for {} overflows at {amount}, saturating", bucket.label(period));
                total.saturating_add(amount)
            }
        };
        *count += 1;
    }

    totals
        .into_iter()
        .map(|((period, category), (total, count))| PeriodTotal {
            period,
            category,
            total,
            count,
        })
        .collect()
}
