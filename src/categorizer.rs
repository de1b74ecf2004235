use tracing::debug;

use crate::config::{CategoryRules, HeaderNames, OwnerProfile};
use crate::errors::StatementResult;
use crate::types::{ColumnKind, Statement, Value};

/// Category given to descriptions that no rule matches.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Assigns categories by case-insensitive keyword containment.
///
/// Rules are checked in declaration order and the first category with a
/// keyword contained in the description wins.
#[derive(Debug, Clone)]
pub struct Categorizer {
    rules: Vec<(String, Vec<String>)>,
}

impl Categorizer {
    pub fn new(rules: &CategoryRules) -> Self {
        Self {
            rules: rules
                .iter()
                .map(|rule| {
                    (
                        rule.name.clone(),
                        rule.keywords.iter().map(|k| k.to_lowercase()).collect(),
                    )
                })
                .collect(),
        }
    }

    /// Uses the owner's default rules.
    pub fn for_owner(profile: &OwnerProfile) -> Self {
        Self::new(profile.default_categories())
    }

    pub fn categorize_description(&self, description: &str) -> &str {
        let description = description.to_lowercase();
        self.rules
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| description.contains(k.as_str())))
            .map(|(name, _)| name.as_str())
            .unwrap_or(UNCATEGORIZED)
    }

    /// Fills the category column of `statement`, adding it when missing.
    ///
    /// Fails only when the description column is absent. Non-text descriptions
    /// are matched on their displayed form; null descriptions on the empty string.
    pub fn categorize(&self, mut statement: Statement, headers: &HeaderNames) -> StatementResult<Statement> {
        let descript = statement.require_column(&headers.descript)?;

        let categories: Vec<Value> = statement
            .rows()
            .iter()
            .map(|row| Value::Text(self.categorize_description(&row[descript].to_string()).to_string()))
            .collect();

        let uncategorized = categories
            .iter()
            .filter(|c| c.as_text() == Some(UNCATEGORIZED))
            .count();
        debug!(
            "Categorized {} rows, {uncategorized} uncategorized",
            categories.len()
        );

        statement.set_column(&headers.category, ColumnKind::Categorical, categories);
        Ok(statement)
    }
}
