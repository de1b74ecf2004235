//! Per-owner configuration: which column labels a bank uses, where its header
//! anchor is, and the default keyword rules for categorizing transactions.
//!
//! The file maps each owner id to a profile:
//!
//! ```json
//! {
//!   "famiglia": {
//!     "headers": {
//!       "date": "Data valuta", "value": "Importo", "descript": "Descrizione",
//!       "category": "Categoria", "loc_identif": "Data contabile"
//!     },
//!     "default_categories": { "Bar": ["caffè", "bar"], "Spesa": ["market"] },
//!     "sourcedoc_namepattern": "MovimentiCC_\\d{4}-\\d{2}-\\d{2}"
//!   }
//! }
//! ```
//!
//! Owners and categories keep the order they have in the file.

use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{StatementError, StatementResult};

pub const APP_NAME: &str = "conto";
const CONFIG_JSON: &str = "config.json";

/// Actual column labels used by an owner's statements, keyed by logical role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderNames {
    pub date: String,
    pub value: String,
    #[serde(alias = "description")]
    pub descript: String,
    pub category: String,
    /// Anchor string marking the header row.
    pub loc_identif: String,
}

impl HeaderNames {
    fn validate(&self, owner: &str) -> StatementResult<()> {
        let keys = [
            ("date", &self.date),
            ("value", &self.value),
            ("descript", &self.descript),
            ("category", &self.category),
            ("loc_identif", &self.loc_identif),
        ];
        for (key, label) in keys {
            if label.trim().is_empty() {
                return Err(StatementError::Config(format!(
                    "owner '{owner}': header '{key}' must not be empty"
                )));
            }
        }
        Ok(())
    }
}

/// A category and the keywords that select it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryKeywordRule {
    pub name: String,
    pub keywords: Vec<String>,
}

impl CategoryKeywordRule {
    pub fn new<I, S>(name: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for keyword in keywords.into_iter().map(Into::into) {
            if !unique.contains(&keyword) {
                unique.push(keyword);
            }
        }
        Self {
            name: name.into(),
            keywords: unique,
        }
    }
}

/// Ordered category rules; the first matching category wins.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CategoryRules(Vec<CategoryKeywordRule>);

impl CategoryRules {
    pub fn new(rules: Vec<CategoryKeywordRule>) -> Self {
        Self(rules)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CategoryKeywordRule> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N, K, S> FromIterator<(N, K)> for CategoryRules
where
    N: Into<String>,
    K: IntoIterator<Item = S>,
    S: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (N, K)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, keywords)| CategoryKeywordRule::new(name, keywords))
                .collect(),
        )
    }
}

impl<'de> Deserialize<'de> for CategoryRules {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = Ordered::<Vec<String>>::deserialize(deserializer)?;
        Ok(entries.0.into_iter().collect())
    }
}

impl Serialize for CategoryRules {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for rule in &self.0 {
            map.serialize_entry(&rule.name, &rule.keywords)?;
        }
        map.end()
    }
}

/// JSON object read as a list of entries in document order.
struct Ordered<V>(Vec<(String, V)>);

impl<'de, V> Deserialize<'de> for Ordered<V>
where
    V: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V> Visitor<'de> for OrderedVisitor<V>
        where
            V: Deserialize<'de>,
        {
            type Value = Ordered<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(Ordered(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// Profile entry as written in the configuration file.
#[derive(Debug, Deserialize)]
struct OwnerProfileRaw {
    headers: HeaderNames,
    #[serde(default)]
    default_categories: CategoryRules,
    sourcedoc_namepattern: String,
}

/// One configured user or household.
#[derive(Debug, Clone)]
pub struct OwnerProfile {
    owner_id: String,
    headers: HeaderNames,
    default_categories: CategoryRules,
    sourcedoc_namepattern: String,
    source_pattern: Regex,
}

impl OwnerProfile {
    pub fn new(
        owner_id: impl Into<String>,
        headers: HeaderNames,
        default_categories: CategoryRules,
        sourcedoc_namepattern: impl Into<String>,
    ) -> StatementResult<Self> {
        let owner_id = owner_id.into();
        let sourcedoc_namepattern = sourcedoc_namepattern.into();

        if owner_id.trim().is_empty() {
            return Err(StatementError::Config("owner id must not be empty".to_string()));
        }
        headers.validate(&owner_id)?;
        if sourcedoc_namepattern.is_empty() {
            return Err(StatementError::Config(format!(
                "owner '{owner_id}': sourcedoc_namepattern must not be empty"
            )));
        }
        let source_pattern = Regex::new(&format!("^(?:{sourcedoc_namepattern})$")).map_err(|e| {
            StatementError::Config(format!("owner '{owner_id}': invalid sourcedoc_namepattern: {e}"))
        })?;

        Ok(Self {
            owner_id,
            headers,
            default_categories,
            sourcedoc_namepattern,
            source_pattern,
        })
    }

    fn from_raw(owner_id: String, raw: OwnerProfileRaw) -> StatementResult<Self> {
        Self::new(
            owner_id,
            raw.headers,
            raw.default_categories,
            raw.sourcedoc_namepattern,
        )
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn headers(&self) -> &HeaderNames {
        &self.headers
    }

    pub fn default_categories(&self) -> &CategoryRules {
        &self.default_categories
    }

    pub fn sourcedoc_namepattern(&self) -> &str {
        &self.sourcedoc_namepattern
    }

    /// Whether a source document stem (file name without extension) belongs to this owner.
    pub fn matches_source(&self, stem: &str) -> bool {
        self.source_pattern.is_match(stem)
    }
}

/// The loaded configuration file. Build it once and pass it by reference.
#[derive(Debug, Clone)]
pub struct Config {
    owners: Vec<OwnerProfile>,
}

impl Config {
    pub fn new(owners: Vec<OwnerProfile>) -> StatementResult<Self> {
        if owners.is_empty() {
            return Err(StatementError::Config("no owners configured".to_string()));
        }
        Ok(Self { owners })
    }

    pub fn from_json(content: &str) -> StatementResult<Self> {
        let entries: Ordered<OwnerProfileRaw> = serde_json::from_str(content)
            .map_err(|e| StatementError::Config(format!("JSON parse error: {e}")))?;

        let owners = entries
            .0
            .into_iter()
            .map(|(owner_id, raw)| OwnerProfile::from_raw(owner_id, raw))
            .collect::<StatementResult<Vec<_>>>()?;

        Self::new(owners)
    }

    pub fn load(path: &Path) -> StatementResult<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// `<config dir>/conto/config.json`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_JSON))
    }

    pub fn owners(&self) -> &[OwnerProfile] {
        &self.owners
    }

    /// The first owner in the file.
    pub fn default_owner(&self) -> &OwnerProfile {
        &self.owners[0]
    }

    pub fn profile(&self, owner_id: &str) -> StatementResult<&OwnerProfile> {
        self.owners
            .iter()
            .find(|p| p.owner_id == owner_id)
            .ok_or_else(|| StatementError::UnknownOwner(owner_id.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rstest::rstest;

    pub(crate) const SAMPLE_CONFIG: &str = r#"{
        "famiglia": {
            "headers": {
                "date": "Data valuta",
                "value": "Importo",
                "descript": "Descrizione",
                "category": "Categoria",
                "loc_identif": "Data contabile"
            },
            "default_categories": {
                "Spesa": ["market", "coop"],
                "Trasporti": ["supermarket", "benzina"],
                "Bar": ["caffè", "bar"]
            },
            "sourcedoc_namepattern": "MovimentiCC_\\d{4}-\\d{2}-\\d{2}"
        },
        "anna": {
            "headers": {
                "date": "Date",
                "value": "Amount",
                "description": "Description",
                "category": "Category",
                "loc_identif": "Booking date"
            },
            "sourcedoc_namepattern": "export_.*"
        }
    }"#;

    pub(crate) fn sample_profile() -> OwnerProfile {
        Config::from_json(SAMPLE_CONFIG)
            .unwrap()
            .profile("famiglia")
            .unwrap()
            .clone()
    }

    #[test]
    fn test_load_preserves_owner_and_category_order() {
        let config = Config::from_json(SAMPLE_CONFIG).unwrap();
        let ids: Vec<&str> = config.owners().iter().map(|o| o.owner_id()).collect();
        assert_eq!(ids, vec!["famiglia", "anna"]);
        assert_eq!(config.default_owner().owner_id(), "famiglia");

        let names: Vec<&str> = config
            .profile("famiglia")
            .unwrap()
            .default_categories()
            .names()
            .collect();
        assert_eq!(names, vec!["Spesa", "Trasporti", "Bar"]);
    }

    #[test]
    fn test_description_alias_and_default_categories() {
        let config = Config::from_json(SAMPLE_CONFIG).unwrap();
        let anna = config.profile("anna").unwrap();
        assert_eq!(anna.headers().descript, "Description");
        assert!(anna.default_categories().is_empty());
    }

    #[test]
    fn test_unknown_owner() {
        let config = Config::from_json(SAMPLE_CONFIG).unwrap();
        let result = config.profile("nobody");
        assert!(matches!(result, Err(StatementError::UnknownOwner(id)) if id == "nobody"));
    }

    #[rstest]
    #[case("MovimentiCC_2025-01-31", true)]
    #[case("MovimentiCC_2025-1-31", false)]
    #[case("xMovimentiCC_2025-01-31", false)]
    #[case("MovimentiCC_2025-01-31_copy", false)]
    fn test_matches_source(#[case] stem: &str, #[case] expected: bool) {
        assert_eq!(sample_profile().matches_source(stem), expected);
    }

    #[rstest]
    #[case(r#"{}"#)]
    #[case(r#"{"x": {"headers": {"date": "", "value": "v", "descript": "d", "category": "c", "loc_identif": "l"}, "sourcedoc_namepattern": ".*"}}"#)]
    #[case(r#"{"x": {"headers": {"date": "d", "value": "v", "descript": "d", "category": "c", "loc_identif": "l"}, "sourcedoc_namepattern": "("}}"#)]
    #[case(r#"{"x": {"headers": {"date": "d", "value": "v", "descript": "d", "category": "c", "loc_identif": "l"}, "sourcedoc_namepattern": ""}}"#)]
    #[case(r#"{"x": {"headers": {"date": "d"}, "sourcedoc_namepattern": ".*"}}"#)]
    #[case(r#"not json"#)]
    fn test_invalid_config(#[case] content: &str) {
        let result = Config::from_json(content);
        assert!(matches!(result, Err(StatementError::Config(_))));
    }

    #[test]
    fn test_keywords_deduplicated_in_order() {
        let rule = CategoryKeywordRule::new("Bar", ["bar", "caffè", "bar"]);
        assert_eq!(rule.keywords, vec!["bar", "caffè"]);
    }

    #[test]
    fn test_category_rules_serialize_in_order() {
        let rules: CategoryRules = [("Z", vec!["z"]), ("A", vec!["a"])].into_iter().collect();
        let json = serde_json::to_string(&rules).unwrap();
        assert_eq!(json, r#"{"Z":["z"],"A":["a"]}"#);

        let back: CategoryRules = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rules);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, SAMPLE_CONFIG).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.owners().len(), 2);

        let missing = Config::load(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(StatementError::ReadContentFailed(_))));
    }
}
