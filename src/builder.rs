use std::fs;

use tracing::debug;

use crate::categorizer::Categorizer;
use crate::config::{CategoryRules, OwnerProfile};
use crate::errors::{StatementError, StatementResult};
use crate::normalizer::StatementNormalizer;
use crate::parsers::prelude::*;
use crate::types::{RawTable, Statement};

/// Reader used for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Spreadsheet,
}

impl FileFormat {
    /// Reads `content` into a positional grid.
    pub fn parse(&self, content: &[u8]) -> StatementResult<RawTable> {
        match self {
            FileFormat::Csv => CsvParser::parse(content),
            FileFormat::Spreadsheet => SpreadsheetParser::parse(content),
        }
    }

    /// Picks the reader from the file name extension.
    pub fn detect(filename: &str) -> StatementResult<Self> {
        if CsvParser::is_supported(filename) {
            return Ok(FileFormat::Csv);
        }
        if SpreadsheetParser::is_supported(filename) {
            return Ok(FileFormat::Spreadsheet);
        }
        Err(StatementError::UnsupportedFileType(filename.to_string()))
    }
}

/// Runs one upload through the pipeline for one owner.
///
/// ```rust,ignore
/// let statement = ImportBuilder::new(config.profile("famiglia")?)
///     .filename("MovimentiCC_2025-03-01.xlsx")
///     .content(&bytes)
///     .import()?;
/// ```
pub struct ImportBuilder<'a> {
    profile: &'a OwnerProfile,
    content: Option<Vec<u8>>,
    filename: Option<String>,
    filepath: Option<String>,
    format: Option<FileFormat>,
    rules: Option<CategoryRules>,
}

impl<'a> ImportBuilder<'a> {
    pub fn new(profile: &'a OwnerProfile) -> Self {
        Self {
            profile,
            content: None,
            filename: None,
            filepath: None,
            format: None,
            rules: None,
        }
    }

    /// Bytes of an upload already in memory.
    pub fn content(mut self, content: &[u8]) -> Self {
        self.content = Some(content.to_vec());
        self
    }

    /// Name of the upload, used to detect its format.
    pub fn filename(mut self, filename: &str) -> Self {
        self.filename = Some(filename.to_string());
        self
    }

    /// Reads the upload from disk when no content is given.
    pub fn filepath(mut self, filepath: &str) -> Self {
        self.filepath = Some(filepath.to_string());
        self
    }

    pub fn format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Categorizes with `rules` instead of the owner's defaults, for this import only.
    pub fn rules(mut self, rules: CategoryRules) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Normalizes and categorizes the upload.
    pub fn import(self) -> StatementResult<Statement> {
        let profile = self.profile;
        let categorizer = match &self.rules {
            Some(rules) => Categorizer::new(rules),
            None => Categorizer::for_owner(profile),
        };
        let statement = self.normalize_only()?;
        categorizer.categorize(statement, profile.headers())
    }

    /// Normalizes the upload without assigning categories.
    pub fn normalize_only(self) -> StatementResult<Statement> {
        let format = match self.format {
            Some(format) => format,
            None => FileFormat::detect(
                self.filename
                    .as_deref()
                    .or(self.filepath.as_deref())
                    .unwrap_or_default(),
            )?,
        };

        let content = match self.content {
            Some(content) => content,
            None => {
                let path = self.filepath.ok_or(StatementError::MissingContentAndFilepath)?;
                fs::read(path)?
            }
        };

        debug!(
            "Importing {} bytes as {format:?} for owner '{}'",
            content.len(),
            self.profile.owner_id()
        );
        let raw = format.parse(&content)?;
        StatementNormalizer::new(self.profile.headers()).normalize(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorizer::UNCATEGORIZED;
    use crate::config::tests::sample_profile;
    use crate::types::Value;
    use rstest::rstest;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    const SAMPLE_CSV: &str = "\
Estratto conto;;;;
Conto;IT00X0000;;;
;;;;
Data contabile;Data valuta;Descrizione;Importo;Note
01/03/2025;02/03/2025;COOP Firenze;-35,20;
03/03/2025;03/03/2025;Caffè Bar Roma;-1,50;colazione
04/03/2025;05/03/2025;Bonifico;N/A;
";

    #[rstest]
    #[case("statement.csv", FileFormat::Csv)]
    #[case("statement.CSV", FileFormat::Csv)]
    #[case("MovimentiCC.xlsx", FileFormat::Spreadsheet)]
    #[case("MovimentiCC.xls", FileFormat::Spreadsheet)]
    #[case("MovimentiCC.ods", FileFormat::Spreadsheet)]
    fn test_file_format_detect(#[case] filename: &str, #[case] expected: FileFormat) {
        assert_eq!(FileFormat::detect(filename).unwrap(), expected);
    }

    #[rstest]
    #[case("statement.qfx")]
    #[case("statement.pdf")]
    #[case("statement")]
    #[case("")]
    fn test_file_format_detect_unsupported(#[case] filename: &str) {
        let result = FileFormat::detect(filename);
        assert!(matches!(result, Err(StatementError::UnsupportedFileType(name)) if name == filename));
    }

    #[test]
    fn test_import_categorizes_with_owner_rules() {
        let profile = sample_profile();
        let statement = ImportBuilder::new(&profile)
            .filename("MovimentiCC_2025-03-31.csv")
            .content(SAMPLE_CSV.as_bytes())
            .import()
            .unwrap();

        assert_eq!(statement.len(), 3);
        assert_eq!(statement.value(0, "Categoria"), Some(&Value::text("Spesa")));
        assert_eq!(statement.value(1, "Categoria"), Some(&Value::text("Bar")));
        assert_eq!(statement.value(2, "Categoria"), Some(&Value::text(UNCATEGORIZED)));
        assert_eq!(
            statement.value(0, "Importo"),
            Some(&Value::Amount(Decimal::from_str("-35.20").unwrap()))
        );
        assert_eq!(statement.value(2, "Importo"), Some(&Value::Null));
    }

    #[test]
    fn test_rules_override_does_not_touch_profile() {
        let profile = sample_profile();
        let rules: CategoryRules = [("Colazione", vec!["caffè"])].into_iter().collect();
        let statement = ImportBuilder::new(&profile)
            .filename("MovimentiCC_2025-03-31.csv")
            .content(SAMPLE_CSV.as_bytes())
            .rules(rules)
            .import()
            .unwrap();

        assert_eq!(statement.value(0, "Categoria"), Some(&Value::text(UNCATEGORIZED)));
        assert_eq!(statement.value(1, "Categoria"), Some(&Value::text("Colazione")));
        assert_eq!(profile.default_categories().len(), 3);
    }

    #[test]
    fn test_normalize_only_has_no_category_column() {
        let profile = sample_profile();
        let statement = ImportBuilder::new(&profile)
            .content(SAMPLE_CSV.as_bytes())
            .format(FileFormat::Csv)
            .normalize_only()
            .unwrap();
        assert!(statement.column_index("Categoria").is_none());
        assert_eq!(statement.len(), 3);
    }

    #[test]
    fn test_import_from_filepath() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MovimentiCC_2025-03-31.csv");
        fs::write(&path, SAMPLE_CSV).unwrap();

        let profile = sample_profile();
        let statement = ImportBuilder::new(&profile)
            .filepath(path.to_str().unwrap())
            .import()
            .unwrap();
        assert_eq!(statement.len(), 3);
    }

    #[test]
    fn test_import_no_content_no_filepath() {
        let profile = sample_profile();
        let result = ImportBuilder::new(&profile).format(FileFormat::Csv).import();
        assert!(matches!(result, Err(StatementError::MissingContentAndFilepath)));
    }

    #[test]
    fn test_import_missing_file() {
        let profile = sample_profile();
        let result = ImportBuilder::new(&profile).filepath("/nonexistent/statement.csv").import();
        assert!(matches!(result, Err(StatementError::ReadContentFailed(_))));
    }

    #[test]
    fn test_import_unsupported_extension() {
        let profile = sample_profile();
        let result = ImportBuilder::new(&profile)
            .filename("statement.qfx")
            .content(b"<OFX></OFX>")
            .import();
        assert!(matches!(result, Err(StatementError::UnsupportedFileType(_))));
    }

    #[test]
    fn test_import_without_anchor() {
        let profile = sample_profile();
        let result = ImportBuilder::new(&profile)
            .filename("statement.csv")
            .content(b"Data valuta;Importo;Descrizione\n01/03/2025;1;x\n")
            .import();
        assert!(matches!(result, Err(StatementError::HeaderNotFound { .. })));
    }

    #[test]
    fn test_import_invalid_spreadsheet() {
        let profile = sample_profile();
        let result = ImportBuilder::new(&profile)
            .filename("statement.xlsx")
            .content(b"not a workbook")
            .import();
        assert!(matches!(result, Err(StatementError::Spreadsheet(_))));
    }

    #[test]
    fn test_import_save_and_reload() {
        let config = crate::config::Config::from_json(
            r#"{"casa": {
                "headers": {"date": "Data valuta", "value": "Importo", "descript": "Descrizione",
                            "category": "Categoria", "loc_identif": "Data contabile"},
                "default_categories": {"Bar": ["caffè", "bar"]},
                "sourcedoc_namepattern": "MovimentiCC_.*"
            }}"#,
        )
        .unwrap();
        let owner = config.default_owner();

        // Anchor at row 5, column 2 behind a preamble and two filler columns.
        let csv = "\
Banca;;;;;
;;;;;
Intestatario;;Rossi;;;
;;;;;
;;;;;
x;y;Data contabile;Data valuta;Descrizione;Importo
;;01/03/2025;02/03/2025;Caffè Bar Roma;-1,20
;;03/03/2025;03/03/2025;Ricarica;N/A
";
        let statement = ImportBuilder::new(owner)
            .filename("MovimentiCC_2025-03-31.csv")
            .content(csv.as_bytes())
            .import()
            .unwrap();

        let names: Vec<&str> = statement.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Data contabile", "Data valuta", "Descrizione", "Importo", "Categoria"]);
        assert_eq!(statement.value(0, "Categoria"), Some(&Value::text("Bar")));
        assert_eq!(statement.value(1, "Importo"), Some(&Value::Null));
        assert_eq!(statement.value(1, "Categoria"), Some(&Value::text(UNCATEGORIZED)));

        let dir = tempfile::tempdir().unwrap();
        let store = crate::store::StatementStore::new(dir.path());
        store.ensure_storage_ready(owner).unwrap();
        store.save(&statement, owner, "MovimentiCC_2025-03-31.csv").unwrap();

        let loaded = store.load_latest(owner).unwrap().unwrap();
        assert_eq!(loaded.statement, statement);
    }
}
