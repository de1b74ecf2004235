//! Per-owner directory of categorized statements.
//!
//! Each save writes a new `categorized_<YYYYMMDD>_<HHMMSS>_<source-stem>.csv`
//! file. Reading lists the owner's files, returns the newest and removes all
//! but the most recent few. Order comes from the timestamp in the file name,
//! never from file metadata. No locking is done.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{Local, NaiveDate, NaiveDateTime, TimeDelta};
use csv::{ReaderBuilder, WriterBuilder};
use rust_decimal::Decimal;
use tracing::{debug, trace, warn};

use crate::config::{APP_NAME, OwnerProfile};
use crate::errors::{StatementError, StatementResult};
use crate::types::{Column, ColumnKind, Statement, Value};

/// Statements kept per owner after a read.
pub const RETAINED_STATEMENTS: usize = 3;

const ARTIFACT_PREFIX: &str = "categorized";
const ARTIFACT_EXTENSION: &str = "csv";
const STORED_DATE_FORMAT: &str = "%Y-%m-%d";
const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const LABEL_FORMAT: &str = "%d/%m/%Y %H:%M:%S";
const DEFAULT_STEM: &str = "statement";
/// Seconds tried past the requested stamp before a save gives up.
const MAX_NAME_ATTEMPTS: usize = 60;

/// A stored artifact found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    pub saved_at: NaiveDateTime,
    pub source_stem: String,
    /// `YYYYMMDD_HHMMSS` exactly as it appears in the file name.
    timestamp: String,
}

/// The newest stored statement for an owner.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredStatement {
    pub statement: Statement,
    pub saved_at: NaiveDateTime,
    pub path: PathBuf,
}

impl StoredStatement {
    /// Save time as shown to the user, `DD/MM/YYYY HH:MM:SS`.
    pub fn label(&self) -> String {
        self.saved_at.format(LABEL_FORMAT).to_string()
    }
}

#[derive(Debug, Clone)]
pub struct StatementStore {
    root: PathBuf,
    keep: usize,
}

impl StatementStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            keep: RETAINED_STATEMENTS,
        }
    }

    /// Keeps `keep` statements per owner instead of [`RETAINED_STATEMENTS`]; at least one.
    pub fn with_retention(mut self, keep: usize) -> Self {
        self.keep = keep.max(1);
        self
    }

    /// `<data dir>/conto`, when the platform has a data dir.
    pub fn default_root() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join(APP_NAME))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn owner_dir(&self, owner: &OwnerProfile) -> PathBuf {
        self.root.join(owner.owner_id())
    }

    /// Creates the owner's data directory. Call once at start-up.
    pub fn ensure_storage_ready(&self, owner: &OwnerProfile) -> StatementResult<PathBuf> {
        let dir = self.owner_dir(owner);
        fs::create_dir_all(&dir).map_err(|e| StatementError::store_io(&dir, e))?;
        debug!("Statement directory ready at {}", dir.display());
        Ok(dir)
    }

    /// Saves `statement` under the current local time.
    pub fn save(&self, statement: &Statement, owner: &OwnerProfile, source_name: &str) -> StatementResult<PathBuf> {
        self.save_at(statement, owner, source_name, Local::now().naive_local())
    }

    /// Saves `statement` as a new file stamped with `saved_at`.
    ///
    /// An existing file is never replaced. When the name is taken, the stamp
    /// moves forward one second at a time until a free name is found.
    pub fn save_at(
        &self,
        statement: &Statement,
        owner: &OwnerProfile,
        source_name: &str,
        saved_at: NaiveDateTime,
    ) -> StatementResult<PathBuf> {
        let dir = self.owner_dir(owner);
        let stem = Path::new(source_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_STEM);
        if !owner.matches_source(stem) {
            warn!(
                "Source '{stem}' does not match the pattern for owner '{}'; it will not be listed",
                owner.owner_id()
            );
        }

        let (file_name, path) = free_artifact_name(&dir, stem, saved_at)?;
        let content = encode(statement)?;
        let tmp = dir.join(format!(".{file_name}.tmp"));
        fs::write(&tmp, content).map_err(|e| StatementError::store_io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StatementError::store_io(&path, e))?;

        debug!("Saved {} rows to {}", statement.len(), path.display());
        Ok(path)
    }

    /// The owner's stored files, newest first. A missing directory lists nothing.
    pub fn list(&self, owner: &OwnerProfile) -> StatementResult<Vec<StoredFile>> {
        let dir = self.owner_dir(owner);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StatementError::store_io(&dir, e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StatementError::store_io(&dir, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(file) = parse_artifact_name(&entry.path(), &name, owner) {
                files.push(file);
            }
        }

        files.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.path.file_name().cmp(&a.path.file_name()))
        });
        Ok(files)
    }

    /// Reads the newest statement and prunes older ones.
    ///
    /// Returns `None` when the owner has nothing stored. Prune failures are
    /// logged and otherwise ignored.
    pub fn load_latest(&self, owner: &OwnerProfile) -> StatementResult<Option<StoredStatement>> {
        let files = self.list(owner)?;
        self.prune(&files);

        let Some(latest) = files.into_iter().next() else {
            debug!("No stored statements for owner '{}'", owner.owner_id());
            return Ok(None);
        };

        let content = fs::read(&latest.path).map_err(|e| StatementError::store_io(&latest.path, e))?;
        let statement = decode(&content, owner)?;
        debug!("Loaded {} rows from {}", statement.len(), latest.path.display());

        Ok(Some(StoredStatement {
            statement,
            saved_at: latest.saved_at,
            path: latest.path,
        }))
    }

    fn prune(&self, files: &[StoredFile]) {
        for file in files.iter().skip(self.keep) {
            match fs::remove_file(&file.path) {
                Ok(()) => debug!("Removed old statement {}", file.path.display()),
                Err(e) => warn!("{}", StatementError::store_io(&file.path, e)),
            }
        }
    }
}

/// First `categorized_<stamp>_<stem>.csv` not yet on disk, starting at `saved_at`.
fn free_artifact_name(dir: &Path, stem: &str, saved_at: NaiveDateTime) -> StatementResult<(String, PathBuf)> {
    let mut stamp = saved_at;
    for _ in 0..MAX_NAME_ATTEMPTS {
        let file_name = format!(
            "{ARTIFACT_PREFIX}_{}_{stem}.{ARTIFACT_EXTENSION}",
            stamp.format(FILE_TIMESTAMP_FORMAT)
        );
        let path = dir.join(&file_name);
        if !path.exists() {
            if stamp != saved_at {
                debug!("{} was taken, saving as {file_name}", saved_at.format(FILE_TIMESTAMP_FORMAT));
            }
            return Ok((file_name, path));
        }
        stamp += TimeDelta::seconds(1);
    }
    Err(StatementError::store_io(
        dir,
        std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("no free name for '{stem}' within {MAX_NAME_ATTEMPTS} seconds of {saved_at}"),
        ),
    ))
}

/// Splits `categorized_<YYYYMMDD>_<HHMMSS>_<stem>.csv`, keeping only the owner's stems.
fn parse_artifact_name(path: &Path, name: &str, owner: &OwnerProfile) -> Option<StoredFile> {
    let rest = name
        .strip_prefix(ARTIFACT_PREFIX)?
        .strip_prefix('_')?
        .strip_suffix(ARTIFACT_EXTENSION)?
        .strip_suffix('.')?;

    // "YYYYMMDD_HHMMSS" is 15 bytes, then "_" and a non-empty stem
    let (timestamp, stem) = (rest.get(..15)?, rest.get(15..)?.strip_prefix('_')?);
    let well_formed = timestamp
        .bytes()
        .enumerate()
        .all(|(i, b)| if i == 8 { b == b'_' } else { b.is_ascii_digit() });
    if !well_formed || stem.is_empty() || !owner.matches_source(stem) {
        return None;
    }

    let saved_at = NaiveDateTime::parse_from_str(timestamp, FILE_TIMESTAMP_FORMAT).ok()?;
    Some(StoredFile {
        path: path.to_path_buf(),
        saved_at,
        source_stem: stem.to_string(),
        timestamp: timestamp.to_string(),
    })
}

fn encode(statement: &Statement) -> StatementResult<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(statement.columns().iter().map(|c| c.name.as_str()))?;
    for row in statement.rows() {
        writer.write_record(row.iter().map(encode_value))?;
    }
    writer
        .into_inner()
        .map_err(|e| StatementError::ReadContentFailed(e.into_error()))
}

fn encode_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Date(d) => d.format(STORED_DATE_FORMAT).to_string(),
        Value::Amount(a) => a.to_string(),
        Value::Text(s) => s.clone(),
    }
}

/// Column types come from the owner's header names; only the first column
/// carrying a logical label gets its type.
fn decode(content: &[u8], owner: &OwnerProfile) -> StatementResult<Statement> {
    let headers = owner.headers();
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(content);

    let names: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let first = |label: &str| names.iter().position(|n| n == label);
    let (date_idx, value_idx, category_idx) = (
        first(&headers.date),
        first(&headers.value),
        first(&headers.category),
    );

    let columns: Vec<Column> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let kind = match Some(i) {
                i if i == date_idx => ColumnKind::Date,
                i if i == value_idx => ColumnKind::Decimal,
                i if i == category_idx => ColumnKind::Categorical,
                _ => ColumnKind::Text,
            };
            Column::new(name.clone(), kind)
        })
        .collect();

    let mut rows = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record?;
        let values = record
            .iter()
            .zip(&columns)
            .map(|(field, column)| decode_value(field, column.kind, row_idx))
            .collect::<StatementResult<Vec<_>>>()?;
        rows.push(values);
    }

    Ok(Statement::new(columns, rows))
}

fn decode_value(field: &str, kind: ColumnKind, row: usize) -> StatementResult<Value> {
    if field.is_empty() {
        return Ok(Value::Null);
    }
    match kind {
        ColumnKind::Date => NaiveDate::parse_from_str(field, STORED_DATE_FORMAT)
            .map(Value::Date)
            .map_err(|_| StatementError::DateParse {
                row,
                value: field.to_string(),
            }),
        ColumnKind::Decimal => Ok(Decimal::from_str(field).map(Value::Amount).unwrap_or_else(|_| {
            trace!("Stored row {row}: invalid amount '{field}', reading it as null");
            Value::Null
        })),
        ColumnKind::Text | ColumnKind::Categorical => Ok(Value::Text(field.to_string())),
    }
}
