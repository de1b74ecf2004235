//! Import bank statement exports, categorize their transactions by keyword and
//! keep the latest results per owner.
//!
//! ```rust,ignore
//! use conto::{Config, ImportBuilder, StatementStore};
//!
//! let config = Config::load(&path)?;
//! let owner = config.profile("famiglia")?;
//! let statement = ImportBuilder::new(owner)
//!     .filepath("MovimentiCC_2025-03-31.xlsx")
//!     .import()?;
//!
//! let store = StatementStore::new(data_dir);
//! store.ensure_storage_ready(owner)?;
//! store.save(&statement, owner, "MovimentiCC_2025-03-31.xlsx")?;
//! ```

mod builder;
mod types;

pub mod aggregate;
pub mod categorizer;
pub mod config;
pub mod errors;
pub mod export;
pub mod locator;
pub mod normalizer;
pub mod parsers;
pub mod store;

pub use builder::{FileFormat, ImportBuilder};
pub use categorizer::{Categorizer, UNCATEGORIZED};
pub use config::{CategoryKeywordRule, CategoryRules, Config, HeaderNames, OwnerProfile};
pub use errors::{StatementError, StatementResult};
pub use locator::{HeaderPosition, HeaderedTable, locate, locate_and_slice, slice};
pub use normalizer::StatementNormalizer;
pub use parsers::prelude::*;
pub use store::{StatementStore, StoredFile, StoredStatement};
pub use types::{Column, ColumnKind, DISPLAY_DATE_FORMAT, RawCell, RawTable, Statement, Transaction, Value};
