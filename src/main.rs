use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use conto::aggregate::{self, Bucket, CUMULATIVE_COLUMN};
use conto::{Config, ImportBuilder, OwnerProfile, Statement, StatementError, StatementResult, StatementStore, export};
use tracing::{debug, error, trace};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// conto: import bank statement exports and categorize their transactions.
///
/// Each owner in the configuration file describes the column labels of their
/// bank's export and the keywords used to pick a category. Imported statements
/// are kept in a per-owner data directory; only the latest few are retained.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, global = true, default_value_t = LevelFilter::WARN)]
    log_level: LevelFilter,

    /// Configuration file. Defaults to config.json in the platform config directory.
    #[arg(long, global = true, env = "CONTO_CONFIG")]
    config: Option<PathBuf>,

    /// Where categorized statements are stored. Defaults to the platform data directory.
    #[arg(long, global = true, env = "CONTO_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the configured owners. The first one is the default.
    Owners,
    /// Import, categorize and store a statement export (.csv, .xlsx, .xls, .ods).
    Import {
        file: PathBuf,
        /// Owner id; the first configured owner when omitted.
        #[arg(long)]
        owner: Option<String>,
        /// Print the result without storing it.
        #[arg(long)]
        no_save: bool,
    },
    /// Show the most recently stored statement.
    Latest {
        #[arg(long)]
        owner: Option<String>,
    },
    /// Totals per period and category of the latest stored statement.
    Summary {
        #[arg(long)]
        owner: Option<String>,
        /// Only these categories. Repeat for more than one.
        #[arg(long = "category")]
        categories: Vec<String>,
        /// One of day, month, year.
        #[arg(long, default_value_t = Bucket::Month)]
        bucket: Bucket,
        /// Show the running total per category instead.
        #[arg(long)]
        cumulative: bool,
    },
    /// Write the latest stored statement to a CSV file.
    Export {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        output: PathBuf,
        #[arg(long = "category")]
        categories: Vec<String>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.log_level);
    debug!("Log level set to {}", args.log_level.to_string().to_lowercase());

    match main_inner(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn main_inner(args: Args) -> StatementResult<()> {
    trace!("{args:?}");
    let config = load_config(args.config.as_deref())?;
    let store = StatementStore::new(data_dir(args.data_dir)?);

    match args.command {
        Command::Owners => {
            for (i, owner) in config.owners().iter().enumerate() {
                let marker = if i == 0 { " (default)" } else { "" };
                println!("{}{marker}", owner.owner_id());
            }
        }

        Command::Import { file, owner, no_save } => {
            let owner = select_owner(&config, owner.as_deref())?;
            store.ensure_storage_ready(owner)?;

            let statement = ImportBuilder::new(owner)
                .filepath(&file.to_string_lossy())
                .import()?;
            print_statement(&statement);

            if !no_save {
                let source = file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                let path = store.save(&statement, owner, &source)?;
                println!("\nSaved to {}", path.display());
            }
        }

        Command::Latest { owner } => {
            let owner = select_owner(&config, owner.as_deref())?;
            if let Some((statement, label)) = latest(&store, owner)? {
                println!("Last saved: {label}");
                let categories = aggregate::categories(&statement, owner.headers());
                println!("Categories: {}\n", categories.join(", "));
                print_statement(&statement);
            }
        }

        Command::Summary {
            owner,
            categories,
            bucket,
            cumulative,
        } => {
            let owner = select_owner(&config, owner.as_deref())?;
            let Some((statement, label)) = latest(&store, owner)? else {
                return Ok(());
            };
            let headers = owner.headers();
            let statement = if categories.is_empty() {
                statement
            } else {
                aggregate::filter_categories(&statement, headers, &categories)
            };
            println!("Last saved: {label}\n");

            if cumulative {
                let view = aggregate::cumulative_by_category(&statement, headers);
                let columns = [headers.date.as_str(), headers.category.as_str(), headers.value.as_str(), CUMULATIVE_COLUMN];
                print_columns(&view, &columns);
            } else {
                for total in aggregate::totals_by_period(&statement, headers, bucket) {
                    println!(
                        "{:<12} {:<24} {:>12} ({} rows)",
                        bucket.label(total.period),
                        total.category,
                        total.total,
                        total.count
                    );
                }
            }
        }

        Command::Export {
            owner,
            output,
            categories,
        } => {
            let owner = select_owner(&config, owner.as_deref())?;
            let Some((statement, _)) = latest(&store, owner)? else {
                return Ok(());
            };
            let statement = if categories.is_empty() {
                statement
            } else {
                aggregate::filter_categories(&statement, owner.headers(), &categories)
            };
            export::to_path(&statement, &output)?;
            println!("Exported {} rows to {}", statement.len(), output.display());
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> StatementResult<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::default_path()
            .ok_or_else(|| StatementError::Config("no config directory on this platform, use --config".to_string()))?,
    };
    Config::load(&path)
}

fn data_dir(dir: Option<PathBuf>) -> StatementResult<PathBuf> {
    dir.or_else(StatementStore::default_root)
        .ok_or_else(|| StatementError::Config("no data directory on this platform, use --data-dir".to_string()))
}

fn select_owner<'a>(config: &'a Config, owner: Option<&str>) -> StatementResult<&'a OwnerProfile> {
    match owner {
        Some(id) => config.profile(id),
        None => Ok(config.default_owner()),
    }
}

/// The latest stored statement and its label, or a notice when there is none.
fn latest(store: &StatementStore, owner: &OwnerProfile) -> StatementResult<Option<(Statement, String)>> {
    match store.load_latest(owner)? {
        Some(stored) => {
            let label = stored.label();
            Ok(Some((stored.statement, label)))
        }
        None => {
            println!("No statements stored for '{}'", owner.owner_id());
            Ok(None)
        }
    }
}

fn print_statement(statement: &Statement) {
    let names: Vec<&str> = statement.columns().iter().map(|c| c.name.as_str()).collect();
    print_columns(statement, &names);
}

/// Prints the named columns as a left-aligned table.
fn print_columns(statement: &Statement, names: &[&str]) {
    let cells: Vec<Vec<String>> = (0..statement.len())
        .map(|row| {
            names
                .iter()
                .map(|name| statement.value(row, name).map(ToString::to_string).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain([name.chars().count()])
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |row: &[String]| {
        row.iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let header: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    println!("{}", line(&header));
    for row in &cells {
        println!("{}", line(row));
    }
}

/// Initializes the tracing subscriber.
fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), level))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
