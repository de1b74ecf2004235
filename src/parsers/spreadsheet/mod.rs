mod parser;
mod types;

pub mod prelude {
    pub use super::parser::SpreadsheetParser;
    pub use super::types::ExcelSerial;
}
