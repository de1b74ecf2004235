pub mod csv;
pub mod spreadsheet;
pub mod traits;

pub mod prelude {
    pub use super::csv::prelude::*;
    pub use super::spreadsheet::prelude::*;
    pub use super::traits::GridParser;
}
