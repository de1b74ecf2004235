use crate::errors::StatementResult;
use crate::types::RawTable;

/// Reads an uploaded file into a positional grid, without guessing headers.
pub trait GridParser {
    fn parse(content: &[u8]) -> StatementResult<RawTable>;

    fn is_supported(filename: &str) -> bool;
}

/// Lower-cased extension of `filename`, if any.
pub(crate) fn extension(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}
