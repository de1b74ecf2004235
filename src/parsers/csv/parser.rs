use crate::errors::StatementResult;
use crate::parsers::traits::{GridParser, extension};
use crate::types::{RawCell, RawTable};
use csv::{ByteRecord, ReaderBuilder};

/// Lines inspected when guessing the delimiter.
const SNIFF_LINES: usize = 10;

pub struct CsvParser;

impl GridParser for CsvParser {
    fn is_supported(filename: &str) -> bool {
        extension(filename).is_some_and(|ext| ext == "csv")
    }

    fn parse(content: &[u8]) -> StatementResult<RawTable> {
        let content = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content);

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(sniff_delimiter(content))
            .from_reader(content);

        let mut rows = Vec::new();
        let mut record = ByteRecord::new();
        while reader.read_byte_record(&mut record)? {
            rows.push(
                record
                    .iter()
                    .map(|field| RawCell::from(String::from_utf8_lossy(field).into_owned()))
                    .collect(),
            );
        }

        Ok(RawTable::new(rows))
    }
}

/// Picks `;`, tab or `,`, whichever is most frequent in the first lines.
///
/// Ties go to `,`.
fn sniff_delimiter(content: &[u8]) -> u8 {
    let head: Vec<&[u8]> = content.split(|b| *b == b'\n').take(SNIFF_LINES).collect();
    let count = |delim: u8| -> usize {
        head.iter()
            .map(|line| line.iter().filter(|b| **b == delim).count())
            .sum()
    };

    let commas = count(b',');
    [b';', b'\t']
        .into_iter()
        .map(|d| (d, count(d)))
        .filter(|(_, n)| *n > commas)
        .max_by_key(|(_, n)| *n)
        .map(|(d, _)| d)
        .unwrap_or(b',')
}
