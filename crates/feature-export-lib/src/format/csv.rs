//! CSV encoding of uniform records

use crate::Result;
use ::csv::{QuoteStyle, Terminator, WriterBuilder};

/// Name of the global row number column
pub const ROW_NUMBER_FIELD: &str = "num_registro";

/// A record that can be written as one CSV line
///
/// All records passed to [`to_csv`] are expected to share the same fields; the
/// header is taken from the first one.
pub trait CsvRecord {
    fn field_names(&self) -> Vec<String>;
    fn field_values(&self) -> Vec<String>;
}

/// A record prefixed with its 1-based position in the export
#[derive(Debug, Clone, Copy)]
pub struct NumberedRow<'a, R> {
    pub number: usize,
    pub row: &'a R,
}

impl<R: CsvRecord> CsvRecord for NumberedRow<'_, R> {
    fn field_names(&self) -> Vec<String> {
        std::iter::once(ROW_NUMBER_FIELD.to_string())
            .chain(self.row.field_names())
            .collect()
    }

    fn field_values(&self) -> Vec<String> {
        std::iter::once(self.number.to_string())
            .chain(self.row.field_values())
            .collect()
    }
}

/// Number rows sequentially, starting at 1
pub fn number_rows<R>(rows: &[R]) -> Vec<NumberedRow<'_, R>> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| NumberedRow {
            number: index + 1,
            row,
        })
        .collect()
}

/// Encode records as CSV
///
/// Lines are separated by `\n` with no terminator after the last record. Fields
/// are quoted only when they contain a delimiter, quote or line break. No input
/// rows produce an empty string, without header.
pub fn to_csv<R: CsvRecord>(rows: &[R]) -> Result<String> {
    #[cfg(feature = "profiling")]
    profiling::scope!("csv::to_csv");

    let Some(first) = rows.first() else {
        return Ok(String::new());
    };

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(first.field_names())?;
    for row in rows {
        writer.write_record(row.field_values())?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| ::csv::Error::from(err.into_error()))?;
    let mut content = String::from_utf8(bytes).map_err(|err| {
        ::csv::Error::from(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    })?;

    if content.ends_with('\n') {
        content.pop();
    }
    Ok(content)
}
