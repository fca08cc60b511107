//! Bulk-record validation for uploaded recipient CSVs.
//!
//! Pure function over the uploaded bytes: no I/O, no state.

use std::collections::HashSet;

use serde::Deserialize;
use thiserror::Error;

use paperslip_core::{Email, EmailError};

/// UTF-8 byte-order-mark, tolerated at the start of uploads from
/// spreadsheet exports.
const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// One raw CSV row. The header row must contain an `email` column;
/// other columns are ignored.
#[derive(Debug, Deserialize)]
struct BulkRecord {
    email: String,
}

/// Validation failures for an uploaded CSV.
///
/// `Empty` and `Malformed` are parse-class failures; `InvalidEmail` and
/// `Duplicate` are schema-class failures. All of them abort the whole bulk
/// request before any per-address work starts.
#[derive(Debug, Error)]
pub enum CsvError {
    /// The file parsed but contained zero data rows.
    #[error("CSV parsing failed: records not found")]
    Empty,

    /// The bytes could not be parsed as delimited text with a header row.
    #[error("CSV parsing failed: {0}")]
    Malformed(#[from] csv::Error),

    /// A row's email field is not a syntactically valid address.
    #[error("invalid email on row {row}: {source}")]
    InvalidEmail {
        /// 1-based data row number (header excluded).
        row: usize,
        source: EmailError,
    },

    /// Two rows share the same email address.
    #[error("there are duplicate emails in the CSV file: {0}")]
    Duplicate(Email),
}

/// Parse and validate an uploaded CSV into an ordered recipient list.
///
/// Tolerates a UTF-8 BOM, requires a header row with an `email` column,
/// and skips empty lines. Duplicate detection is case-sensitive exact
/// match, global across the whole input. Row order is preserved so that
/// dispatch outcomes correlate with the original CSV line numbers.
///
/// # Errors
///
/// Returns [`CsvError`] when the input is unparseable, has zero data rows,
/// contains an invalid email, or contains a duplicate email.
pub fn parse_recipients(raw: &[u8]) -> Result<Vec<Email>, CsvError> {
    let raw = raw.strip_prefix(UTF8_BOM).unwrap_or(raw);

    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(::csv::Trim::All)
        .from_reader(raw);

    let mut seen = HashSet::new();
    let mut recipients = Vec::new();

    for (index, record) in reader.deserialize::<BulkRecord>().enumerate() {
        let record = record?;
        let email = Email::parse(&record.email).map_err(|source| CsvError::InvalidEmail {
            row: index + 1,
            source,
        })?;

        if !seen.insert(email.clone()) {
            return Err(CsvError::Duplicate(email));
        }
        recipients.push(email);
    }

    if recipients.is_empty() {
        return Err(CsvError::Empty);
    }

    Ok(recipients)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_rows_in_input_order() {
        let input = b"email\nfirst@example.com\nsecond@example.com\nthird@example.com\n";
        let recipients = parse_recipients(input).unwrap();

        assert_eq!(recipients.len(), 3);
        assert_eq!(recipients[0].as_str(), "first@example.com");
        assert_eq!(recipients[1].as_str(), "second@example.com");
        assert_eq!(recipients[2].as_str(), "third@example.com");
    }

    #[test]
    fn test_bom_is_tolerated() {
        let input = b"\xef\xbb\xbfemail\nuser@example.com\n";
        let recipients = parse_recipients(input).unwrap();
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].as_str(), "user@example.com");
    }

    #[test]
    fn test_empty_lines_are_skipped() {
        let input = b"email\nfirst@example.com\n\nsecond@example.com\n\n";
        let recipients = parse_recipients(input).unwrap();
        assert_eq!(recipients.len(), 2);
    }

    #[test]
    fn test_header_only_is_empty() {
        let result = parse_recipients(b"email\n");
        assert!(matches!(result, Err(CsvError::Empty)));
    }

    #[test]
    fn test_no_bytes_is_empty() {
        let result = parse_recipients(b"");
        assert!(matches!(result, Err(CsvError::Empty)));
    }

    #[test]
    fn test_invalid_email_is_rejected() {
        let input = b"email\nfirst@example.com\nnot-an-address\n";
        match parse_recipients(input) {
            Err(CsvError::InvalidEmail { row, .. }) => assert_eq!(row, 2),
            other => panic!("expected invalid email, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicates_rejected_globally() {
        // Duplicates are not adjacent; the check is over the whole input.
        let input = b"email\na@example.com\nb@example.com\na@example.com\n";
        match parse_recipients(input) {
            Err(err @ CsvError::Duplicate(_)) => {
                assert!(err.to_string().contains("duplicate"));
            }
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_check_is_case_sensitive() {
        // Differently-cased addresses are distinct records.
        let input = b"email\nuser@example.com\nUser@example.com\n";
        let recipients = parse_recipients(input).unwrap();
        assert_eq!(recipients.len(), 2);
    }

    #[test]
    fn test_extra_columns_are_ignored() {
        let input = b"name,email\nalice,alice@example.com\nbob,bob@example.com\n";
        let recipients = parse_recipients(input).unwrap();
        assert_eq!(recipients.len(), 2);
        assert_eq!(recipients[0].as_str(), "alice@example.com");
    }

    #[test]
    fn test_missing_email_column_is_malformed() {
        let input = b"name\nalice\n";
        assert!(matches!(
            parse_recipients(input),
            Err(CsvError::Malformed(_))
        ));
    }
}
