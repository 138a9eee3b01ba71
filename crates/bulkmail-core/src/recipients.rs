//! Recipient list loading.
//!
//! Input is comma separated text whose header row names an `Email` column.
//! Other columns are ignored.

use std::collections::HashSet;
use std::path::Path;

use thiserror::Error;

/// Why a recipient list could not be read.
#[derive(Debug, Error)]
pub enum RecipientError {
    /// Header row has no `Email` column.
    #[error("the file must contain an 'Email' column")]
    MissingEmailColumn,

    /// The file contains no header row.
    #[error("the recipient file is empty")]
    EmptyFile,

    /// The file could not be read.
    #[error("failed to read recipient file: {0}")]
    Io(#[from] std::io::Error),
}

const EMAIL_COLUMN: &str = "Email";

/// Parse recipients from CSV text.
///
/// Values are trimmed and unquoted, blanks are dropped and duplicates are
/// removed keeping the first occurrence.
///
/// # Errors
///
/// Returns an error if there is no header row or it lacks an `Email` column.
pub fn load_recipients(text: &str) -> Result<Vec<String>, RecipientError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());

    let header = lines.next().ok_or(RecipientError::EmptyFile)?;
    let column = split_fields(header)
        .iter()
        .position(|name| name == EMAIL_COLUMN)
        .ok_or(RecipientError::MissingEmailColumn)?;

    let mut seen = HashSet::new();
    let recipients: Vec<String> = lines
        .filter_map(|line| split_fields(line).into_iter().nth(column))
        .filter(|value| !value.is_empty())
        .filter(|value| seen.insert(value.clone()))
        .collect();

    tracing::debug!(count = recipients.len(), "loaded recipients");
    Ok(recipients)
}

/// Read and parse a recipient file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_recipients_file(path: impl AsRef<Path>) -> Result<Vec<String>, RecipientError> {
    let text = std::fs::read_to_string(path)?;
    load_recipients(&text)
}

/// Split one CSV row, honoring double quotes and `""` escapes.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn reads_email_column() {
        let list = load_recipients("Name,Email\nAda,ada@example.com\nBob,bob@example.com\n").unwrap();
        assert_eq!(list, vec!["ada@example.com", "bob@example.com"]);
    }

    #[test]
    fn dedupes_and_drops_blanks() {
        let text = "Email\r\na@example.com\r\n\r\n  \r\nb@example.com\r\na@example.com\r\n";
        let list = load_recipients(text).unwrap();
        assert_eq!(list, vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn missing_cells_are_blanks() {
        let list = load_recipients("Name,Email\nAda,\nBob\nCy, cy@example.com \n").unwrap();
        assert_eq!(list, vec!["cy@example.com"]);
    }

    #[test]
    fn quoted_values() {
        let text = "\"Name\",\"Email\"\n\"Lovelace, Ada\",\"ada@example.com\"\n";
        let list = load_recipients(text).unwrap();
        assert_eq!(list, vec!["ada@example.com"]);
    }

    #[test]
    fn header_must_be_exact() {
        assert!(matches!(
            load_recipients("email\na@example.com\n"),
            Err(RecipientError::MissingEmailColumn)
        ));
        assert!(matches!(
            load_recipients("Mail\na@example.com\n"),
            Err(RecipientError::MissingEmailColumn)
        ));
    }

    #[test]
    fn empty_text() {
        assert!(matches!(load_recipients(""), Err(RecipientError::EmptyFile)));
    }

    #[test]
    fn header_only_is_an_empty_list() {
        assert!(load_recipients("Email\n").unwrap().is_empty());
    }

    #[test]
    fn strips_byte_order_mark() {
        let list = load_recipients("\u{feff}Email\na@example.com\n").unwrap();
        assert_eq!(list, vec!["a@example.com"]);
    }

    #[test]
    fn split_fields_escaped_quote() {
        assert_eq!(split_fields(r#"a,"b ""c""",d"#), vec!["a", r#"b "c""#, "d"]);
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            load_recipients_file("/nonexistent/bulkmail/recipients.csv"),
            Err(RecipientError::Io(_))
        ));
    }
}
