//! Minimal comma-separated codec for the history file and snapshot exports.
//!
//! Records are one per line. Parsing is per line so one damaged row cannot
//! swallow the rows after it.

use std::io::{self, Write};
use std::mem::take;

use crate::error::TrackerError;

const SEP: char = ',';

/// Parse one line into fields. Handles quoted fields and `""` escapes.
pub fn parse_record(line: &str) -> Result<Vec<String>, TrackerError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if matches!(chars.peek(), Some('"')) {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            c if c == SEP && !in_quotes => fields.push(take(&mut field)),
            c => field.push(c),
        }
    }

    if in_quotes {
        return Err(TrackerError::Parse(format!("unterminated quote in {line:?}")));
    }
    fields.push(field);
    Ok(fields)
}

fn needs_quotes(field: &str) -> bool {
    field.contains(SEP) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Format one record as a complete line, newline included.
pub fn format_record<S: AsRef<str>>(row: &[S]) -> String {
    let mut out = String::new();
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            out.push(SEP);
        }
        let cell = cell.as_ref();
        if needs_quotes(cell) {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(cell);
        }
    }
    out.push('\n');
    out
}

/// Write one record to any writer.
pub fn write_record<W: Write, S: AsRef<str>>(mut w: W, row: &[S]) -> io::Result<()> {
    w.write_all(format_record(row).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields() {
        assert_eq!(parse_record("a,b,,d").unwrap(), vec!["a", "b", "", "d"]);
    }

    #[test]
    fn quoted_fields_with_separators_and_quotes() {
        let line = format_record(&["abc", "Heated Rivalry, \"1x01\"", "7"]);
        assert_eq!(line, "abc,\"Heated Rivalry, \"\"1x01\"\"\",7\n");
        assert_eq!(
            parse_record(line.trim_end()).unwrap(),
            vec!["abc", "Heated Rivalry, \"1x01\"", "7"]
        );
    }

    #[test]
    fn crlf_tolerated() {
        assert_eq!(parse_record("x,y\r").unwrap(), vec!["x", "y"]);
    }

    #[test]
    fn unterminated_quote_is_parse_error() {
        assert!(matches!(parse_record("a,\"bc"), Err(TrackerError::Parse(_))));
    }
}
