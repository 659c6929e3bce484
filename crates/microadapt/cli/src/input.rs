//! Parsing of recorded numeric rows.
//!
//! One observation per line, components separated by commas and/or
//! whitespace. Blank lines and `#` comments are skipped.

use std::io::BufRead;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("line {line}: `{token}` is not a number")]
    NotANumber { line: usize, token: String },

    #[error("line {line}: value {value} is not finite")]
    NonFinite { line: usize, value: f64 },
}

/// Parse a single line. `Ok(None)` for blank or comment lines.
pub fn parse_row(line_no: usize, line: &str) -> Result<Option<Vec<f64>>, InputError> {
    let content = line.split('#').next().unwrap_or_default().trim();
    if content.is_empty() {
        return Ok(None);
    }
    content
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|token| {
            let value: f64 = token.parse().map_err(|_| InputError::NotANumber {
                line: line_no,
                token: token.to_string(),
            })?;
            if value.is_finite() {
                Ok(value)
            } else {
                Err(InputError::NonFinite {
                    line: line_no,
                    value,
                })
            }
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Iterate parsed rows of a reader, with 1-based line numbers.
///
/// I/O errors end the iteration with an `Err`; parse errors are yielded per line.
pub fn rows<R: BufRead>(
    reader: R,
) -> impl Iterator<Item = std::io::Result<(usize, Result<Vec<f64>, InputError>)>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(i, line)| match line {
            Err(e) => Some(Err(e)),
            Ok(text) => parse_row(i + 1, &text)
                .transpose()
                .map(|row| Ok((i + 1, row))),
        })
}
