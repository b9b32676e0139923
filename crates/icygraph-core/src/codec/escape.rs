//! Delimiter escaping for row fields.
//!
//! Rows join their fields with a reserved delimiter byte, so serialised
//! field bytes must never contain it. The escape rewrites the delimiter and
//! the escape byte itself into two-byte sequences; the rewrite preserves
//! lexicographic order, which the range factory relies on.

use thiserror::Error as ThisError;

/// Joins row fields. Escaped field bytes never contain it.
pub const DELIMITER: u8 = 0x00;

const ESCAPE: u8 = 0x01;
const ESCAPED_DELIMITER: u8 = 0x02;
const ESCAPED_ESCAPE: u8 = 0x03;

///
/// EscapeError
/// (decode / corruption boundary)
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum EscapeError {
    #[error("escape byte at end of field")]
    DanglingEscape,

    #[error("invalid escape sequence {byte:#04x}")]
    InvalidEscape { byte: u8 },

    #[error("unescaped delimiter inside field")]
    RawDelimiter,
}

#[must_use]
pub fn escape(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    for &byte in raw {
        match byte {
            DELIMITER => out.extend_from_slice(&[ESCAPE, ESCAPED_DELIMITER]),
            ESCAPE => out.extend_from_slice(&[ESCAPE, ESCAPED_ESCAPE]),
            other => out.push(other),
        }
    }
    out
}

pub fn unescape(escaped: &[u8]) -> Result<Vec<u8>, EscapeError> {
    let mut out = Vec::with_capacity(escaped.len());
    let mut iter = escaped.iter();
    while let Some(&byte) = iter.next() {
        match byte {
            DELIMITER => return Err(EscapeError::RawDelimiter),
            ESCAPE => match iter.next() {
                Some(&ESCAPED_DELIMITER) => out.push(DELIMITER),
                Some(&ESCAPED_ESCAPE) => out.push(ESCAPE),
                Some(&other) => return Err(EscapeError::InvalidEscape { byte: other }),
                None => return Err(EscapeError::DanglingEscape),
            },
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Split a row into its delimiter-separated fields.
#[must_use]
pub fn split_fields(row: &[u8]) -> Vec<&[u8]> {
    row.split(|&b| b == DELIMITER).collect()
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn escaped_fields_contain_no_delimiter() {
        let escaped = escape(&[0, 1, 2, 0]);
        assert!(!escaped.contains(&DELIMITER));
    }

    #[test]
    fn unescape_rejects_raw_delimiter() {
        assert_eq!(unescape(&[5, 0, 5]), Err(EscapeError::RawDelimiter));
    }

    #[test]
    fn unescape_rejects_dangling_escape() {
        assert_eq!(unescape(&[5, ESCAPE]), Err(EscapeError::DanglingEscape));
    }

    proptest! {
        #[test]
        fn roundtrip(raw: Vec<u8>) {
            prop_assert_eq!(unescape(&escape(&raw)).unwrap(), raw);
        }

        #[test]
        fn escape_preserves_order(a: Vec<u8>, b: Vec<u8>) {
            let (ea, eb) = (escape(&a), escape(&b));
            prop_assert_eq!(ea.cmp(&eb), a.cmp(&b));
        }
    }
}
