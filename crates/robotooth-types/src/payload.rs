//! Hex payload helpers.
//!
//! Command-line callers describe raw bytes as hex strings such as `5F`,
//! `0x5f 0x10` or `5f:10`. Separators (whitespace, `:`, `,`, `-`) and
//! `0x` prefixes are ignored.

use crate::error::{ParseError, ParseResult};

/// Parse a hex string into bytes.
///
/// # Examples
///
/// ```
/// use robotooth_types::parse_hex;
///
/// assert_eq!(parse_hex("5F").unwrap(), vec![0x5F]);
/// assert_eq!(parse_hex("0x01 0xff").unwrap(), vec![0x01, 0xFF]);
/// assert!(parse_hex("").is_err());
/// ```
pub fn parse_hex(input: &str) -> ParseResult<Vec<u8>> {
    let cleaned: String = input
        .split(|c: char| c.is_whitespace() || matches!(c, ':' | ',' | '-'))
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| {
            chunk
                .strip_prefix("0x")
                .or_else(|| chunk.strip_prefix("0X"))
                .unwrap_or(chunk)
        })
        .collect();

    if cleaned.is_empty() {
        return Err(ParseError::EmptyPayload);
    }
    if cleaned.len() % 2 != 0 {
        return Err(ParseError::OddLength(cleaned.len()));
    }

    let digits: Vec<char> = cleaned.chars().collect();
    let mut bytes = Vec::with_capacity(digits.len() / 2);
    for (index, pair) in digits.chunks(2).enumerate() {
        let high = hex_value(pair[0], index * 2)?;
        let low = hex_value(pair[1], index * 2 + 1)?;
        bytes.push((high << 4) | low);
    }
    Ok(bytes)
}

/// Format bytes as space-separated upper-case hex.
#[must_use]
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn hex_value(character: char, position: usize) -> ParseResult<u8> {
    character
        .to_digit(16)
        .map(|d| d as u8)
        .ok_or(ParseError::InvalidHexDigit {
            character,
            position,
        })
}
