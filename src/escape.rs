//! The single authority for mapping raw values to and from their escaped
//! string forms: RFC 4514 `<valueencoding>` for DN values and the RFC 4515
//! rule for search-filter values.

use crate::error::{Error, Result};
use crate::value::Value;

/// Symbols that a backslash may escape in a DN value.
pub(crate) const ESCAPABLE_SYMBOLS: [char; 10] = [' ', '"', '#', '+', ',', ';', '<', '=', '>', '\\'];

/// Characters that must be escaped anywhere inside a DN value.
const MUST_ESCAPE: [char; 7] = ['"', '+', ',', ';', '<', '>', '\\'];

/// Render a value with the minimal RFC 4514 escaping required to re-parse
/// to the same bytes.
///
/// Values whose bytes are not valid UTF-8 are written entirely as `\HH`
/// pairs; everything else keeps its spelling except for the mandatory
/// escapes (boundary spaces, a leading `#`, the special characters, NUL).
pub fn encode_dn_value(value: &Value) -> String {
    match std::str::from_utf8(value.as_bytes()) {
        Ok(s) => encode_dn_str(s),
        Err(_) => {
            let mut out = String::with_capacity(value.len() * 3);
            for byte in value.as_bytes() {
                push_hex_escape(&mut out, *byte);
            }
            out
        }
    }
}

/// Minimal RFC 4514 escaping of a text value.
pub fn encode_dn_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 2);
    for (i, c) in s.char_indices() {
        let first = i == 0;
        let last = i + c.len_utf8() == s.len();
        match c {
            ' ' if first || last => {
                out.push('\\');
                out.push(' ');
            }
            '#' if first => {
                out.push('\\');
                out.push('#');
            }
            '\0' => push_hex_escape(&mut out, 0),
            c if MUST_ESCAPE.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

fn push_hex_escape(out: &mut String, byte: u8) {
    out.push('\\');
    out.push_str(&hex::encode_upper([byte]));
}

/// Incremental decoder for backslash escape sequences.
///
/// The DN parser feeds it the bytes following a `\`; it yields the decoded
/// byte once the sequence is complete.
#[derive(Clone, Copy)]
pub(crate) enum Unescape {
    Idle,
    Started,
    HighNibble(u8),
}

impl Unescape {
    /// Consume the byte at `offset`, returning the decoded byte when the
    /// escape sequence completes.
    pub(crate) fn feed(&mut self, byte: u8, offset: usize) -> Result<Option<u8>> {
        match *self {
            Self::Started => {
                if byte.is_ascii() && ESCAPABLE_SYMBOLS.contains(&(byte as char)) {
                    *self = Self::Idle;
                    Ok(Some(byte))
                } else if byte.is_ascii_hexdigit() {
                    *self = Self::HighNibble(byte);
                    Ok(None)
                } else {
                    Err(Error::InvalidEscape { offset })
                }
            }
            Self::HighNibble(high) => {
                if !byte.is_ascii_hexdigit() {
                    return Err(Error::InvalidEscape { offset });
                }
                *self = Self::Idle;
                let mut decoded = [0u8; 1];
                hex::decode_to_slice([high, byte], &mut decoded)
                    .map_err(|_| Error::InvalidEscape { offset })?;
                Ok(Some(decoded[0]))
            }
            Self::Idle => {
                unreachable!("BUG: called `Unescape::feed` when no escape is active")
            }
        }
    }
}

/// Decode the digit run of a hex-string value (the part after `#`).
///
/// `offset` is the position of the first digit; `at_eof` tells whether the
/// run was terminated by the end of input, which turns an odd digit count
/// into [`Error::UnterminatedValue`] rather than [`Error::InvalidHex`].
pub(crate) fn decode_hex_string(digits: &str, offset: usize, at_eof: bool) -> Result<Vec<u8>> {
    if let Some(bad) = digits.bytes().position(|b| !b.is_ascii_hexdigit()) {
        return Err(Error::InvalidHex { offset: offset + bad });
    }
    if digits.is_empty() {
        return Err(Error::InvalidHex { offset });
    }
    if digits.len() % 2 != 0 {
        let end = offset + digits.len();
        return if at_eof {
            Err(Error::UnterminatedValue { offset: end })
        } else {
            Err(Error::InvalidHex { offset: end })
        };
    }
    hex::decode(digits).map_err(|_| Error::InvalidHex { offset })
}

/// Render a value with RFC 4515 filter escaping: `*`, `(`, `)`, `\` and
/// NUL become `\HH`, every other byte passes through.
pub fn encode_filter_value(value: &Value) -> String {
    match std::str::from_utf8(value.as_bytes()) {
        Ok(s) => encode_filter_str(s),
        Err(_) => {
            let mut out = String::with_capacity(value.len() * 3);
            for byte in value.as_bytes() {
                out.push('\\');
                out.push_str(&hex::encode([*byte]));
            }
            out
        }
    }
}

/// RFC 4515 filter escaping of a text value.
pub fn encode_filter_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 2);
    for c in s.chars() {
        match c {
            '*' => out.push_str("\\2a"),
            '(' => out.push_str("\\28"),
            ')' => out.push_str("\\29"),
            '\\' => out.push_str("\\5c"),
            '\0' => out.push_str("\\00"),
            c => out.push(c),
        }
    }
    out
}

/// Decode an RFC 4515 filter value: only `\HH` escapes are recognized.
///
/// `base` is the offset of `s` within the surrounding input and is added
/// to error positions.
pub(crate) fn decode_filter_value(s: &str, base: usize) -> Result<Vec<u8>> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            let pair = bytes.get(i + 1..i + 3).ok_or(Error::InvalidEscape { offset: base + i })?;
            let mut decoded = [0u8; 1];
            hex::decode_to_slice(pair, &mut decoded)
                .map_err(|_| Error::InvalidEscape { offset: base + i })?;
            out.push(decoded[0]);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}
