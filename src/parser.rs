//! The DN parser: a fast single-pass scanner for plain ASCII names and a
//! full RFC 4514 state machine for everything else.
//!
//! Both paths produce structurally identical trees. The fast path gives up
//! at the first sight of an escape, a quote, a hex-string, a multi-valued
//! RDN or a non-ASCII byte, and the full parser re-reads the input from the
//! start; the full parser is also the sole authority on error offsets.

use tracing::trace;

use crate::ava::Ava;
use crate::dn::Dn;
use crate::error::{Error, Result};
use crate::escape::{self, Unescape};
use crate::rdn::Rdn;
use crate::schema::SchemaView;
use crate::value::Value;

pub(crate) fn parse_dn(input: &str, schema: Option<&dyn SchemaView>) -> Result<Dn> {
    if let Some(dn) = try_fast(input, schema) {
        return Ok(dn);
    }
    trace!(len = input.len(), "running full DN parser");
    parse_dn_full(input, schema)
}

/// Parse exactly one RDN. A separator after the first RDN is rejected:
/// trailing separators as [`Error::TrailingSeparator`], a second RDN as
/// [`Error::InvalidSyntax`].
pub(crate) fn parse_rdn(input: &str, schema: Option<&dyn SchemaView>) -> Result<Rdn> {
    let mut parser = DnParser::new(input, schema);
    parser.skip_spaces();
    if parser.at_end() {
        return Err(Error::EmptyRdn { offset: parser.pos });
    }
    let rdn = parser.parse_rdn(true)?;
    match parser.peek() {
        None => Ok(rdn),
        Some(b',') | Some(b';') => {
            let separator = parser.pos;
            parser.bump();
            parser.skip_spaces();
            if parser.at_end() {
                Err(Error::TrailingSeparator { offset: parser.pos })
            } else {
                Err(Error::InvalidSyntax { offset: separator })
            }
        }
        Some(_) => Err(Error::InvalidSyntax { offset: parser.pos }),
    }
}

/// Bytes whose presence anywhere in the input disqualifies the fast path.
fn needs_full_parser(byte: u8) -> bool {
    matches!(byte, b'\\' | b'"' | b'#' | b'+' | b';' | b'<' | b'>' | 0) || !byte.is_ascii()
}

/// Single-pass scanner for the common case: ASCII input, simple `descr`
/// types, plain values, `,` separators. Returns `None` whenever the input
/// deserves the full parser, whether because of features or because of
/// errors.
fn try_fast(input: &str, schema: Option<&dyn SchemaView>) -> Option<Dn> {
    if input.bytes().any(needs_full_parser) {
        return None;
    }
    if input.bytes().all(|b| b == b' ') {
        return Some(Dn::from_parser(input.to_owned(), Vec::new()));
    }

    let mut rdns = Vec::new();
    for segment in input.split(',') {
        let trimmed = segment.trim_matches(' ');
        if trimmed.is_empty() {
            return None;
        }
        let eq = trimmed.find('=')?;
        let ty = trimmed[..eq].trim_end_matches(' ');
        let value = trimmed[eq + 1..].trim_start_matches(' ');
        if !is_simple_descr(ty) {
            return None;
        }
        let mut ava = Ava::from_parts(
            trimmed.to_owned(),
            ty.to_owned(),
            Value::Text(value.to_owned()),
        );
        if let Some(schema) = schema {
            ava = ava.bind(schema).ok()?;
        }
        rdns.push(Rdn::from_parser(trimmed.to_owned(), vec![ava]));
    }
    Some(Dn::from_parser(input.to_owned(), rdns))
}

fn is_simple_descr(ty: &str) -> bool {
    let mut bytes = ty.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

pub(crate) fn parse_dn_full(input: &str, schema: Option<&dyn SchemaView>) -> Result<Dn> {
    let mut parser = DnParser::new(input, schema);
    parser.skip_spaces();
    if parser.at_end() {
        return Ok(Dn::from_parser(input.to_owned(), Vec::new()));
    }

    let mut rdns = Vec::new();
    loop {
        rdns.push(parser.parse_rdn(true)?);
        match parser.peek() {
            None => break,
            Some(b',') | Some(b';') => {
                parser.bump();
                parser.skip_spaces();
                if parser.at_end() {
                    return Err(Error::TrailingSeparator { offset: parser.pos });
                }
            }
            Some(_) => return Err(Error::InvalidSyntax { offset: parser.pos }),
        }
    }
    Ok(Dn::from_parser(input.to_owned(), rdns))
}

struct DnParser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    schema: Option<&'a dyn SchemaView>,
}

impl<'a> DnParser<'a> {
    fn new(input: &'a str, schema: Option<&'a dyn SchemaView>) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            schema,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.bump();
        }
    }

    /// Parse one RDN; the cursor must sit on its first significant byte and
    /// ends up on the following separator or at the end of input.
    fn parse_rdn(&mut self, at_rdn_start: bool) -> Result<Rdn> {
        let rdn_start = self.pos;
        let mut rdn_end = self.pos;
        let mut avas: Vec<Ava> = Vec::new();
        loop {
            let ava_start = self.pos;
            let user_type = self.parse_type(at_rdn_start && avas.is_empty())?;
            self.skip_spaces();
            match self.peek() {
                Some(b'=') => self.bump(),
                _ => {
                    return Err(Error::InvalidType {
                        offset: self.pos,
                        ty: user_type,
                    })
                }
            }
            let value_anchor = self.pos;
            self.skip_spaces();
            let (value, value_end) = self.parse_value(value_anchor)?;

            let name = self.input[ava_start..value_end].to_owned();
            let mut ava = Ava::from_parts(name, user_type, value);
            if let Some(schema) = self.schema {
                ava = ava.bind(schema).map_err(|err| err.at_base(ava_start))?;
            }
            if avas.contains(&ava) {
                return Err(Error::DuplicateAva {
                    offset: ava_start,
                    ty: ava.attribute_type().to_owned(),
                });
            }
            rdn_end = value_end;
            avas.push(ava);

            match self.peek() {
                Some(b'+') => {
                    self.bump();
                    self.skip_spaces();
                }
                _ => break,
            }
        }
        let name = self.input[rdn_start..rdn_end].to_owned();
        Ok(Rdn::from_parser(name, avas))
    }

    /// Parse an attribute type: `descr`, `numericoid`, or `OID.` followed
    /// by a numericoid. The cursor ends right after the last type byte.
    fn parse_type(&mut self, at_rdn_start: bool) -> Result<String> {
        let start = self.pos;
        match self.peek() {
            None => {
                return Err(Error::InvalidType {
                    offset: self.pos,
                    ty: String::new(),
                })
            }
            Some(b',') | Some(b';') if at_rdn_start => {
                return Err(Error::EmptyRdn { offset: self.pos })
            }
            Some(first) if first.is_ascii_alphabetic() => {
                while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'-') {
                    self.bump();
                }
                // A word followed by a dot is only valid as the OID prefix.
                if self.peek() == Some(b'.') {
                    let word = &self.input[start..self.pos];
                    if !word.eq_ignore_ascii_case("oid") {
                        return Err(Error::InvalidType {
                            offset: self.pos,
                            ty: word.to_owned(),
                        });
                    }
                    self.bump();
                    self.parse_numericoid()?;
                }
            }
            Some(first) if first.is_ascii_digit() => {
                self.parse_numericoid()?;
            }
            Some(_) => {
                return Err(Error::InvalidType {
                    offset: self.pos,
                    ty: self.input[self.pos..].chars().take(1).collect(),
                })
            }
        }
        Ok(self.input[start..self.pos].to_owned())
    }

    /// Consume `digit+ ( "." digit+ )+`, rejecting leading zeroes, empty
    /// arcs and single-arc OIDs.
    fn parse_numericoid(&mut self) -> Result<()> {
        let oid_start = self.pos;
        let mut arcs = 0usize;
        loop {
            let arc_start = self.pos;
            while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                self.bump();
            }
            let arc = &self.bytes[arc_start..self.pos];
            if arc.is_empty() || (arc.len() > 1 && arc[0] == b'0') {
                return Err(Error::InvalidType {
                    offset: arc_start,
                    ty: self.input[oid_start..self.pos].to_owned(),
                });
            }
            arcs += 1;
            if self.peek() == Some(b'.') {
                self.bump();
            } else {
                break;
            }
        }
        if arcs < 2 {
            return Err(Error::InvalidType {
                offset: oid_start,
                ty: self.input[oid_start..self.pos].to_owned(),
            });
        }
        Ok(())
    }

    /// Parse a value. The cursor must sit after the `=` (and any padding)
    /// and ends on the following separator or at the end of input; padding
    /// spaces before the separator are consumed. Returns the value and the
    /// input index one past its last significant byte; an all-padding value
    /// is empty and ends at `anchor`, right after the `=`.
    fn parse_value(&mut self, anchor: usize) -> Result<(Value, usize)> {
        match self.peek() {
            Some(b'#') => self.parse_hex_value(),
            Some(b'"') => self.parse_quoted_value(),
            _ => self.parse_plain_value(anchor),
        }
    }

    fn parse_hex_value(&mut self) -> Result<(Value, usize)> {
        self.bump();
        let digits_start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_hexdigit()) {
            self.bump();
        }
        let digits_end = self.pos;
        self.skip_spaces();
        if !matches!(self.peek(), None | Some(b',') | Some(b';') | Some(b'+')) {
            return Err(Error::InvalidHex { offset: self.pos });
        }
        let digits = &self.input[digits_start..digits_end];
        let at_eof = digits_end == self.bytes.len();
        let decoded = escape::decode_hex_string(digits, digits_start, at_eof)?;
        Ok((Value::Binary(decoded), digits_end))
    }

    fn parse_quoted_value(&mut self) -> Result<(Value, usize)> {
        self.bump();
        let mut bytes = Vec::new();
        loop {
            let Some(byte) = self.peek() else {
                return Err(Error::UnterminatedValue { offset: self.pos });
            };
            self.bump();
            match byte {
                b'"' => break,
                b'\\' => bytes.push(self.finish_escape()?),
                byte => bytes.push(byte),
            }
        }
        let value_end = self.pos;
        self.skip_spaces();
        if !matches!(self.peek(), None | Some(b',') | Some(b';') | Some(b'+')) {
            return Err(Error::InvalidSyntax { offset: self.pos });
        }
        Ok((Value::from_bytes(bytes), value_end))
    }

    fn parse_plain_value(&mut self, anchor: usize) -> Result<(Value, usize)> {
        let mut bytes = Vec::new();
        // Raw spaces may be interior or trailing padding; both markers lag
        // behind until the next significant byte resolves them.
        let mut content_len = 0usize;
        let mut end_of_content = anchor;
        loop {
            match self.peek() {
                None | Some(b',') | Some(b';') | Some(b'+') => break,
                Some(b'\\') => {
                    self.bump();
                    bytes.push(self.finish_escape()?);
                    content_len = bytes.len();
                    end_of_content = self.pos;
                }
                Some(b'"') | Some(b'<') | Some(b'>') | Some(0) => {
                    return Err(Error::InvalidSyntax { offset: self.pos })
                }
                Some(b' ') => {
                    bytes.push(b' ');
                    self.bump();
                }
                Some(byte) => {
                    bytes.push(byte);
                    self.bump();
                    content_len = bytes.len();
                    end_of_content = self.pos;
                }
            }
        }
        bytes.truncate(content_len);
        Ok((Value::from_bytes(bytes), end_of_content))
    }

    /// Decode the remainder of an escape sequence; the leading `\` has
    /// already been consumed.
    fn finish_escape(&mut self) -> Result<u8> {
        let mut state = Unescape::Started;
        loop {
            let Some(byte) = self.peek() else {
                return Err(Error::InvalidEscape { offset: self.pos });
            };
            self.bump();
            if let Some(decoded) = state.feed(byte, self.pos - 1)? {
                return Ok(decoded);
            }
        }
    }
}
