//! RFC 4515 search filters: the tagged filter tree and its parser.

use std::fmt;
use std::str::FromStr;

use serde_with::{DeserializeFromStr, SerializeDisplay};
use tracing::trace;

use crate::error::{Error, Result};
use crate::escape;
use crate::schema::SchemaView;
use crate::value::Value;

/// Knobs for the filter parser.
#[derive(Clone, Debug)]
pub struct FilterParseConfig {
    /// Maximum nesting depth before [`Error::NestingTooDeep`].
    pub max_depth: usize,
    /// Tolerate whitespace around parentheses and operators. Strict mode
    /// rejects it.
    pub relaxed: bool,
}

impl Default for FilterParseConfig {
    fn default() -> Self {
        Self {
            max_depth: 100,
            relaxed: false,
        }
    }
}

/// An RFC 4515 search filter.
#[derive(Clone, Debug, PartialEq, Eq, DeserializeFromStr, SerializeDisplay)]
pub enum Filter {
    /// `(&(…)(…))`, at least one child.
    And(Vec<Filter>),
    /// `(|(…)(…))`, at least one child.
    Or(Vec<Filter>),
    /// `(!(…))`, exactly one child.
    Not(Box<Filter>),
    /// `(attr=value)`.
    Equality { attribute: String, value: Value },
    /// `(attr=initial*any*…*final)`.
    Substring {
        attribute: String,
        initial: Option<String>,
        any: Vec<String>,
        last: Option<String>,
    },
    /// `(attr=*)`.
    Presence { attribute: String },
    /// `(attr>=value)`.
    GreaterEq { attribute: String, value: Value },
    /// `(attr<=value)`.
    LessEq { attribute: String, value: Value },
    /// `(attr~=value)`.
    Approximate { attribute: String, value: Value },
    /// `(attr:dn:rule:=value)` and friends.
    Extensible {
        attribute: Option<String>,
        rule: Option<String>,
        dn_attributes: bool,
        value: Value,
    },
    /// An item whose attribute the schema does not know; kept verbatim so
    /// evaluation can treat it per RFC 4511 and rendering round-trips.
    Undefined { raw: String },
}

impl Filter {
    /// Parse with the default configuration (strict, depth 100).
    pub fn parse(s: &str) -> Result<Self> {
        Self::parse_with(s, &FilterParseConfig::default())
    }

    /// Parse with an explicit configuration.
    pub fn parse_with(s: &str, config: &FilterParseConfig) -> Result<Self> {
        FilterParser::new(s, config, None).parse()
    }

    /// Parse schema-aware: items naming attributes the schema does not
    /// know become [`Filter::Undefined`] instead of erroring.
    pub fn parse_with_schema(
        schema: &dyn SchemaView,
        s: &str,
        config: &FilterParseConfig,
    ) -> Result<Self> {
        FilterParser::new(s, config, Some(schema)).parse()
    }
}

impl FromStr for Filter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(children) => {
                write!(f, "(&")?;
                for child in children {
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
            Self::Or(children) => {
                write!(f, "(|")?;
                for child in children {
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
            Self::Not(child) => write!(f, "(!{child})"),
            Self::Equality { attribute, value } => {
                write!(f, "({attribute}={})", escape::encode_filter_value(value))
            }
            Self::Substring {
                attribute,
                initial,
                any,
                last,
            } => {
                write!(f, "({attribute}=")?;
                if let Some(initial) = initial {
                    write!(f, "{}", escape::encode_filter_str(initial))?;
                }
                write!(f, "*")?;
                for part in any {
                    write!(f, "{}*", escape::encode_filter_str(part))?;
                }
                if let Some(last) = last {
                    write!(f, "{}", escape::encode_filter_str(last))?;
                }
                write!(f, ")")
            }
            Self::Presence { attribute } => write!(f, "({attribute}=*)"),
            Self::GreaterEq { attribute, value } => {
                write!(f, "({attribute}>={})", escape::encode_filter_value(value))
            }
            Self::LessEq { attribute, value } => {
                write!(f, "({attribute}<={})", escape::encode_filter_value(value))
            }
            Self::Approximate { attribute, value } => {
                write!(f, "({attribute}~={})", escape::encode_filter_value(value))
            }
            Self::Extensible {
                attribute,
                rule,
                dn_attributes,
                value,
            } => {
                write!(f, "(")?;
                if let Some(attribute) = attribute {
                    write!(f, "{attribute}")?;
                }
                if *dn_attributes {
                    write!(f, ":dn")?;
                }
                if let Some(rule) = rule {
                    write!(f, ":{rule}")?;
                }
                write!(f, ":={})", escape::encode_filter_value(value))
            }
            Self::Undefined { raw } => write!(f, "({raw})"),
        }
    }
}

struct FilterParser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    config: &'a FilterParseConfig,
    schema: Option<&'a dyn SchemaView>,
}

impl<'a> FilterParser<'a> {
    fn new(
        input: &'a str,
        config: &'a FilterParseConfig,
        schema: Option<&'a dyn SchemaView>,
    ) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            config,
            schema,
        }
    }

    fn parse(mut self) -> Result<Filter> {
        trace!(len = self.input.len(), relaxed = self.config.relaxed, "parsing filter");
        self.maybe_space();
        let filter = self.parse_filter(1)?;
        self.maybe_space();
        if !self.at_end() {
            return Err(self.invalid("characters after the closing parenthesis"));
        }
        Ok(filter)
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

    /// Relaxed mode tolerates whitespace between tokens.
    fn maybe_space(&mut self) {
        if self.config.relaxed {
            while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
                self.bump();
            }
        }
    }

    fn invalid(&self, detail: &str) -> Error {
        Error::InvalidFilter {
            offset: self.pos,
            detail: detail.to_owned(),
        }
    }

    fn expect(&mut self, byte: u8, detail: &str) -> Result<()> {
        if self.peek() != Some(byte) {
            return Err(self.invalid(detail));
        }
        self.bump();
        Ok(())
    }

    fn parse_filter(&mut self, depth: usize) -> Result<Filter> {
        if depth > self.config.max_depth {
            return Err(Error::NestingTooDeep {
                offset: self.pos,
                limit: self.config.max_depth,
            });
        }
        self.expect(b'(', "expected '('")?;
        self.maybe_space();
        let filter = match self.peek() {
            Some(b'&') => {
                self.bump();
                Filter::And(self.parse_children(depth)?)
            }
            Some(b'|') => {
                self.bump();
                Filter::Or(self.parse_children(depth)?)
            }
            Some(b'!') => {
                self.bump();
                self.maybe_space();
                Filter::Not(Box::new(self.parse_filter(depth + 1)?))
            }
            Some(_) => self.parse_item()?,
            None => return Err(self.invalid("unterminated filter")),
        };
        self.maybe_space();
        self.expect(b')', "expected ')'")?;
        Ok(filter)
    }

    fn parse_children(&mut self, depth: usize) -> Result<Vec<Filter>> {
        let mut children = Vec::new();
        loop {
            self.maybe_space();
            if self.peek() != Some(b'(') {
                break;
            }
            children.push(self.parse_filter(depth + 1)?);
        }
        if children.is_empty() {
            return Err(self.invalid("'&' and '|' require at least one child"));
        }
        Ok(children)
    }

    fn parse_item(&mut self) -> Result<Filter> {
        let item_start = self.pos;
        let attribute = self.parse_attribute();
        self.maybe_space();

        let filter = match self.peek() {
            Some(b':') => self.parse_extensible(attribute)?,
            Some(b'>') => {
                self.bump();
                self.expect(b'=', "expected '=' after '>'")?;
                let attribute = self.required_attribute(attribute, item_start)?;
                let value = self.parse_assertion_value()?;
                Filter::GreaterEq { attribute, value }
            }
            Some(b'<') => {
                self.bump();
                self.expect(b'=', "expected '=' after '<'")?;
                let attribute = self.required_attribute(attribute, item_start)?;
                let value = self.parse_assertion_value()?;
                Filter::LessEq { attribute, value }
            }
            Some(b'~') => {
                self.bump();
                self.expect(b'=', "expected '=' after '~'")?;
                let attribute = self.required_attribute(attribute, item_start)?;
                let value = self.parse_assertion_value()?;
                Filter::Approximate { attribute, value }
            }
            Some(b'=') => {
                self.bump();
                let attribute = self.required_attribute(attribute, item_start)?;
                self.parse_equality_or_substring(attribute)?
            }
            _ => return Err(self.invalid("expected a comparison operator")),
        };

        if let Some(schema) = self.schema {
            if let Some(attr) = filter_attribute(&filter) {
                if schema.lookup(attr).is_none() {
                    let raw = self.input[item_start..self.pos].trim().to_owned();
                    return Ok(Filter::Undefined { raw });
                }
            }
        }
        Ok(filter)
    }

    fn required_attribute(&self, attribute: Option<String>, item_start: usize) -> Result<String> {
        attribute.ok_or_else(|| Error::InvalidFilter {
            offset: item_start,
            detail: "missing attribute description".to_owned(),
        })
    }

    /// Consume an attribute description, or nothing for the attr-less
    /// extensible form.
    fn parse_attribute(&mut self) -> Option<String> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(b) if b.is_ascii_alphanumeric() || b == b'-' || b == b'.' || b == b';'
        ) {
            self.bump();
        }
        if self.pos == start {
            None
        } else {
            Some(self.input[start..self.pos].to_owned())
        }
    }

    /// `[attr] [":dn"] [":" rule] ":=" value`
    fn parse_extensible(&mut self, attribute: Option<String>) -> Result<Filter> {
        let mut dn_attributes = false;
        let mut rule: Option<String> = None;
        loop {
            self.expect(b':', "expected ':'")?;
            if self.peek() == Some(b'=') {
                self.bump();
                break;
            }
            let word = self
                .parse_attribute()
                .ok_or_else(|| self.invalid("empty extensible-match component"))?;
            if word.eq_ignore_ascii_case("dn") && !dn_attributes && rule.is_none() {
                dn_attributes = true;
            } else if rule.is_none() {
                rule = Some(word);
            } else {
                return Err(self.invalid("too many extensible-match components"));
            }
        }
        if attribute.is_none() && rule.is_none() {
            return Err(self.invalid("extensible match needs an attribute or a rule"));
        }
        let value = self.parse_assertion_value()?;
        Ok(Filter::Extensible {
            attribute,
            rule,
            dn_attributes,
            value,
        })
    }

    fn parse_equality_or_substring(&mut self, attribute: String) -> Result<Filter> {
        let start = self.pos;
        while !matches!(self.peek(), None | Some(b'(') | Some(b')')) {
            self.bump();
        }
        let mut raw = &self.input[start..self.pos];
        if self.config.relaxed {
            raw = raw.trim_matches(' ');
        }

        if raw == "*" {
            return Ok(Filter::Presence { attribute });
        }
        if !raw.contains('*') {
            let value = Value::from_bytes(escape::decode_filter_value(raw, start)?);
            return Ok(Filter::Equality { attribute, value });
        }

        let parts: Vec<&str> = raw.split('*').collect();
        let decode = |part: &str, offset: usize| -> Result<String> {
            let bytes = escape::decode_filter_value(part, offset)?;
            String::from_utf8(bytes).map_err(|_| Error::InvalidFilter {
                offset,
                detail: "substring component is not valid UTF-8".to_owned(),
            })
        };
        let mut offset = start;
        let mut initial = None;
        let mut any = Vec::new();
        let mut last = None;
        for (i, part) in parts.iter().enumerate() {
            let is_first = i == 0;
            let is_last = i == parts.len() - 1;
            if part.is_empty() {
                if !is_first && !is_last {
                    return Err(Error::InvalidFilter {
                        offset,
                        detail: "empty substring component".to_owned(),
                    });
                }
            } else if is_first {
                initial = Some(decode(part, offset)?);
            } else if is_last {
                last = Some(decode(part, offset)?);
            } else {
                any.push(decode(part, offset)?);
            }
            offset += part.len() + 1;
        }
        Ok(Filter::Substring {
            attribute,
            initial,
            any,
            last,
        })
    }

    fn parse_assertion_value(&mut self) -> Result<Value> {
        let start = self.pos;
        while !matches!(self.peek(), None | Some(b'(') | Some(b')') | Some(b'*')) {
            self.bump();
        }
        if self.peek() == Some(b'*') {
            return Err(self.invalid("'*' is not allowed in this assertion value"));
        }
        let mut raw = &self.input[start..self.pos];
        if self.config.relaxed {
            raw = raw.trim_matches(' ');
        }
        Ok(Value::from_bytes(escape::decode_filter_value(raw, start)?))
    }
}

/// The attribute an item asserts on, for the schema-aware undefined check.
fn filter_attribute(filter: &Filter) -> Option<&str> {
    match filter {
        Filter::Equality { attribute, .. }
        | Filter::Substring { attribute, .. }
        | Filter::Presence { attribute }
        | Filter::GreaterEq { attribute, .. }
        | Filter::LessEq { attribute, .. }
        | Filter::Approximate { attribute, .. } => Some(attribute),
        Filter::Extensible {
            attribute: Some(attribute),
            ..
        } => Some(attribute),
        _ => None,
    }
}
