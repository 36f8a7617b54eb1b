//! RFC 4516 LDAP URLs.
//!
//! `scheme://[host[:port]][/dn[?attrs[?scope[?filter[?exts]]]]]`. The DN
//! and filter fields are percent-decoded and handed to the DN and filter
//! parsers of this crate.

use std::fmt;
use std::str::FromStr;

use serde_with::{DeserializeFromStr, SerializeDisplay};
use tracing::trace;

use crate::dn::Dn;
use crate::error::{Error, Result};
use crate::filter::{Filter, FilterParseConfig};

/// URL scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    Ldap,
    Ldaps,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ldap => f.write_str("ldap"),
            Self::Ldaps => f.write_str("ldaps"),
        }
    }
}

/// Host part of an LDAP URL, kept in its textual spelling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Host {
    /// Four dotted octets.
    Ipv4(String),
    /// IPv6 literal, stored without the brackets.
    Ipv6(String),
    /// `v<hex>.<chars>` literal, stored without the brackets.
    IpvFuture(String),
    /// Registered name.
    RegName(String),
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipv4(s) | Self::RegName(s) => f.write_str(s),
            Self::Ipv6(s) | Self::IpvFuture(s) => write!(f, "[{s}]"),
        }
    }
}

/// Search scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scope {
    #[default]
    Base,
    One,
    Sub,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => f.write_str("base"),
            Self::One => f.write_str("one"),
            Self::Sub => f.write_str("sub"),
        }
    }
}

/// One URL extension: `[!]name[=value]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlExtension {
    pub critical: bool,
    pub name: String,
    pub value: Option<String>,
}

/// A parsed LDAP URL.
#[derive(Clone, Debug, PartialEq, Eq, DeserializeFromStr, SerializeDisplay)]
pub struct LdapUrl {
    scheme: Scheme,
    host: Option<Host>,
    port: Option<u16>,
    dn: Dn,
    attributes: Vec<String>,
    scope: Option<Scope>,
    filter: Option<Filter>,
    extensions: Vec<UrlExtension>,
}

impl LdapUrl {
    /// Parse an RFC 4516 URL.
    pub fn parse(s: &str) -> Result<Self> {
        trace!(len = s.len(), "parsing LDAP URL");
        UrlParser::new(s).parse()
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> Option<&Host> {
        self.host.as_ref()
    }

    /// The explicit port, or -1 when the URL does not carry one.
    pub fn port(&self) -> i32 {
        self.port.map(i32::from).unwrap_or(-1)
    }

    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// The search scope; defaults to [`Scope::Base`] when the URL omits it.
    pub fn scope(&self) -> Scope {
        self.scope.unwrap_or_default()
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn extensions(&self) -> &[UrlExtension] {
        &self.extensions
    }
}

impl FromStr for LdapUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for LdapUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme)?;
        if let Some(host) = &self.host {
            write!(f, "{host}")?;
        }
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }

        let dn = pct_encode(self.dn.name());
        let attrs = self
            .attributes
            .iter()
            .map(|a| pct_encode_item(a))
            .collect::<Vec<_>>()
            .join(",");
        let scope = self.scope.map(|s| s.to_string()).unwrap_or_default();
        let filter = self
            .filter
            .as_ref()
            .map(|filter| pct_encode(&filter.to_string()))
            .unwrap_or_default();
        let exts = self
            .extensions
            .iter()
            .map(|ext| {
                let mut out = String::new();
                if ext.critical {
                    out.push('!');
                }
                out.push_str(&pct_encode_item(&ext.name));
                if let Some(value) = &ext.value {
                    out.push('=');
                    out.push_str(&pct_encode_item(value));
                }
                out
            })
            .collect::<Vec<_>>()
            .join(",");

        let mut fields = vec![dn, attrs, scope, filter, exts];
        while fields.last().is_some_and(|field| field.is_empty()) {
            fields.pop();
        }
        if fields.is_empty() {
            return Ok(());
        }
        write!(f, "/{}", fields.join("?"))
    }
}

struct UrlParser<'a> {
    input: &'a str,
}

impl<'a> UrlParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input }
    }

    fn invalid(&self, offset: usize, detail: &str) -> Error {
        Error::InvalidUrl {
            offset,
            detail: detail.to_owned(),
        }
    }

    fn parse(self) -> Result<LdapUrl> {
        let scheme_end = self
            .input
            .find("://")
            .ok_or_else(|| self.invalid(0, "missing '://'"))?;
        let scheme = match &self.input[..scheme_end] {
            s if s.eq_ignore_ascii_case("ldap") => Scheme::Ldap,
            s if s.eq_ignore_ascii_case("ldaps") => Scheme::Ldaps,
            _ => return Err(self.invalid(0, "scheme must be 'ldap' or 'ldaps'")),
        };

        let rest_start = scheme_end + 3;
        let rest = &self.input[rest_start..];
        let (authority, fields) = match rest.find('/') {
            Some(slash) => (&rest[..slash], Some(&rest[slash + 1..])),
            None => (rest, None),
        };
        let (host, port) = self.parse_authority(authority, rest_start)?;

        let mut url = LdapUrl {
            scheme,
            host,
            port,
            dn: Dn::root(),
            attributes: Vec::new(),
            scope: None,
            filter: None,
            extensions: Vec::new(),
        };

        let Some(fields) = fields else {
            return Ok(url);
        };
        let fields_start = rest_start + authority.len() + 1;
        let mut offset = fields_start;
        for (index, field) in fields.splitn(5, '?').enumerate() {
            match index {
                0 => url.dn = self.parse_dn_field(field, offset)?,
                1 => url.attributes = self.parse_attributes(field, offset)?,
                2 => url.scope = self.parse_scope(field, offset)?,
                3 => url.filter = self.parse_filter_field(field, offset)?,
                4 => url.extensions = self.parse_extensions(field, offset)?,
                _ => unreachable!("BUG: splitn(5) produced more than five fields"),
            }
            offset += field.len() + 1;
        }
        Ok(url)
    }

    fn parse_authority(&self, authority: &str, base: usize) -> Result<(Option<Host>, Option<u16>)> {
        if authority.is_empty() {
            return Ok((None, None));
        }

        let (host_part, port_part) = if let Some(rest) = authority.strip_prefix('[') {
            let close = rest
                .find(']')
                .ok_or_else(|| self.invalid(base, "unclosed '[' in host"))?;
            let literal = &rest[..close];
            let after = &rest[close + 1..];
            let port_part = match after.strip_prefix(':') {
                Some(port) => Some(port),
                None if after.is_empty() => None,
                None => return Err(self.invalid(base + 1 + close + 1, "junk after ']'")),
            };
            let host = if literal.starts_with('v') || literal.starts_with('V') {
                self.validate_ipvfuture(literal, base + 1)?;
                Host::IpvFuture(literal.to_owned())
            } else {
                self.validate_ipv6(literal, base + 1)?;
                Host::Ipv6(literal.to_owned())
            };
            (host, port_part)
        } else {
            let (host_text, port_part) = match authority.find(':') {
                Some(colon) => (&authority[..colon], Some(&authority[colon + 1..])),
                None => (authority, None),
            };
            if host_text.is_empty() {
                return Err(self.invalid(base, "empty host before ':'"));
            }
            let host = if host_text.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
                self.validate_ipv4(host_text, base)?;
                Host::Ipv4(host_text.to_owned())
            } else {
                self.validate_reg_name(host_text, base)?;
                Host::RegName(host_text.to_owned())
            };
            (host, port_part)
        };

        let port = match port_part {
            None => None,
            Some(digits) => {
                let port_offset = base + authority.len() - digits.len();
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(self.invalid(port_offset, "port must be decimal digits"));
                }
                let port: u32 = digits
                    .parse()
                    .map_err(|_| self.invalid(port_offset, "port out of range"))?;
                if !(1..=65535).contains(&port) {
                    return Err(self.invalid(port_offset, "port out of range"));
                }
                Some(port as u16)
            }
        };
        Ok((Some(host_part), port))
    }

    fn validate_ipv4(&self, host: &str, offset: usize) -> Result<()> {
        let octets: Vec<&str> = host.split('.').collect();
        let valid = octets.len() == 4
            && octets.iter().all(|octet| {
                !octet.is_empty()
                    && octet.len() <= 3
                    && !(octet.len() > 1 && octet.starts_with('0'))
                    && octet.parse::<u16>().map(|n| n <= 255).unwrap_or(false)
            });
        if !valid {
            return Err(self.invalid(offset, "malformed IPv4 address"));
        }
        Ok(())
    }

    fn validate_ipv6(&self, literal: &str, offset: usize) -> Result<()> {
        let halves: Vec<&str> = literal.splitn(3, "::").collect();
        if halves.len() > 2 {
            return Err(self.invalid(offset, "'::' may appear at most once"));
        }
        let compressed = halves.len() == 2;
        let mut groups = 0usize;
        for (index, half) in halves.iter().enumerate() {
            if half.is_empty() {
                continue;
            }
            let parts: Vec<&str> = half.split(':').collect();
            let last_of_address = index == halves.len() - 1;
            for (i, group) in parts.iter().enumerate() {
                let is_last = last_of_address && i == parts.len() - 1;
                if is_last && group.contains('.') {
                    // Embedded IPv4 tail takes the room of two groups.
                    self.validate_ipv4(group, offset)?;
                    groups += 2;
                    continue;
                }
                let hex = !group.is_empty()
                    && group.len() <= 4
                    && group.bytes().all(|b| b.is_ascii_hexdigit());
                if !hex {
                    return Err(self.invalid(offset, "malformed IPv6 group"));
                }
                groups += 1;
            }
        }
        let valid = if compressed { groups < 8 } else { groups == 8 };
        if !valid {
            return Err(self.invalid(offset, "wrong number of IPv6 groups"));
        }
        Ok(())
    }

    fn validate_ipvfuture(&self, literal: &str, offset: usize) -> Result<()> {
        let body = &literal[1..];
        let dot = body
            .find('.')
            .ok_or_else(|| self.invalid(offset, "IPvFuture needs a '.'"))?;
        let version = &body[..dot];
        let tail = &body[dot + 1..];
        let valid = !version.is_empty()
            && version.bytes().all(|b| b.is_ascii_hexdigit())
            && !tail.is_empty()
            && tail
                .bytes()
                .all(|b| is_unreserved(b) || is_sub_delim(b) || b == b':');
        if !valid {
            return Err(self.invalid(offset, "malformed IPvFuture literal"));
        }
        Ok(())
    }

    fn validate_reg_name(&self, host: &str, offset: usize) -> Result<()> {
        let bytes = host.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            if b == b'%' {
                let ok = bytes.len() >= i + 3
                    && bytes[i + 1].is_ascii_hexdigit()
                    && bytes[i + 2].is_ascii_hexdigit();
                if !ok {
                    return Err(self.invalid(offset + i, "broken percent-escape in host"));
                }
                i += 3;
                continue;
            }
            if !is_unreserved(b) && !is_sub_delim(b) {
                return Err(self.invalid(offset + i, "invalid character in host"));
            }
            i += 1;
        }
        Ok(())
    }

    fn parse_dn_field(&self, field: &str, offset: usize) -> Result<Dn> {
        let decoded = self.pct_decode(field, offset)?;
        Dn::parse(&decoded).map_err(|err| Error::InvalidUrl {
            offset,
            detail: format!("bad DN field: {err}"),
        })
    }

    fn parse_attributes(&self, field: &str, offset: usize) -> Result<Vec<String>> {
        if field.is_empty() {
            return Ok(Vec::new());
        }
        let mut attributes = Vec::new();
        let mut item_offset = offset;
        for item in field.split(',') {
            let decoded = self.pct_decode(item, item_offset)?;
            if decoded.is_empty() {
                return Err(self.invalid(item_offset, "empty attribute description"));
            }
            attributes.push(decoded);
            item_offset += item.len() + 1;
        }
        Ok(attributes)
    }

    fn parse_scope(&self, field: &str, offset: usize) -> Result<Option<Scope>> {
        let decoded = self.pct_decode(field, offset)?;
        match decoded.as_str() {
            "" => Ok(None),
            s if s.eq_ignore_ascii_case("base") => Ok(Some(Scope::Base)),
            s if s.eq_ignore_ascii_case("one") => Ok(Some(Scope::One)),
            s if s.eq_ignore_ascii_case("sub") => Ok(Some(Scope::Sub)),
            _ => Err(self.invalid(offset, "scope must be 'base', 'one' or 'sub'")),
        }
    }

    fn parse_filter_field(&self, field: &str, offset: usize) -> Result<Option<Filter>> {
        let decoded = self.pct_decode(field, offset)?;
        if decoded.is_empty() {
            return Ok(None);
        }
        Filter::parse_with(&decoded, &FilterParseConfig::default())
            .map(Some)
            .map_err(|err| match err {
                deep @ Error::NestingTooDeep { .. } => deep,
                err => Error::InvalidUrl {
                    offset,
                    detail: format!("bad filter field: {err}"),
                },
            })
    }

    fn parse_extensions(&self, field: &str, offset: usize) -> Result<Vec<UrlExtension>> {
        if field.is_empty() {
            return Ok(Vec::new());
        }
        let mut extensions = Vec::new();
        let mut item_offset = offset;
        for item in field.split(',') {
            let (critical, body) = match item.strip_prefix('!') {
                Some(body) => (true, body),
                None => (false, item),
            };
            let (raw_name, raw_value) = match body.find('=') {
                Some(eq) => (&body[..eq], Some(&body[eq + 1..])),
                None => (body, None),
            };
            let name = self.pct_decode(raw_name, item_offset)?;
            if name.is_empty() {
                return Err(self.invalid(item_offset, "empty extension name"));
            }
            let value = match raw_value {
                Some(raw) => Some(self.pct_decode(raw, item_offset)?),
                None => None,
            };
            extensions.push(UrlExtension {
                critical,
                name,
                value,
            });
            item_offset += item.len() + 1;
        }
        Ok(extensions)
    }

    fn pct_decode(&self, s: &str, offset: usize) -> Result<String> {
        let bytes = s.as_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'%' {
                let pair = bytes
                    .get(i + 1..i + 3)
                    .ok_or_else(|| self.invalid(offset + i, "broken percent-escape"))?;
                let mut decoded = [0u8; 1];
                hex::decode_to_slice(pair, &mut decoded)
                    .map_err(|_| self.invalid(offset + i, "broken percent-escape"))?;
                out.push(decoded[0]);
                i += 3;
            } else {
                out.push(bytes[i]);
                i += 1;
            }
        }
        String::from_utf8(out).map_err(|_| self.invalid(offset, "field is not valid UTF-8"))
    }
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

fn is_sub_delim(b: u8) -> bool {
    matches!(
        b,
        b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*' | b'+' | b',' | b';' | b'='
    )
}

/// Percent-encode a whole field for rendering: unreserved characters,
/// sub-delims and the DN-friendly `:`, `@`, `/` pass through.
fn pct_encode(s: &str) -> String {
    pct_encode_with(s, |b| {
        is_unreserved(b) || is_sub_delim(b) || matches!(b, b':' | b'@' | b'/')
    })
}

/// Percent-encode one element of a comma-separated list; `,`, `=` and `!`
/// are delimiters at this level and must not appear raw.
fn pct_encode_item(s: &str) -> String {
    pct_encode_with(s, |b| {
        (is_unreserved(b) || is_sub_delim(b) || matches!(b, b':' | b'@' | b'/'))
            && !matches!(b, b',' | b'=' | b'!')
    })
}

fn pct_encode_with(s: &str, keep: impl Fn(u8) -> bool) -> String {
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if keep(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push_str(&hex::encode_upper([b]));
        }
    }
    out
}
