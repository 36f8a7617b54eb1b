//! Value canonicalization driven by the attribute's equality matching rule.
//!
//! The canonical form produced here is what equality, ordering and hashing
//! of schema-aware names operate on.

use crate::error::{Error, Result};
use crate::schema::{self, SchemaView};
use crate::value::Value;
use crate::Dn;

/// Equality matching rule families fixed by the LDAP specification.
///
/// The set is closed, so canonicalization dispatches on this enum rather
/// than on a dynamic rule registry.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum MatchingRule {
    /// Fold case, map insignificant characters, trim and collapse
    /// whitespace. The default for most string syntaxes.
    CaseIgnore,
    /// As [`CaseIgnore`](MatchingRule::CaseIgnore) without the case fold.
    CaseExact,
    /// Remove all whitespace.
    NumericString,
    /// Recursively normalize the embedded DN.
    DistinguishedName,
    /// Identity over raw octets.
    OctetString,
    /// Resolve descriptors to their canonical numeric OID.
    ObjectIdentifier,
    /// Trim only; the fallback for attribute types the schema does not know.
    Identity,
}

impl MatchingRule {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::CaseIgnore => 0,
            Self::CaseExact => 1,
            Self::NumericString => 2,
            Self::DistinguishedName => 3,
            Self::OctetString => 4,
            Self::ObjectIdentifier => 5,
            Self::Identity => 6,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::CaseIgnore,
            1 => Self::CaseExact,
            2 => Self::NumericString,
            3 => Self::DistinguishedName,
            4 => Self::OctetString,
            5 => Self::ObjectIdentifier,
            6 => Self::Identity,
            _ => return None,
        })
    }
}

/// Canonicalize a value under the given matching rule.
///
/// String rules require the value bytes to form valid UTF-8 and fail with
/// [`Error::InvalidSyntax`] otherwise; [`MatchingRule::OctetString`] accepts
/// any bytes. The schema is consulted only by the rules that resolve names
/// ([`MatchingRule::ObjectIdentifier`]) or recurse
/// ([`MatchingRule::DistinguishedName`]).
pub fn prepare(
    rule: MatchingRule,
    value: &Value,
    schema: Option<&dyn SchemaView>,
) -> Result<String> {
    if rule == MatchingRule::OctetString {
        return Ok(hex_form(value.as_bytes()));
    }

    let s = match value.as_str() {
        Some(s) => s,
        None => std::str::from_utf8(value.as_bytes())
            .map_err(|err| Error::InvalidSyntax { offset: err.valid_up_to() })?,
    };

    match rule {
        MatchingRule::CaseIgnore => Ok(fold_case(&collapse_spaces(&map_insignificant(s)))),
        MatchingRule::CaseExact => Ok(collapse_spaces(&map_insignificant(s))),
        MatchingRule::NumericString => Ok(s.chars().filter(|c| !c.is_whitespace()).collect()),
        MatchingRule::DistinguishedName => {
            let dn = match schema {
                Some(schema) => Dn::with_schema(schema, s),
                None => Dn::parse(s),
            };
            dn.map(|dn| dn.normalized())
                .map_err(|err| Error::InvalidSyntax { offset: err.offset() })
        }
        MatchingRule::ObjectIdentifier => {
            let key = schema::strip_oid_prefix(s.trim());
            if schema::is_numeric_oid(key) {
                return Ok(key.to_owned());
            }
            Ok(schema
                .and_then(|schema| schema.oid_of(key))
                .unwrap_or_else(|| key.to_ascii_lowercase()))
        }
        MatchingRule::Identity => Ok(s.trim().to_owned()),
        MatchingRule::OctetString => unreachable!(),
    }
}

/// Canonical string rendering of a binary value: `#` followed by lowercase
/// hex pairs, the same spelling the hex-string production re-parses.
pub(crate) fn hex_form(bytes: &[u8]) -> String {
    format!("#{}", hex::encode(bytes))
}

/// Replace insignificant characters before comparison.
///
/// Whitespace variants become a plain space, soft hyphens, joiners and
/// other format characters disappear entirely.
///
/// <https://datatracker.ietf.org/doc/html/rfc4518#section-2>
///
/// TODO: extend to the full RFC 4518 appendix B mapping table.
fn map_insignificant(s: &str) -> String {
    s.chars()
        .filter_map(|c| {
            if c == '\u{0009}'
                || c == '\u{000A}'
                || c == '\u{000B}'
                || c == '\u{000C}'
                || c == '\u{000D}'
                || c == '\u{0085}'
                || c.is_whitespace()
            {
                // These characters are compared as if they were a simple
                // space
                Some(' ')
            } else if c == '\u{00AD}'
                || c == '\u{034F}'
                || c == '\u{1806}'
                || ('\u{180B}'..='\u{180D}').contains(&c)
                || c == '\u{200B}'
                || ('\u{FE00}'..='\u{FE0F}').contains(&c)
                || c == '\u{FEFF}'
                || c.is_control()
            {
                // These characters are ignored during comparison
                None
            } else {
                Some(c)
            }
        })
        .collect()
}

/// Trim and collapse internal whitespace runs to a single space.
fn collapse_spaces(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for word in s.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

fn fold_case(s: &str) -> String {
    s.chars().flat_map(char::to_lowercase).collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::{prepare, MatchingRule};
    use crate::error::Error;
    use crate::schema::CoreSchema;
    use crate::value::Value;

    fn text(s: &str) -> Value {
        Value::Text(s.to_owned())
    }

    #[test]
    fn case_ignore_trims_collapses_and_folds() {
        let prepped = prepare(MatchingRule::CaseIgnore, &text("  Kate \t\u{00A0} BUSH  "), None);
        assert_eq!(prepped.unwrap(), "kate bush");
    }

    #[test]
    fn case_exact_preserves_case() {
        let prepped = prepare(MatchingRule::CaseExact, &text("  Kate  Bush "), None);
        assert_eq!(prepped.unwrap(), "Kate Bush");
    }

    #[test]
    fn numeric_string_strips_all_whitespace() {
        let prepped = prepare(MatchingRule::NumericString, &text(" +46 8 123 456 "), None);
        assert_eq!(prepped.unwrap(), "+468123456");
    }

    #[test]
    fn identity_only_trims() {
        let prepped = prepare(MatchingRule::Identity, &text("  Mixed  Case  "), None);
        assert_eq!(prepped.unwrap(), "Mixed  Case");
    }

    #[test]
    fn octet_string_renders_hex() {
        let prepped = prepare(MatchingRule::OctetString, &Value::Binary(vec![0x00, 0xAB]), None);
        assert_eq!(prepped.unwrap(), "#00ab");
    }

    #[test]
    fn object_identifier_resolves_descriptors() {
        let schema = CoreSchema;
        let via_schema = prepare(MatchingRule::ObjectIdentifier, &text("inetOrgPerson"), Some(&schema));
        assert_eq!(via_schema.unwrap(), "inetorgperson");
        let numeric = prepare(MatchingRule::ObjectIdentifier, &text("OID.2.5.6.6"), Some(&schema));
        assert_eq!(numeric.unwrap(), "2.5.6.6");
        let known = prepare(MatchingRule::ObjectIdentifier, &text("cn"), Some(&schema));
        assert_eq!(known.unwrap(), "2.5.4.3");
    }

    #[test]
    fn distinguished_name_recurses() {
        let schema = CoreSchema;
        let prepped = prepare(
            MatchingRule::DistinguishedName,
            &text("CN = Kate Bush , DC = example"),
            Some(&schema),
        );
        assert_eq!(prepped.unwrap(), "2.5.4.3=kate bush,0.9.2342.19200300.100.1.25=example");
    }

    #[test]
    fn invalid_utf8_under_string_rule_is_rejected() {
        let err = prepare(MatchingRule::CaseIgnore, &Value::Binary(vec![0xC3, 0x28]), None);
        assert_matches!(err, Err(Error::InvalidSyntax { .. }));
    }

    #[test]
    fn ignorable_characters_are_dropped() {
        let prepped = prepare(MatchingRule::CaseIgnore, &text("Ka\u{00AD}te\u{200B}"), None);
        assert_eq!(prepped.unwrap(), "kate");
    }

    #[test]
    fn tags_round_trip() {
        for rule in [
            MatchingRule::CaseIgnore,
            MatchingRule::CaseExact,
            MatchingRule::NumericString,
            MatchingRule::DistinguishedName,
            MatchingRule::OctetString,
            MatchingRule::ObjectIdentifier,
            MatchingRule::Identity,
        ] {
            assert_eq!(MatchingRule::from_tag(rule.tag()), Some(rule));
        }
        assert_eq!(MatchingRule::from_tag(7), None);
    }
}
