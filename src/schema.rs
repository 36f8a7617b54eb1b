//! Read-only attribute-type resolution.
//!
//! The core consumes a tiny slice of the full schema machinery: given an
//! attribute descriptor or numeric OID, it needs the canonical OID, whether
//! the syntax is human readable, and the equality matching rule. Everything
//! else lives with the external schema registry.

use crate::prep::MatchingRule;

/// What the core needs to know about one attribute type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeInfo {
    /// Canonical numeric OID.
    pub oid: String,
    /// Whether values of this attribute are human readable.
    pub syntax_hr: bool,
    /// Equality matching rule bound to the attribute.
    pub equality: MatchingRule,
}

/// Read-only view of an attribute-type registry.
///
/// Implementations are treated as effectively immutable; concurrent readers
/// need no synchronization. Lookups are case insensitive and accept both
/// descriptors and numeric OIDs, with or without an `OID.` prefix.
pub trait SchemaView {
    /// Resolve a descriptor or numeric OID to its attribute information.
    fn lookup(&self, name_or_oid: &str) -> Option<AttributeInfo>;

    /// Resolve a descriptor or numeric OID to the canonical OID string.
    /// Inputs that already parse as a numeric OID pass through unchanged.
    fn oid_of(&self, name_or_oid: &str) -> Option<String> {
        let key = strip_oid_prefix(name_or_oid.trim());
        if is_numeric_oid(key) {
            return Some(key.to_owned());
        }
        self.lookup(key).map(|info| info.oid)
    }
}

/// Whether `s` matches the numericoid grammar: `digit+ ( "." digit+ )+`,
/// at least two arcs, no leading zeroes.
pub fn is_numeric_oid(s: &str) -> bool {
    let mut arcs = 0usize;
    for arc in s.split('.') {
        if arc.is_empty() || !arc.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        if arc.len() > 1 && arc.starts_with('0') {
            return false;
        }
        arcs += 1;
    }
    arcs >= 2
}

/// Strip a case-insensitive `OID.` prefix from an attribute type.
pub(crate) fn strip_oid_prefix(s: &str) -> &str {
    match s.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("oid.") => &s[4..],
        _ => s,
    }
}

/// Built-in registry of the standard attribute types.
///
/// Covers the RFC 4519 user attributes plus a handful of widely deployed
/// extensions, each with its canonical OID, syntax flag and equality rule.
///
/// <https://datatracker.ietf.org/doc/html/rfc4519#section-2>
#[derive(Clone, Copy, Debug, Default)]
pub struct CoreSchema;

impl SchemaView for CoreSchema {
    fn lookup(&self, name_or_oid: &str) -> Option<AttributeInfo> {
        let key = strip_oid_prefix(name_or_oid.trim()).to_ascii_lowercase();
        let (oid, syntax_hr, equality) = match key.as_str() {
            "objectclass" | "2.5.4.0" => ("2.5.4.0", true, MatchingRule::ObjectIdentifier),
            "cn" | "commonname" | "2.5.4.3" => ("2.5.4.3", true, MatchingRule::CaseIgnore),
            "sn" | "surname" | "2.5.4.4" => ("2.5.4.4", true, MatchingRule::CaseIgnore),
            "serialnumber" | "2.5.4.5" => ("2.5.4.5", true, MatchingRule::CaseIgnore),
            "c" | "countryname" | "2.5.4.6" => ("2.5.4.6", true, MatchingRule::CaseIgnore),
            "l" | "localityname" | "2.5.4.7" => ("2.5.4.7", true, MatchingRule::CaseIgnore),
            "st" | "stateorprovincename" | "2.5.4.8" => ("2.5.4.8", true, MatchingRule::CaseIgnore),
            "street" | "streetaddress" | "2.5.4.9" => ("2.5.4.9", true, MatchingRule::CaseIgnore),
            "o" | "organizationname" | "2.5.4.10" => ("2.5.4.10", true, MatchingRule::CaseIgnore),
            "ou" | "organizationalunitname" | "2.5.4.11" => {
                ("2.5.4.11", true, MatchingRule::CaseIgnore)
            }
            "title" | "2.5.4.12" => ("2.5.4.12", true, MatchingRule::CaseIgnore),
            "description" | "2.5.4.13" => ("2.5.4.13", true, MatchingRule::CaseIgnore),
            "businesscategory" | "2.5.4.15" => ("2.5.4.15", true, MatchingRule::CaseIgnore),
            "telephonenumber" | "2.5.4.20" => ("2.5.4.20", true, MatchingRule::NumericString),
            "x121address" | "2.5.4.24" => ("2.5.4.24", true, MatchingRule::NumericString),
            "member" | "2.5.4.31" => ("2.5.4.31", true, MatchingRule::DistinguishedName),
            "owner" | "2.5.4.32" => ("2.5.4.32", true, MatchingRule::DistinguishedName),
            "seealso" | "2.5.4.34" => ("2.5.4.34", true, MatchingRule::DistinguishedName),
            "userpassword" | "2.5.4.35" => ("2.5.4.35", false, MatchingRule::OctetString),
            "usercertificate" | "2.5.4.36" => ("2.5.4.36", false, MatchingRule::OctetString),
            "name" | "2.5.4.41" => ("2.5.4.41", true, MatchingRule::CaseIgnore),
            "givenname" | "2.5.4.42" => ("2.5.4.42", true, MatchingRule::CaseIgnore),
            "initials" | "2.5.4.43" => ("2.5.4.43", true, MatchingRule::CaseIgnore),
            "organizationidentifier" | "2.5.4.97" => ("2.5.4.97", true, MatchingRule::CaseIgnore),
            // https://datatracker.ietf.org/doc/html/rfc3045
            "vendorname" | "1.3.6.1.1.4" => ("1.3.6.1.1.4", true, MatchingRule::CaseExact),
            "vendorversion" | "1.3.6.1.1.5" => ("1.3.6.1.1.5", true, MatchingRule::CaseExact),
            // https://datatracker.ietf.org/doc/html/rfc4524
            "uid" | "userid" | "0.9.2342.19200300.100.1.1" => {
                ("0.9.2342.19200300.100.1.1", true, MatchingRule::CaseIgnore)
            }
            "mail" | "rfc822mailbox" | "0.9.2342.19200300.100.1.3" => {
                ("0.9.2342.19200300.100.1.3", true, MatchingRule::CaseIgnore)
            }
            "dc" | "domaincomponent" | "0.9.2342.19200300.100.1.25" => {
                ("0.9.2342.19200300.100.1.25", true, MatchingRule::CaseIgnore)
            }
            "jpegphoto" | "0.9.2342.19200300.100.1.60" => {
                ("0.9.2342.19200300.100.1.60", false, MatchingRule::OctetString)
            }
            // https://oidref.com/1.3.6.1.4.1.311.60.2.1.3
            "jurisdictioncountryname" | "1.3.6.1.4.1.311.60.2.1.3" => {
                ("1.3.6.1.4.1.311.60.2.1.3", true, MatchingRule::CaseIgnore)
            }
            _ => return None,
        };
        Some(AttributeInfo {
            oid: oid.to_owned(),
            syntax_hr,
            equality,
        })
    }
}
