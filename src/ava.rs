//! Attribute-value assertions, the `type = value` atoms of a name.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{Error, Result};
use crate::escape;
use crate::prep::{self, MatchingRule};
use crate::schema::{self, SchemaView};
use crate::value::Value;

/// Attribute information captured when an AVA is bound to a schema.
///
/// The binding is a resolved copy of the schema lookup, so bound objects
/// stay self-contained: no schema reference outlives the bind call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeBinding {
    pub(crate) oid: String,
    pub(crate) syntax_hr: bool,
    pub(crate) rule: MatchingRule,
    pub(crate) prepped: String,
}

impl AttributeBinding {
    /// Canonical numeric OID of the attribute, or the lowercased input type
    /// when the schema did not know the attribute.
    pub fn oid(&self) -> &str {
        &self.oid
    }

    /// Whether the attribute's syntax is human readable.
    pub fn syntax_hr(&self) -> bool {
        self.syntax_hr
    }

    /// Equality matching rule the normalized value was prepared under.
    pub fn rule(&self) -> MatchingRule {
        self.rule
    }
}

/// One attribute-value assertion.
///
/// Three textual forms are derived from it: `name` is the exact spelling
/// the user supplied, `escaped` the minimal RFC 4514 rendering, and
/// `normalized` (defined once the AVA is bound to a schema) the canonical
/// OID plus the matching-rule-prepared value.
#[derive(Clone, Debug, Default)]
pub struct Ava {
    pub(crate) name: String,
    pub(crate) user_type: String,
    pub(crate) value: Value,
    pub(crate) binding: Option<AttributeBinding>,
}

impl Ava {
    /// Build a schema-less AVA from a type and a value.
    pub fn new(ty: &str, value: impl Into<Value>) -> Result<Self> {
        let user_type = validated_type(ty)?;
        let value = value.into();
        let name = format!("{}={}", user_type, escape::encode_dn_value(&value));
        Ok(Self {
            name,
            user_type,
            value,
            binding: None,
        })
    }

    /// Build a schema-aware AVA, resolving the attribute type and checking
    /// the value against its syntax.
    pub fn with_schema(schema: &dyn SchemaView, ty: &str, value: impl Into<Value>) -> Result<Self> {
        Self::new(ty, value)?.bind(schema)
    }

    /// Used by the parser, which has already validated the pieces and
    /// carries the verbatim spelling.
    pub(crate) fn from_parts(name: String, user_type: String, value: Value) -> Self {
        Self {
            name,
            user_type,
            value,
            binding: None,
        }
    }

    /// Bind this AVA to a schema, returning a fresh schema-aware instance
    /// that shares the same `name` form.
    ///
    /// Unknown attribute types fall back to the lowercased input type and
    /// trim-only normalization.
    pub fn bind(&self, schema: &dyn SchemaView) -> Result<Self> {
        let (value, binding) = match schema.lookup(&self.user_type) {
            Some(info) => {
                let value = if info.syntax_hr {
                    match std::str::from_utf8(self.value.as_bytes()) {
                        Ok(s) => Value::Text(s.to_owned()),
                        Err(_) => {
                            return Err(Error::InvalidValue {
                                offset: 0,
                                ty: self.user_type.clone(),
                            })
                        }
                    }
                } else {
                    Value::Binary(self.value.as_bytes().to_vec())
                };
                let prepped = prep::prepare(info.equality, &value, Some(schema))?;
                let binding = AttributeBinding {
                    oid: info.oid,
                    syntax_hr: info.syntax_hr,
                    rule: info.equality,
                    prepped,
                };
                (value, binding)
            }
            None => {
                // Unknown attributes default to text under UTF-8
                // interpretation; bytes that do not decode stay binary.
                let value = match std::str::from_utf8(self.value.as_bytes()) {
                    Ok(s) => Value::Text(s.to_owned()),
                    Err(_) => self.value.clone(),
                };
                let prepped = match value.as_str() {
                    Some(s) => s.trim().to_owned(),
                    None => prep::hex_form(value.as_bytes()),
                };
                let binding = AttributeBinding {
                    oid: fallback_type(&self.user_type),
                    syntax_hr: true,
                    rule: MatchingRule::Identity,
                    prepped,
                };
                (value, binding)
            }
        };
        Ok(Self {
            name: self.name.clone(),
            user_type: self.user_type.clone(),
            value,
            binding: Some(binding),
        })
    }

    /// The exact `type = value` spelling the user supplied.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The attribute type as the user spelled it, trimmed.
    pub fn attribute_type(&self) -> &str {
        &self.user_type
    }

    /// The parsed value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The schema binding, when the AVA is schema aware.
    pub fn binding(&self) -> Option<&AttributeBinding> {
        self.binding.as_ref()
    }

    /// Whether the AVA has been bound to a schema.
    pub fn is_schema_aware(&self) -> bool {
        self.binding.is_some()
    }

    /// Canonical attribute type: the bound OID, or the lowercased input
    /// type (minus any `OID.` prefix) for schema-less AVAs.
    pub fn normalized_type(&self) -> Cow<'_, str> {
        match &self.binding {
            Some(binding) => Cow::Borrowed(binding.oid.as_str()),
            None => Cow::Owned(fallback_type(&self.user_type)),
        }
    }

    /// Canonical value: the matching-rule-prepared form when bound, a
    /// trimmed rendering otherwise.
    pub fn normalized_value(&self) -> Cow<'_, str> {
        match &self.binding {
            Some(binding) => Cow::Borrowed(binding.prepped.as_str()),
            None => match self.value.as_str() {
                Some(s) => Cow::Borrowed(s.trim()),
                None => Cow::Owned(prep::hex_form(self.value.as_bytes())),
            },
        }
    }

    /// Canonical `type=value` rendering.
    pub fn normalized(&self) -> String {
        format!("{}={}", self.normalized_type(), self.normalized_value())
    }

    /// Minimal RFC 4514 rendering: escape sequences are normalized, case
    /// and interior spacing of the value are preserved.
    pub fn escaped(&self) -> String {
        format!("{}={}", self.user_type, escape::encode_dn_value(&self.value))
    }

    pub(crate) fn is_incomplete(&self) -> bool {
        self.user_type.is_empty() && self.value.is_empty()
    }
}

impl fmt::Display for Ava {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl PartialEq for Ava {
    fn eq(&self, other: &Self) -> bool {
        match (&self.binding, &other.binding) {
            (Some(a), Some(b)) => a.oid == b.oid && a.prepped == b.prepped,
            (None, None) => {
                self.user_type.eq_ignore_ascii_case(&other.user_type)
                    && self.value.as_bytes() == other.value.as_bytes()
            }
            _ => {
                self.normalized_type() == other.normalized_type()
                    && self.normalized_value() == other.normalized_value()
            }
        }
    }
}

impl Eq for Ava {}

impl Hash for Ava {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.binding {
            Some(binding) => {
                binding.oid.hash(state);
                binding.prepped.hash(state);
            }
            None => {
                self.user_type.to_ascii_lowercase().hash(state);
                self.value.as_bytes().hash(state);
            }
        }
    }
}

impl PartialOrd for Ava {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ava {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized_type()
            .cmp(&other.normalized_type())
            .then_with(|| self.normalized_value().cmp(&other.normalized_value()))
            .then_with(|| match (&self.binding, &other.binding) {
                (None, None) => self
                    .user_type
                    .to_ascii_lowercase()
                    .cmp(&other.user_type.to_ascii_lowercase())
                    .then_with(|| self.value.as_bytes().cmp(other.value.as_bytes())),
                _ => Ordering::Equal,
            })
    }
}

/// Trim and grammar-check an attribute type supplied outside the parser.
fn validated_type(ty: &str) -> Result<String> {
    let trimmed = ty.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidType {
            offset: 0,
            ty: ty.to_owned(),
        });
    }
    let key = schema::strip_oid_prefix(trimmed);
    let descr = key
        .bytes()
        .next()
        .is_some_and(|b| b.is_ascii_alphabetic())
        && key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-');
    if !descr && !schema::is_numeric_oid(key) {
        return Err(Error::InvalidType {
            offset: 0,
            ty: trimmed.to_owned(),
        });
    }
    Ok(trimmed.to_owned())
}

/// Schema-less canonical type: lowercase, `OID.` prefix removed.
fn fallback_type(user_type: &str) -> String {
    schema::strip_oid_prefix(user_type).to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::Ava;
    use crate::error::Error;
    use crate::schema::CoreSchema;
    use crate::value::Value;

    #[test]
    fn schema_less_equality_is_byte_exact() {
        let a = Ava::new("CN", "Kate Bush").unwrap();
        let b = Ava::new("cn", "Kate Bush").unwrap();
        let c = Ava::new("cn", "kate bush").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn schema_aware_equality_uses_prepared_values() {
        let schema = CoreSchema;
        let a = Ava::with_schema(&schema, "CN", "  Kate   BUSH ").unwrap();
        let b = Ava::with_schema(&schema, "2.5.4.3", "kate bush").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.normalized(), "2.5.4.3=kate bush");
    }

    #[test]
    fn empty_type_is_rejected() {
        assert_matches!(Ava::new("  ", "x"), Err(Error::InvalidType { .. }));
        assert_matches!(Ava::new("", "x"), Err(Error::InvalidType { .. }));
    }

    #[test]
    fn bad_type_grammar_is_rejected() {
        assert_matches!(Ava::new("1cn", "x"), Err(Error::InvalidType { .. }));
        assert_matches!(Ava::new("2.5.4", "x"), Ok(_));
        assert_matches!(Ava::new("2.5.", "x"), Err(Error::InvalidType { .. }));
        assert_matches!(Ava::new("OID.2.5.4.3", "x"), Ok(_));
    }

    #[test]
    fn binary_value_under_readable_syntax_is_rejected() {
        let schema = CoreSchema;
        let value = Value::Binary(vec![0xC3, 0x28]);
        assert_matches!(
            Ava::with_schema(&schema, "cn", value),
            Err(Error::InvalidValue { .. })
        );
    }

    #[test]
    fn binary_syntax_coerces_text_to_octets() {
        let schema = CoreSchema;
        let ava = Ava::with_schema(&schema, "userPassword", "secret").unwrap();
        assert!(ava.value().is_binary());
        assert_eq!(ava.normalized_value(), "#736563726574");
    }

    #[test]
    fn unknown_type_falls_back_to_identity() {
        let schema = CoreSchema;
        let ava = Ava::with_schema(&schema, "customAttr", "  Mixed Case ").unwrap();
        assert_eq!(ava.normalized_type(), "customattr");
        assert_eq!(ava.normalized_value(), "Mixed Case");
    }

    #[test]
    fn binding_produces_fresh_instance_with_same_name() {
        let schema = CoreSchema;
        let plain = Ava::new("ou", "Example").unwrap();
        let bound = plain.bind(&schema).unwrap();
        assert_eq!(bound.name(), plain.name());
        assert!(bound.is_schema_aware());
        assert!(!plain.is_schema_aware());
        assert_eq!(bound.normalized(), "2.5.4.11=example");
    }

    #[test]
    fn ordering_is_by_normalized_type_then_value() {
        let schema = CoreSchema;
        let mut avas = vec![
            Ava::with_schema(&schema, "sn", "a").unwrap(),
            Ava::with_schema(&schema, "cn", "b").unwrap(),
            Ava::with_schema(&schema, "cn", "a").unwrap(),
        ];
        avas.sort();
        let rendered: Vec<_> = avas.iter().map(Ava::normalized).collect();
        assert_eq!(rendered, ["2.5.4.3=a", "2.5.4.3=b", "2.5.4.4=a"]);
    }

    #[test]
    fn escaped_form_normalizes_escapes_only() {
        let ava = Ava::new("cn", "Bush, Kate").unwrap();
        assert_eq!(ava.escaped(), "cn=Bush\\, Kate");
        let sharp = Ava::new("a", "#this is a sharp").unwrap();
        assert_eq!(sharp.escaped(), "a=\\#this is a sharp");
    }
}
