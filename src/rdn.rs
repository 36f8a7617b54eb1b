//! Relative distinguished names: one or more AVAs joined by `+`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use itertools::Itertools;
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::ava::Ava;
use crate::error::{Error, Result};
use crate::parser;
use crate::schema::SchemaView;
use crate::value::Value;

/// A relative distinguished name.
///
/// User order of the AVAs is preserved for the `name` form; equality,
/// hashing and ordering work on the canonical (normalized type, normalized
/// value) ordering, so `cn=a+sn=b` equals `sn=b+cn=a`. An RDN is never
/// empty, and no two of its AVAs may share normalized type and value.
#[derive(Clone, Debug, DeserializeFromStr, SerializeDisplay)]
pub struct Rdn {
    pub(crate) name: String,
    pub(crate) avas: Vec<Ava>,
}

impl Rdn {
    /// Build an RDN around a single AVA.
    pub fn new(ava: Ava) -> Self {
        Self {
            name: ava.name().to_owned(),
            avas: vec![ava],
        }
    }

    /// Build a multi-valued RDN, rejecting duplicate AVAs.
    pub fn from_avas(avas: Vec<Ava>) -> Result<Self> {
        if avas.is_empty() {
            return Err(Error::EmptyRdn { offset: 0 });
        }
        ensure_unique(&avas)?;
        let name = avas.iter().map(Ava::name).join("+");
        Ok(Self { name, avas })
    }

    /// Parse a single RDN; input holding more than one RDN or a trailing
    /// separator is rejected.
    pub fn parse(s: &str) -> Result<Self> {
        parser::parse_rdn(s, None)
    }

    /// Parse a single RDN and bind it to the schema.
    pub fn with_schema(schema: &dyn SchemaView, s: &str) -> Result<Self> {
        parser::parse_rdn(s, Some(schema))
    }

    /// The parser has already enforced uniqueness and carries the verbatim
    /// spelling.
    pub(crate) fn from_parser(name: String, avas: Vec<Ava>) -> Self {
        Self { name, avas }
    }

    /// Bind every AVA to the schema, returning a fresh instance with the
    /// same `name` form.
    ///
    /// Normalization can collapse previously distinct AVAs into duplicates,
    /// so uniqueness is checked again.
    pub fn bind(&self, schema: &dyn SchemaView) -> Result<Self> {
        let avas = self
            .avas
            .iter()
            .map(|ava| ava.bind(schema))
            .collect::<Result<Vec<_>>>()?;
        ensure_unique(&avas)?;
        Ok(Self {
            name: self.name.clone(),
            avas,
        })
    }

    /// Number of AVAs.
    pub fn size(&self) -> usize {
        self.avas.len()
    }

    /// AVAs in user order.
    pub fn iter(&self) -> std::slice::Iter<'_, Ava> {
        self.avas.iter()
    }

    /// AVAs in canonical (normalized type, normalized value) order.
    pub fn canonical_iter(&self) -> impl Iterator<Item = &Ava> {
        self.canonical_refs().into_iter()
    }

    /// The AVA whose type matches `ty`, case insensitively. Both the user
    /// spelling and the normalized type are consulted.
    pub fn get_ava(&self, ty: &str) -> Option<&Ava> {
        let key = ty.trim();
        self.avas.iter().find(|ava| {
            ava.attribute_type().eq_ignore_ascii_case(key)
                || ava.normalized_type().eq_ignore_ascii_case(key)
        })
    }

    /// The sole AVA of a single-valued RDN, or the first in user order.
    pub fn ava(&self) -> &Ava {
        &self.avas[0]
    }

    /// Shortcut to the type of the sole (or first) AVA.
    pub fn attribute_type(&self) -> &str {
        self.ava().attribute_type()
    }

    /// Shortcut to the value of the sole (or first) AVA.
    pub fn value(&self) -> &Value {
        self.ava().value()
    }

    /// The exact spelling the user supplied.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Minimal RFC 4514 rendering in user order.
    pub fn escaped(&self) -> String {
        self.avas.iter().map(Ava::escaped).join("+")
    }

    /// Canonical rendering: AVAs in canonical order, each with canonical
    /// type and prepared value.
    pub fn normalized(&self) -> String {
        self.canonical_refs()
            .into_iter()
            .map(Ava::normalized)
            .join("+")
    }

    fn canonical_refs(&self) -> Vec<&Ava> {
        let mut refs: Vec<&Ava> = self.avas.iter().collect();
        refs.sort();
        refs
    }
}

pub(crate) fn ensure_unique(avas: &[Ava]) -> Result<()> {
    for (i, ava) in avas.iter().enumerate() {
        if avas[..i].contains(ava) {
            return Err(Error::DuplicateAva {
                offset: 0,
                ty: ava.attribute_type().to_owned(),
            });
        }
    }
    Ok(())
}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for Rdn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialEq for Rdn {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_refs() == other.canonical_refs()
    }
}

impl Eq for Rdn {}

impl Hash for Rdn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let refs = self.canonical_refs();
        refs.len().hash(state);
        for ava in refs {
            ava.hash(state);
        }
    }
}

impl PartialOrd for Rdn {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rdn {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical_refs().cmp(&other.canonical_refs())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::Rdn;
    use crate::ava::Ava;
    use crate::error::Error;
    use crate::schema::CoreSchema;

    #[test]
    fn parse_single_ava() {
        let rdn = Rdn::parse("cn=Kate Bush").unwrap();
        assert_eq!(rdn.size(), 1);
        assert_eq!(rdn.attribute_type(), "cn");
        assert_eq!(rdn.value().as_str(), Some("Kate Bush"));
        assert_eq!(rdn.name(), "cn=Kate Bush");
    }

    #[test]
    fn parse_rejects_trailing_separator() {
        assert_matches!(Rdn::parse("cn=a,"), Err(Error::TrailingSeparator { .. }));
        assert_matches!(Rdn::parse("cn=a,dc=b"), Err(Error::InvalidSyntax { offset: 4 }));
    }

    #[test]
    fn multi_ava_equality_is_order_independent() {
        let a = Rdn::parse("cn=Kate Bush+sn=Bush").unwrap();
        let b = Rdn::parse("sn=Bush+cn=Kate Bush").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.name(), "cn=Kate Bush+sn=Bush");
        assert_eq!(b.name(), "sn=Bush+cn=Kate Bush");
    }

    #[test]
    fn duplicate_avas_are_rejected() {
        assert_matches!(Rdn::parse("cn=a+cn=a"), Err(Error::DuplicateAva { .. }));
        // Same type with different values is allowed.
        let rdn = Rdn::parse("cn=a+cn=b").unwrap();
        assert_eq!(rdn.size(), 2);
    }

    #[test]
    fn binding_can_surface_duplicates() {
        let schema = CoreSchema;
        // Distinct bytes, identical after case folding.
        let rdn = Rdn::parse("cn=A+cn=a").unwrap();
        assert_matches!(rdn.bind(&schema), Err(Error::DuplicateAva { .. }));
    }

    #[test]
    fn get_ava_is_case_insensitive() {
        let schema = CoreSchema;
        let rdn = Rdn::with_schema(&schema, "cn=Kate+sn=Bush").unwrap();
        assert_eq!(rdn.get_ava("CN").unwrap().value().as_str(), Some("Kate"));
        assert_eq!(rdn.get_ava("2.5.4.4").unwrap().value().as_str(), Some("Bush"));
        assert!(rdn.get_ava("ou").is_none());
    }

    #[test]
    fn canonical_order_differs_from_user_order() {
        let rdn = Rdn::parse("sn=Bush+cn=Kate").unwrap();
        let user: Vec<_> = rdn.iter().map(|ava| ava.attribute_type()).collect();
        let canonical: Vec<_> = rdn.canonical_iter().map(|ava| ava.attribute_type()).collect();
        assert_eq!(user, ["sn", "cn"]);
        assert_eq!(canonical, ["cn", "sn"]);
    }

    #[test]
    fn from_avas_composes_name() {
        let rdn = Rdn::from_avas(vec![
            Ava::new("cn", "a").unwrap(),
            Ava::new("sn", "b").unwrap(),
        ])
        .unwrap();
        assert_eq!(rdn.name(), "cn=a+sn=b");
        assert_matches!(Rdn::from_avas(vec![]), Err(Error::EmptyRdn { offset: 0 }));
    }

    #[test]
    fn normalized_uses_canonical_order() {
        let schema = CoreSchema;
        let rdn = Rdn::with_schema(&schema, "SN=Bush+CN=Kate  Bush").unwrap();
        assert_eq!(rdn.normalized(), "2.5.4.3=kate bush+2.5.4.4=bush");
        assert_eq!(rdn.escaped(), "SN=Bush+CN=Kate  Bush");
    }
}
