//! Distinguished names: a leaf-first sequence of RDNs.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use itertools::{EitherOrBoth, Itertools};
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::error::{Error, Result};
use crate::parser;
use crate::rdn::Rdn;
use crate::schema::SchemaView;

/// A distinguished name.
///
/// RDNs are indexed leaf first: index 0 is the most specific RDN, the last
/// index the one closest to the root. The empty DN is legal and denotes the
/// root itself.
///
/// Three renderings are maintained: `name` preserves the input byte for
/// byte (separators, spacing and case included), `escaped` is the minimal
/// RFC 4514 form joined with `,`, and `normalized` the canonical
/// schema-aware form used by equality, hashing and ordering.
#[derive(Clone, Debug, Default, DeserializeFromStr, SerializeDisplay)]
pub struct Dn {
    pub(crate) name: String,
    pub(crate) rdns: Vec<Rdn>,
}

impl Dn {
    /// The empty DN.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse an RFC 4514 string without schema knowledge.
    pub fn parse(s: &str) -> Result<Self> {
        parser::parse_dn(s, None)
    }

    /// Parse an RFC 4514 string and bind every AVA to the schema.
    pub fn with_schema(schema: &dyn SchemaView, s: &str) -> Result<Self> {
        parser::parse_dn(s, Some(schema))
    }

    /// Compose a DN from RDNs, leaf first.
    pub fn from_rdns(rdns: Vec<Rdn>) -> Self {
        let name = compose_name(&rdns);
        Self { name, rdns }
    }

    pub(crate) fn from_parser(name: String, rdns: Vec<Rdn>) -> Self {
        Self { name, rdns }
    }

    /// Bind this DN to a schema, returning a fresh schema-aware instance
    /// that keeps the same `name` form.
    pub fn bind(&self, schema: &dyn SchemaView) -> Result<Self> {
        let rdns = self
            .rdns
            .iter()
            .map(|rdn| rdn.bind(schema))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: self.name.clone(),
            rdns,
        })
    }

    /// Number of RDNs.
    pub fn size(&self) -> usize {
        self.rdns.len()
    }

    /// Whether this is the empty DN.
    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    /// The leaf RDN, when the DN is not empty.
    pub fn rdn(&self) -> Option<&Rdn> {
        self.rdns.first()
    }

    /// The RDN at `index`, counted from the leaf.
    pub fn rdn_at(&self, index: usize) -> Option<&Rdn> {
        self.rdns.get(index)
    }

    /// RDNs leaf first.
    pub fn iter(&self) -> std::slice::Iter<'_, Rdn> {
        self.rdns.iter()
    }

    /// The DN with the leaf RDN removed. The parent of the empty DN is the
    /// empty DN.
    pub fn parent(&self) -> Self {
        if self.rdns.len() <= 1 {
            return Self::root();
        }
        Self::from_rdns(self.rdns[1..].to_vec())
    }

    /// A new DN with `rdn` prepended as the most specific RDN.
    pub fn add(&self, rdn: Rdn) -> Self {
        let mut rdns = Vec::with_capacity(self.rdns.len() + 1);
        rdns.push(rdn);
        rdns.extend_from_slice(&self.rdns);
        Self::from_rdns(rdns)
    }

    /// A new DN with all RDNs of `more_specific` prepended.
    pub fn add_dn(&self, more_specific: &Dn) -> Self {
        let mut rdns = Vec::with_capacity(self.rdns.len() + more_specific.rdns.len());
        rdns.extend_from_slice(&more_specific.rdns);
        rdns.extend_from_slice(&self.rdns);
        Self::from_rdns(rdns)
    }

    /// Parse `s` and prepend the result.
    pub fn add_parsed(&self, s: &str) -> Result<Self> {
        let parsed = Self::parse(s)?;
        Ok(self.add_dn(&parsed))
    }

    /// Whether `self` equals a contiguous root-side prefix of `other`.
    /// The empty DN is an ancestor of every DN.
    pub fn is_ancestor_of(&self, other: &Dn) -> bool {
        let n = self.rdns.len();
        let m = other.rdns.len();
        n <= m && other.rdns[m - n..] == self.rdns[..]
    }

    /// Whether `other` is an ancestor of `self`.
    pub fn is_descendant_of(&self, other: &Dn) -> bool {
        other.is_ancestor_of(self)
    }

    /// Strip `descendant_part` from the leaf side, returning the DN above
    /// it. `cn=kate,dc=example,dc=com` minus `cn=kate` is
    /// `dc=example,dc=com`.
    pub fn ancestor_of(&self, descendant_part: &Dn) -> Result<Self> {
        let k = descendant_part.rdns.len();
        if k > self.rdns.len() || self.rdns[..k] != descendant_part.rdns[..] {
            return Err(Error::NotASuffix {
                offset: 0,
                dn: descendant_part.name.clone(),
            });
        }
        Ok(Self::from_rdns(self.rdns[k..].to_vec()))
    }

    /// Strip `ancestor_part` from the root side, returning the DN below
    /// it. `cn=kate,dc=example,dc=com` minus `dc=example,dc=com` is
    /// `cn=kate`.
    pub fn descendant_of(&self, ancestor_part: &Dn) -> Result<Self> {
        if !ancestor_part.is_ancestor_of(self) {
            return Err(Error::NotASuffix {
                offset: 0,
                dn: ancestor_part.name.clone(),
            });
        }
        let keep = self.rdns.len() - ancestor_part.rdns.len();
        Ok(Self::from_rdns(self.rdns[..keep].to_vec()))
    }

    /// The exact input spelling, separators included.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Minimal RFC 4514 rendering: RDNs joined with `,`, AVAs with `+`,
    /// no whitespace around separators.
    pub fn escaped(&self) -> String {
        self.rdns.iter().map(Rdn::escaped).join(",")
    }

    /// Canonical rendering: every RDN in canonical form, joined with `,`.
    pub fn normalized(&self) -> String {
        self.rdns.iter().map(Rdn::normalized).join(",")
    }
}

fn compose_name(rdns: &[Rdn]) -> String {
    rdns.iter().map(Rdn::name).join(",")
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for Dn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialEq for Dn {
    fn eq(&self, other: &Self) -> bool {
        self.rdns == other.rdns
    }
}

impl Eq for Dn {}

impl Hash for Dn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rdns.len().hash(state);
        for rdn in &self.rdns {
            rdn.hash(state);
        }
    }
}

impl PartialOrd for Dn {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Total order: compare RDNs pairwise starting from the root; the first
/// non-equal pair decides, and a root-side prefix sorts before its
/// extensions.
impl Ord for Dn {
    fn cmp(&self, other: &Self) -> Ordering {
        for pair in self.rdns.iter().rev().zip_longest(other.rdns.iter().rev()) {
            match pair {
                EitherOrBoth::Both(ours, theirs) => match ours.cmp(theirs) {
                    Ordering::Equal => continue,
                    decided => return decided,
                },
                EitherOrBoth::Left(_) => return Ordering::Greater,
                EitherOrBoth::Right(_) => return Ordering::Less,
            }
        }
        Ordering::Equal
    }
}
