//! Schema-aware model of LDAP names: parsing, normalization, comparison
//! and rendering of distinguished names following
//! [RFC 4514](https://datatracker.ietf.org/doc/html/rfc4514), plus the
//! search-filter syntax of
//! [RFC 4515](https://datatracker.ietf.org/doc/html/rfc4515) and the URL
//! format of [RFC 4516](https://datatracker.ietf.org/doc/html/rfc4516).
//!
//! A [`Dn`] keeps three textual forms in step: the verbatim user spelling,
//! the minimally escaped rendering, and (when bound to a [`SchemaView`])
//! the canonical normalized form that equality, hashing and ordering work
//! on:
//!
//! ```
//! use ldap_dn::{CoreSchema, Dn};
//!
//! let schema = CoreSchema;
//! let dn = Dn::with_schema(&schema, "CN = Kate Bush , OU = people").unwrap();
//! assert_eq!(dn.name(), "CN = Kate Bush , OU = people");
//! assert_eq!(dn.escaped(), "CN=Kate Bush,OU=people");
//! assert_eq!(dn.normalized(), "2.5.4.3=kate bush,2.5.4.11=people");
//! ```
//!
//! All public types are immutable after construction; operations like
//! [`Dn::parent`] or [`Dn::bind`] return fresh instances.

mod ava;
mod dn;
mod error;
mod parser;
mod rdn;
mod value;
mod wire;

pub mod escape;
pub mod filter;
pub mod prep;
pub mod schema;
pub mod url;

#[cfg(test)]
mod test;

pub use ava::{AttributeBinding, Ava};
pub use dn::Dn;
pub use error::{Error, Result};
pub use filter::{Filter, FilterParseConfig};
pub use prep::MatchingRule;
pub use rdn::Rdn;
pub use schema::{AttributeInfo, CoreSchema, SchemaView};
pub use url::LdapUrl;
pub use value::Value;
