//! Error type shared by all parsing, normalization and serialization
//! entry points.

use std::result;

use derive_more::{Display, Error};

/// Parsing result type.
pub type Result<T> = result::Result<T, Error>;

/// Possible errors when parsing or serializing LDAP names, filters and URLs.
///
/// Every variant records the byte offset at which the problem was detected,
/// counted from the start of the input handed to the public entry point.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum Error {
    /// Attribute type missing, empty after trimming, or violating the
    /// descr/numericoid grammar.
    #[display(fmt = "invalid attribute type {ty:?} at offset {offset}")]
    InvalidType { offset: usize, ty: String },
    /// A backslash followed by something that is neither a recognized
    /// special character nor two hex digits.
    #[display(fmt = "invalid escape sequence at offset {offset}")]
    InvalidEscape { offset: usize },
    /// Hex-string with a non-hex digit or an odd number of digits.
    #[display(fmt = "invalid hex string at offset {offset}")]
    InvalidHex { offset: usize },
    /// Quoted value without a closing quote, or a hex-string cut off
    /// mid-pair by the end of input.
    #[display(fmt = "unterminated value at offset {offset}")]
    UnterminatedValue { offset: usize },
    /// The DN ends in `,` or `;` with no following RDN.
    #[display(fmt = "trailing separator at offset {offset}")]
    TrailingSeparator { offset: usize },
    /// An RDN with no attribute-value assertions.
    #[display(fmt = "empty RDN at offset {offset}")]
    EmptyRdn { offset: usize },
    /// Two AVAs in the same RDN share normalized type and value.
    #[display(fmt = "duplicate AVA for type {ty:?} at offset {offset}")]
    DuplicateAva { offset: usize, ty: String },
    /// Value bytes invalid for the target syntax.
    #[display(fmt = "invalid value for {ty:?} at offset {offset}")]
    InvalidValue { offset: usize, ty: String },
    /// Input that is structurally broken in a way no more specific variant
    /// covers, e.g. a raw `"` in the middle of a plain value or non-UTF-8
    /// bytes handed to a string matching rule.
    #[display(fmt = "invalid syntax at offset {offset}")]
    InvalidSyntax { offset: usize },
    /// Ancestor/descendant arithmetic given a DN that is not a matching
    /// part of the subject.
    #[display(fmt = "{dn:?} is not a suffix at offset {offset}")]
    NotASuffix { offset: usize, dn: String },
    /// URL structural, host, port or scope violation.
    #[display(fmt = "invalid LDAP URL at offset {offset}: {detail}")]
    InvalidUrl { offset: usize, detail: String },
    /// Search-filter grammar violation or imbalanced parentheses.
    #[display(fmt = "invalid filter at offset {offset}: {detail}")]
    InvalidFilter { offset: usize, detail: String },
    /// Filter nesting beyond the configured depth limit.
    #[display(fmt = "nesting deeper than {limit} at offset {offset}")]
    NestingTooDeep { offset: usize, limit: usize },
    /// Serializing an AVA with neither type nor value.
    #[display(fmt = "AVA at offset {offset} has neither type nor value")]
    IncompleteAva { offset: usize },
    /// Serialized stream ended before the announced payload.
    #[display(fmt = "unexpected end of stream at offset {offset}")]
    UnexpectedEof { offset: usize },
    /// Serialized stream carries a malformed sentinel, tag or payload.
    #[display(fmt = "corrupt serialization at offset {offset}: {detail}")]
    CorruptSerialization { offset: usize, detail: String },
}

impl Error {
    /// Byte offset at which the error was detected.
    pub fn offset(&self) -> usize {
        match self {
            Self::InvalidType { offset, .. }
            | Self::InvalidEscape { offset }
            | Self::InvalidHex { offset }
            | Self::UnterminatedValue { offset }
            | Self::TrailingSeparator { offset }
            | Self::EmptyRdn { offset }
            | Self::DuplicateAva { offset, .. }
            | Self::InvalidValue { offset, .. }
            | Self::InvalidSyntax { offset }
            | Self::NotASuffix { offset, .. }
            | Self::InvalidUrl { offset, .. }
            | Self::InvalidFilter { offset, .. }
            | Self::NestingTooDeep { offset, .. }
            | Self::IncompleteAva { offset }
            | Self::UnexpectedEof { offset }
            | Self::CorruptSerialization { offset, .. } => *offset,
        }
    }

    /// Shift the recorded offset by `base`, for errors raised while parsing
    /// an embedded slice of a larger input.
    pub(crate) fn at_base(mut self, base: usize) -> Self {
        match &mut self {
            Self::InvalidType { offset, .. }
            | Self::InvalidEscape { offset }
            | Self::InvalidHex { offset }
            | Self::UnterminatedValue { offset }
            | Self::TrailingSeparator { offset }
            | Self::EmptyRdn { offset }
            | Self::DuplicateAva { offset, .. }
            | Self::InvalidValue { offset, .. }
            | Self::InvalidSyntax { offset }
            | Self::NotASuffix { offset, .. }
            | Self::InvalidUrl { offset, .. }
            | Self::InvalidFilter { offset, .. }
            | Self::NestingTooDeep { offset, .. }
            | Self::IncompleteAva { offset }
            | Self::UnexpectedEof { offset }
            | Self::CorruptSerialization { offset, .. } => *offset += base,
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::Error;

    #[test]
    fn offset_is_reported() {
        let err = Error::TrailingSeparator { offset: 4 };
        assert_eq!(err.offset(), 4);
        assert_eq!(err.to_string(), "trailing separator at offset 4");
    }

    #[test]
    fn rebase_shifts_offset() {
        let err = Error::InvalidEscape { offset: 2 }.at_base(10);
        assert_eq!(err, Error::InvalidEscape { offset: 12 });
    }
}
