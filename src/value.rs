//! Attribute values: UTF-8 text or raw octets.

use derive_more::From;

/// An attribute value.
///
/// A value is [`Text`](Value::Text) exactly when the owning attribute's
/// syntax is human readable. Values parsed without a schema default to text
/// whenever their bytes form valid UTF-8; hex-string values and values whose
/// bytes do not decode stay [`Binary`](Value::Binary). Comparisons between
/// values are always on raw bytes, so the same octets compare equal no
/// matter which arm carries them.
#[derive(Clone, Debug, From)]
pub enum Value {
    /// Human-readable UTF-8 value.
    Text(String),
    /// Raw octets.
    Binary(Vec<u8>),
}

impl Value {
    /// Build a value from decoded bytes: text when they form valid UTF-8,
    /// binary otherwise.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(s) => Self::Text(s),
            Err(err) => Self::Binary(err.into_bytes()),
        }
    }

    /// The value as a string slice, when it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Binary(_) => None,
        }
    }

    /// The raw bytes of the value.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Binary(b) => b,
        }
    }

    /// Number of bytes in the value.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the value holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Whether the value is text.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Whether the value is raw octets.
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Self::Binary(bytes.to_owned())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}
