//! Hash-identified names.
//!
//! ShCd and ShPk files identify resources, keys, values and passes by the
//! CRC32 of their name; the text itself is only sometimes stored. A [`Name`]
//! carries the hash plus whatever text is known, and compares by hash alone.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Add;

use crate::crc::{crc32_with_seed, name_hash, NAME_SEED};

/// Text used in place of an unknown prefix when concatenating names.
const UNKNOWN_PREFIX: &str = "\u{FFFD}";

/// A CRC32 identity with optional display text.
#[derive(Debug, Clone, Default)]
pub struct Name {
    hash: u32,
    text: Option<String>,
}

impl Name {
    /// Name of a string, hashing it.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            hash: name_hash(&text),
            text: Some(text),
        }
    }

    /// Name of a byte string. Invalid UTF-8 is replaced in the text only.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            hash: crc32_with_seed(bytes, NAME_SEED),
            text: Some(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    /// Name known only by its hash.
    pub const fn from_hash(hash: u32) -> Self {
        Self { hash, text: None }
    }

    /// Name with an explicit hash and advisory text, which is not checked.
    pub fn with_text(hash: u32, text: impl Into<String>) -> Self {
        Self {
            hash,
            text: Some(text.into()),
        }
    }

    /// The empty string, whose hash is 0.
    pub fn empty() -> Self {
        Self {
            hash: 0,
            text: Some(String::new()),
        }
    }

    #[inline]
    pub fn hash(&self) -> u32 {
        self.hash
    }

    #[inline]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Whether the text is present and actually hashes to this name.
    pub fn is_value_authoritative(&self) -> bool {
        self.text
            .as_deref()
            .is_some_and(|text| name_hash(text) == self.hash)
    }

    /// Append `suffix`, chaining the hash.
    pub fn concat(&self, suffix: &str) -> Self {
        self.concat_bytes(suffix.as_bytes())
    }

    /// Append raw bytes, chaining the hash over them as given.
    pub fn concat_bytes(&self, suffix: &[u8]) -> Self {
        let prefix = self.text.as_deref().unwrap_or(UNKNOWN_PREFIX);
        Self {
            hash: crc32_with_seed(suffix, !self.hash),
            text: Some(format!("{}{}", prefix, String::from_utf8_lossy(suffix))),
        }
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hash.cmp(&other.hash)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.text {
            Some(text) => f.write_str(text),
            None => write!(f, "0x{:08X}", self.hash),
        }
    }
}

impl From<&str> for Name {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Name {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&[u8]> for Name {
    fn from(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<u32> for Name {
    fn from(hash: u32) -> Self {
        Self::from_hash(hash)
    }
}

impl Add<&str> for &Name {
    type Output = Name;

    fn add(self, suffix: &str) -> Name {
        self.concat(suffix)
    }
}

impl Add<&str> for Name {
    type Output = Name;

    fn add(self, suffix: &str) -> Name {
        self.concat(suffix)
    }
}

impl Add<&[u8]> for &Name {
    type Output = Name;

    fn add(self, suffix: &[u8]) -> Name {
        self.concat_bytes(suffix)
    }
}

impl Add<&[u8]> for Name {
    type Output = Name;

    fn add(self, suffix: &[u8]) -> Name {
        self.concat_bytes(suffix)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Name {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}
