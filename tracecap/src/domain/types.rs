//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers keep schema identities and resource ids from being
//! confused with the plain integers and strings they wrap.

use sha2::{Digest, Sha256};
use std::fmt;

/// Schema type tag
///
/// A small caller-assigned identity for one registered schema type. The
/// encoder keys its entity table on this tag, so two descriptors with equal
/// contents but different tags are encoded as two distinct entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(pub u32);

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type#{}", self.0)
    }
}

/// Content-derived resource id
///
/// Lowercase hex SHA-256 of the resource bytes. The archive trusts that equal
/// ids mean equal content, which holds as long as ids come from here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(String);

impl ResourceId {
    /// Hash `bytes` into an id
    #[must_use]
    pub fn from_content(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// Get the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
