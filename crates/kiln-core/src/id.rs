//! Sprite artifact identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// A unique identifier for a generated artifact.
///
/// Fresh ids are random; variants derive their id from the base sprite
/// so file names stay traceable (`hero_3f2a..._crimson`).
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpriteId(String);

impl SpriteId {
    /// Create a new unique id with a readable prefix
    pub fn new(prefix: &str) -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        let prefix = slug(prefix);
        if prefix.is_empty() {
            Self(format!("sprite_{}", &uuid[..12]))
        } else {
            Self(format!("{}_{}", prefix, &uuid[..12]))
        }
    }

    /// Create an id from a raw string (for deserialization/testing)
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive a child id for a variant of this artifact
    pub fn derive(&self, suffix: &str) -> Self {
        Self(format!("{}_{}", self.0, slug(suffix)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Lower-case a label and keep only `[a-z0-9_]`
pub fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

impl fmt::Debug for SpriteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpriteId({})", self.0)
    }
}

impl fmt::Display for SpriteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
