//! Normalized student identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The comparison form of a student identifier.
///
/// Two identifiers refer to the same student exactly when their keys are
/// equal: surrounding whitespace is dropped and ASCII letters are uppercased,
/// so `" m0101 "` and `"M0101"` collide while `"M010"` and `"M0101"` do not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn new(student_id: &str) -> Self {
        Self(student_id.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
