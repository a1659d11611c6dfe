use serde::{Deserialize, Serialize};

use crate::identity::IdentityKey;

/// A student listed on a group roster.
///
/// Only the name and student id travel with the group; contact details live
/// on the [`Individual`](super::Individual) record while the student is
/// unattached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub student_id: String,
}

impl Member {
    pub fn new(name: impl Into<String>, student_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            student_id: student_id.into(),
        }
    }

    pub fn key(&self) -> IdentityKey {
        IdentityKey::new(&self.student_id)
    }
}
