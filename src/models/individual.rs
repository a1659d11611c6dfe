use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::member::Member;
use crate::identity::IdentityKey;

/// Email recorded when a student's contact address was never captured.
pub const UNKNOWN_EMAIL: &str = "unknown";

/// A registered student who is looking for a group.
///
/// Individuals are **ephemeral**: the record is deleted the moment the
/// student is absorbed into a group and re-created if they are released.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub id: Uuid,
    pub name: String,
    pub student_id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Individual {
    pub fn key(&self) -> IdentityKey {
        IdentityKey::new(&self.student_id)
    }

    pub fn as_member(&self) -> Member {
        Member::new(&self.name, &self.student_id)
    }
}

/// Input for registering as an unattached student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterIndividualInput {
    pub name: String,
    pub student_id: String,
    pub email: String,
}
