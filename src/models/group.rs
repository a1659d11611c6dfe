use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::member::Member;
use crate::identity::IdentityKey;

/// Largest number of students a group may hold.
pub const MAX_GROUP_SIZE: usize = 4;

/// Seats left in a group holding `member_count` students.
pub fn capacity_for(member_count: usize) -> u8 {
    MAX_GROUP_SIZE.saturating_sub(member_count) as u8
}

/// A persisted roster of one to [`MAX_GROUP_SIZE`] students.
///
/// `capacity_remaining` is always `MAX_GROUP_SIZE - members.len()`; the store
/// recomputes it on every write rather than trusting callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    /// Members in the order they joined.
    pub members: Vec<Member>,
    pub capacity_remaining: u8,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn member(&self, key: &IdentityKey) -> Option<&Member> {
        self.members.iter().find(|m| &m.key() == key)
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.member(key).is_some()
    }

    pub fn is_full(&self) -> bool {
        self.capacity_remaining == 0
    }

    /// Roster with the given student dropped, preserving join order.
    pub fn without(&self, key: &IdentityKey) -> Vec<Member> {
        self.members
            .iter()
            .filter(|m| &m.key() != key)
            .cloned()
            .collect()
    }
}

/// Inclusive bounds on the number of founding members of a new group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeBound {
    pub lo: usize,
    pub hi: usize,
}

impl SizeBound {
    /// A complete founding roster: two to four students.
    pub const FOUNDING: Self = Self { lo: 2, hi: 4 };
    /// A group registered as open for later additions: two or three students.
    pub const PARTIAL: Self = Self { lo: 2, hi: 3 };

    pub fn for_partial(partial: bool) -> Self {
        if partial {
            Self::PARTIAL
        } else {
            Self::FOUNDING
        }
    }

    pub fn contains(&self, count: usize) -> bool {
        (self.lo..=self.hi).contains(&count)
    }
}

/// Input for founding a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroupInput {
    /// Student id of the person submitting the roster; must appear on it.
    pub creator_id: String,
    /// One `name, student_id` pair per line.
    pub roster: String,
    /// Register as a partial group (two or three founders).
    #[serde(default)]
    pub partial: bool,
}

/// Input for pulling an unattached student into a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMemberInput {
    pub individual_id: Uuid,
}
