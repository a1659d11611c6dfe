use serde::{Deserialize, Serialize};

use super::group::Group;
use super::individual::Individual;
use super::member::Member;

/// Where a student currently stands.
///
/// - `Unregistered`: unknown to both collections
/// - `Individual`: registered and looking for a group
/// - `Grouped`: listed on exactly one group roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StudentState {
    Unregistered,
    Individual { individual: Individual },
    Grouped { group: Group, member: Member },
}

impl StudentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unregistered => "unregistered",
            Self::Individual { .. } => "individual",
            Self::Grouped { .. } => "grouped",
        }
    }
}

/// Result of taking a student off a group roster.
///
/// Contains the group as it stands after the removal and the freshly
/// re-created individual record for the released student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub group: Group,
    pub individual: Individual,
}
