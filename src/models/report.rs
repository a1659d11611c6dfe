use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::group::Group;
use super::individual::Individual;

/// Headline counts for the admin view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSummary {
    pub total_groups: usize,
    pub full_groups: usize,
    /// Sum of `capacity_remaining` over all groups.
    pub open_seats: usize,
    pub total_individuals: usize,
}

/// Everything the dashboard shows in one read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dashboard {
    pub groups: Vec<Group>,
    /// Groups with at least one and at most three open seats.
    pub partial_groups: Vec<Group>,
    pub individuals: Vec<Individual>,
}

/// Matches for a free-text search over both collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    pub groups: Vec<Group>,
    pub individuals: Vec<Individual>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.individuals.is_empty()
    }
}

/// One member of one group, flattened for export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub group_id: Uuid,
    pub name: String,
    pub student_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}
