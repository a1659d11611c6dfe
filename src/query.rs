//! Read-only views over the roster: free-text search, the dashboard, the
//! admin summary and the export rows.
//!
//! Search is deliberately fuzzy (case-insensitive substring). Membership
//! checks never go through here; they use exact identity keys.

use crate::db::{RosterStore, StoreResult};
use crate::models::*;

fn matches(term: &str, name: &str, student_id: &str) -> bool {
    name.to_lowercase().contains(term) || student_id.to_lowercase().contains(term)
}

fn normalize_term(term: &str) -> Option<String> {
    let term = term.trim();
    (!term.is_empty()).then(|| term.to_lowercase())
}

pub fn search_groups<S: RosterStore + ?Sized>(store: &S, term: &str) -> StoreResult<Vec<Group>> {
    let Some(term) = normalize_term(term) else {
        return Ok(Vec::new());
    };
    Ok(store
        .list_groups()?
        .into_iter()
        .filter(|g| {
            g.members
                .iter()
                .any(|m| matches(&term, &m.name, &m.student_id))
        })
        .collect())
}

pub fn search_individuals<S: RosterStore + ?Sized>(
    store: &S,
    term: &str,
) -> StoreResult<Vec<Individual>> {
    let Some(term) = normalize_term(term) else {
        return Ok(Vec::new());
    };
    Ok(store
        .list_individuals()?
        .into_iter()
        .filter(|i| matches(&term, &i.name, &i.student_id))
        .collect())
}

pub fn search<S: RosterStore + ?Sized>(store: &S, term: &str) -> StoreResult<SearchResults> {
    Ok(SearchResults {
        groups: search_groups(store, term)?,
        individuals: search_individuals(store, term)?,
    })
}

pub fn summary<S: RosterStore + ?Sized>(store: &S) -> StoreResult<RosterSummary> {
    let groups = store.list_groups()?;
    Ok(RosterSummary {
        total_groups: groups.len(),
        full_groups: groups.iter().filter(|g| g.is_full()).count(),
        open_seats: groups.iter().map(|g| g.capacity_remaining as usize).sum(),
        total_individuals: store.list_individuals()?.len(),
    })
}

pub fn dashboard<S: RosterStore + ?Sized>(store: &S) -> StoreResult<Dashboard> {
    Ok(Dashboard {
        groups: store.list_groups()?,
        partial_groups: store.list_groups_with_capacity_between(1, (MAX_GROUP_SIZE - 1) as u8)?,
        individuals: store.list_individuals()?,
    })
}

/// One row per member of every group, in group then join order.
pub fn export_rows<S: RosterStore + ?Sized>(store: &S) -> StoreResult<Vec<ExportRow>> {
    Ok(store
        .list_groups()?
        .into_iter()
        .flat_map(|g| {
            let group_id = g.id;
            g.members.into_iter().map(move |m| ExportRow {
                group_id,
                name: m.name,
                student_id: m.student_id,
            })
        })
        .collect())
}
