//! Membership rules: how a student moves between unregistered, individual
//! and grouped.
//!
//! Each operation exists twice. The free functions hold the rules and work
//! against any [`RosterStore`]; [`MembershipEngine`] runs them inside one
//! [`Database::write`] transaction so every check and every write of an
//! operation happen in a single critical section. A failing operation leaves
//! both collections untouched.

use std::collections::HashSet;

use thiserror::Error;
use uuid::Uuid;

use crate::codec::{self, FormatError, ParseError};
use crate::db::{Database, RosterStore, StoreError};
use crate::identity::IdentityKey;
use crate::models::*;
use crate::query;

#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("invalid roster: {0}")]
    InvalidFormat(#[from] ParseError),

    #[error("invalid member: {0}")]
    Format(#[from] FormatError),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("a group needs {lo} to {hi} members, got {count}")]
    SizeOutOfRange { count: usize, lo: usize, hi: usize },

    #[error("creator {0} must be listed among the group members")]
    CreatorNotIncluded(String),

    #[error("already in a group or registered as individuals: {}", .names.join(", "))]
    MemberConflict { names: Vec<String> },

    #[error("student {0} is already in a group")]
    AlreadyGrouped(String),

    #[error("student {0} is already registered as looking for a group")]
    AlreadyIndividual(String),

    #[error("group {0} is full")]
    GroupFull(Uuid),

    #[error("cannot remove the last member of group {0}")]
    LastMemberProtected(Uuid),

    #[error("student {0} is not in any group")]
    NotGrouped(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for MembershipError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateStudent(id) => Self::AlreadyIndividual(id),
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::Format(e) => Self::Format(e),
            other => Self::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, MembershipError>;

fn not_found(entity: &'static str, id: impl ToString) -> MembershipError {
    MembershipError::NotFound {
        entity,
        id: id.to_string(),
    }
}

fn required_key(student_id: &str) -> Result<IdentityKey> {
    let key = IdentityKey::new(student_id);
    if key.is_empty() {
        return Err(MembershipError::MissingField("student_id"));
    }
    Ok(key)
}

// ============================================================
// Rules
// ============================================================

/// A blank id names nobody, so it reports `Unregistered`.
pub fn find_student_state<S: RosterStore + ?Sized>(
    store: &S,
    student_id: &str,
) -> Result<StudentState> {
    let key = IdentityKey::new(student_id);
    if key.is_empty() {
        return Ok(StudentState::Unregistered);
    }

    if let Some(group) = store.find_group_by_member(&key)? {
        let member = group.member(&key).cloned();
        if let Some(member) = member {
            return Ok(StudentState::Grouped { group, member });
        }
        tracing::warn!(student_id = %key, group_id = %group.id, "membership index out of step with roster");
    }
    if let Some(individual) = store.find_individual(&key)? {
        return Ok(StudentState::Individual { individual });
    }
    Ok(StudentState::Unregistered)
}

pub fn register_individual<S: RosterStore + ?Sized>(
    store: &S,
    input: &RegisterIndividualInput,
) -> Result<Individual> {
    let name = input.name.trim();
    let student_id = input.student_id.trim();
    let email = input.email.trim();
    for (field, value) in [("name", name), ("student_id", student_id), ("email", email)] {
        if value.is_empty() {
            return Err(MembershipError::MissingField(field));
        }
    }
    // Must stay representable once the student joins a roster
    codec::encode(&Member::new(name, student_id))?;

    let key = IdentityKey::new(student_id);
    if store.find_group_by_member(&key)?.is_some() {
        return Err(MembershipError::AlreadyGrouped(key.to_string()));
    }
    if store.find_individual(&key)?.is_some() {
        return Err(MembershipError::AlreadyIndividual(key.to_string()));
    }

    Ok(store.insert_individual(name, student_id, email)?)
}

/// Found a group from pasted roster text.
///
/// The creator's own individual registration, if any, is absorbed into the
/// new group. Any other listed student who is already grouped, already
/// registered as an individual, or listed twice is a conflict, and all
/// conflicts are reported together.
pub fn create_group<S: RosterStore + ?Sized>(
    store: &S,
    creator_id: &str,
    roster: &str,
    bound: SizeBound,
) -> Result<Group> {
    let creator = required_key(creator_id)?;
    let members = codec::parse_roster_input(roster)?;

    if !bound.contains(members.len()) {
        return Err(MembershipError::SizeOutOfRange {
            count: members.len(),
            lo: bound.lo,
            hi: bound.hi,
        });
    }
    if !members.iter().any(|m| m.key() == creator) {
        return Err(MembershipError::CreatorNotIncluded(creator.to_string()));
    }

    let mut seen = HashSet::new();
    let mut conflicts = Vec::new();
    let mut absorbed = Vec::new();
    for member in &members {
        let key = member.key();
        if !seen.insert(key.clone()) || store.find_group_by_member(&key)?.is_some() {
            conflicts.push(member.name.clone());
        } else if let Some(individual) = store.find_individual(&key)? {
            if key == creator {
                absorbed.push(individual);
            } else {
                conflicts.push(member.name.clone());
            }
        }
    }
    if !conflicts.is_empty() {
        return Err(MembershipError::MemberConflict { names: conflicts });
    }

    let group = store.insert_group(&members)?;
    for individual in absorbed {
        let key = individual.key();
        store.delete_individual(&key)?;
        store.remember_member_email(&key, &individual.email)?;
    }
    Ok(group)
}

pub fn add_member<S: RosterStore + ?Sized>(
    store: &S,
    group_id: Uuid,
    individual_id: Uuid,
) -> Result<Group> {
    let group = store
        .find_group(group_id)?
        .ok_or_else(|| not_found("group", group_id))?;
    if group.is_full() {
        return Err(MembershipError::GroupFull(group_id));
    }
    let individual = store
        .find_individual_by_id(individual_id)?
        .ok_or_else(|| not_found("individual", individual_id))?;

    let key = individual.key();
    if store.find_group_by_member(&key)?.is_some() {
        return Err(MembershipError::AlreadyGrouped(key.to_string()));
    }

    let mut members = group.members;
    members.push(individual.as_member());
    let updated = store.update_group_members(group_id, &members)?;
    store.delete_individual(&key)?;
    store.remember_member_email(&key, &individual.email)?;
    Ok(updated)
}

/// Take a student off a roster and put them back among the individuals.
///
/// A group's last member cannot be removed this way; groups are only
/// deleted through [`disband_group`].
pub fn remove_member<S: RosterStore + ?Sized>(
    store: &S,
    group_id: Uuid,
    student_id: &str,
) -> Result<Release> {
    let key = required_key(student_id)?;
    let group = store
        .find_group(group_id)?
        .ok_or_else(|| not_found("group", group_id))?;
    let member = group
        .member(&key)
        .cloned()
        .ok_or_else(|| not_found("member", &key))?;
    if group.members.len() <= 1 {
        return Err(MembershipError::LastMemberProtected(group_id));
    }

    let email = store
        .member_email(&key)?
        .unwrap_or_else(|| UNKNOWN_EMAIL.to_string());
    let group = store.update_group_members(group_id, &group.without(&key))?;
    let individual = store.insert_individual(&member.name, &member.student_id, &email)?;
    Ok(Release { group, individual })
}

pub fn switch_group<S: RosterStore + ?Sized>(store: &S, student_id: &str) -> Result<Release> {
    let key = required_key(student_id)?;
    let group = store
        .find_group_by_member(&key)?
        .ok_or_else(|| MembershipError::NotGrouped(key.to_string()))?;
    remove_member(store, group.id, student_id)
}

/// Delete a group, releasing every member back to the individuals.
pub fn disband_group<S: RosterStore + ?Sized>(
    store: &S,
    group_id: Uuid,
) -> Result<Vec<Individual>> {
    let group = store
        .find_group(group_id)?
        .ok_or_else(|| not_found("group", group_id))?;

    let mut released = Vec::with_capacity(group.members.len());
    for member in &group.members {
        let email = store
            .member_email(&member.key())?
            .unwrap_or_else(|| UNKNOWN_EMAIL.to_string());
        released.push((member, email));
    }

    store.delete_group(group_id)?;
    released
        .into_iter()
        .map(|(member, email)| {
            store
                .insert_individual(&member.name, &member.student_id, &email)
                .map_err(MembershipError::from)
        })
        .collect()
}

pub fn withdraw_individual<S: RosterStore + ?Sized>(store: &S, student_id: &str) -> Result<()> {
    let key = required_key(student_id)?;
    if store.find_group_by_member(&key)?.is_some() {
        return Err(MembershipError::AlreadyGrouped(key.to_string()));
    }
    if !store.delete_individual(&key)? {
        return Err(not_found("individual", &key));
    }
    Ok(())
}

// ============================================================
// Engine
// ============================================================

/// Entry point for every caller (CLI, HTTP API).
///
/// Writes run through [`Database::write`]; reads see the latest committed
/// state.
#[derive(Clone)]
pub struct MembershipEngine {
    db: Database,
}

impl MembershipEngine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn student_state(&self, student_id: &str) -> Result<StudentState> {
        self.db.read(|roster| find_student_state(roster, student_id))
    }

    pub fn register_individual(&self, input: RegisterIndividualInput) -> Result<Individual> {
        let individual = self.db.write(|roster| register_individual(roster, &input))?;
        tracing::info!(student_id = %individual.key(), "registered individual");
        Ok(individual)
    }

    pub fn create_group(&self, input: CreateGroupInput) -> Result<Group> {
        let bound = SizeBound::for_partial(input.partial);
        let group = self
            .db
            .write(|roster| create_group(roster, &input.creator_id, &input.roster, bound))?;
        tracing::info!(
            group_id = %group.id,
            size = group.members.len(),
            partial = input.partial,
            "created group"
        );
        Ok(group)
    }

    pub fn add_member(&self, group_id: Uuid, individual_id: Uuid) -> Result<Group> {
        let group = self
            .db
            .write(|roster| add_member(roster, group_id, individual_id))?;
        tracing::info!(group_id = %group_id, capacity_remaining = group.capacity_remaining, "added member");
        Ok(group)
    }

    pub fn remove_member(&self, group_id: Uuid, student_id: &str) -> Result<Release> {
        let release = self
            .db
            .write(|roster| remove_member(roster, group_id, student_id))?;
        tracing::info!(group_id = %group_id, student_id = %release.individual.key(), "removed member");
        Ok(release)
    }

    pub fn switch_group(&self, student_id: &str) -> Result<Release> {
        let release = self.db.write(|roster| switch_group(roster, student_id))?;
        tracing::info!(
            group_id = %release.group.id,
            student_id = %release.individual.key(),
            "student left group"
        );
        Ok(release)
    }

    pub fn disband_group(&self, group_id: Uuid) -> Result<Vec<Individual>> {
        let released = self.db.write(|roster| disband_group(roster, group_id))?;
        tracing::info!(group_id = %group_id, released = released.len(), "disbanded group");
        Ok(released)
    }

    pub fn withdraw_individual(&self, student_id: &str) -> Result<()> {
        self.db
            .write(|roster| withdraw_individual(roster, student_id))?;
        tracing::info!(student_id = %IdentityKey::new(student_id), "withdrew individual");
        Ok(())
    }

    pub fn find_group(&self, group_id: Uuid) -> Result<Option<Group>> {
        self.db.read(|roster| Ok(roster.find_group(group_id)?))
    }

    pub fn list_groups(&self) -> Result<Vec<Group>> {
        self.db.read(|roster| Ok(roster.list_groups()?))
    }

    pub fn list_individuals(&self) -> Result<Vec<Individual>> {
        self.db.read(|roster| Ok(roster.list_individuals()?))
    }

    pub fn search(&self, term: &str) -> Result<SearchResults> {
        self.db.read(|roster| Ok(query::search(roster, term)?))
    }

    pub fn summary(&self) -> Result<RosterSummary> {
        self.db.read(|roster| Ok(query::summary(roster)?))
    }

    pub fn dashboard(&self) -> Result<Dashboard> {
        self.db.read(|roster| Ok(query::dashboard(roster)?))
    }

    pub fn export_rows(&self) -> Result<Vec<ExportRow>> {
        self.db.read(|roster| Ok(query::export_rows(roster)?))
    }
}
