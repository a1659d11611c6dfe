use std::collections::HashSet;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{parse_datetime, parse_uuid, RosterStore, StoreError, StoreResult};
use crate::codec;
use crate::identity::IdentityKey;
use crate::models::*;

const GROUP_COLUMNS: &str = "g.id, g.members, g.vacancies, g.created_at";
const INDIVIDUAL_COLUMNS: &str = "id, name, student_id, email, created_at";

/// A view of the roster tables through one borrowed connection.
///
/// Handed out by [`Database::write`](super::Database::write) (inside a
/// transaction) and [`Database::read`](super::Database::read).
pub struct Roster<'c> {
    conn: &'c Connection,
}

/// A `groups` row before its member list has been decoded.
struct GroupRow {
    id: String,
    members: String,
    vacancies: i64,
    created_at: String,
}

impl GroupRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            members: row.get(1)?,
            vacancies: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    fn into_group(self) -> StoreResult<Group> {
        Ok(Group {
            id: parse_uuid(self.id),
            members: codec::decode_list(&self.members)?,
            capacity_remaining: self.vacancies.clamp(0, MAX_GROUP_SIZE as i64) as u8,
            created_at: parse_datetime(self.created_at),
        })
    }
}

fn individual_from_row(row: &Row<'_>) -> rusqlite::Result<Individual> {
    Ok(Individual {
        id: parse_uuid(row.get::<_, String>(0)?),
        name: row.get(1)?,
        student_id: row.get(2)?,
        email: row.get(3)?,
        created_at: parse_datetime(row.get::<_, String>(4)?),
    })
}

impl<'c> Roster<'c> {
    pub(super) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn query_groups(&self, sql: &str, params: impl rusqlite::Params) -> StoreResult<Vec<Group>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, GroupRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(GroupRow::into_group).collect()
    }

    fn query_group(&self, sql: &str, params: impl rusqlite::Params) -> StoreResult<Option<Group>> {
        self.conn
            .query_row(sql, params, GroupRow::from_row)
            .optional()?
            .map(GroupRow::into_group)
            .transpose()
    }

    fn member_keys(&self, group_id: Uuid) -> StoreResult<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT student_key FROM group_members WHERE group_id = ?")?;
        let keys = stmt
            .query_map([group_id.to_string()], |row| row.get(0))?
            .collect::<Result<HashSet<String>, _>>()?;
        Ok(keys)
    }
}

impl RosterStore for Roster<'_> {
    fn find_group(&self, group_id: Uuid) -> StoreResult<Option<Group>> {
        self.query_group(
            &format!("SELECT {GROUP_COLUMNS} FROM groups g WHERE g.id = ?"),
            [group_id.to_string()],
        )
    }

    fn find_group_by_member(&self, key: &IdentityKey) -> StoreResult<Option<Group>> {
        self.query_group(
            &format!(
                "SELECT {GROUP_COLUMNS} FROM groups g
                 JOIN group_members m ON m.group_id = g.id
                 WHERE m.student_key = ?"
            ),
            [key.as_str()],
        )
    }

    fn find_individual(&self, key: &IdentityKey) -> StoreResult<Option<Individual>> {
        let individual = self
            .conn
            .query_row(
                &format!("SELECT {INDIVIDUAL_COLUMNS} FROM individuals WHERE student_key = ?"),
                [key.as_str()],
                individual_from_row,
            )
            .optional()?;
        Ok(individual)
    }

    fn find_individual_by_id(&self, individual_id: Uuid) -> StoreResult<Option<Individual>> {
        let individual = self
            .conn
            .query_row(
                &format!("SELECT {INDIVIDUAL_COLUMNS} FROM individuals WHERE id = ?"),
                [individual_id.to_string()],
                individual_from_row,
            )
            .optional()?;
        Ok(individual)
    }

    fn insert_group(&self, members: &[Member]) -> StoreResult<Group> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let capacity_remaining = capacity_for(members.len());

        self.conn.execute(
            "INSERT INTO groups (id, members, vacancies, created_at) VALUES (?, ?, ?, ?)",
            (
                id.to_string(),
                codec::encode_list(members)?,
                capacity_remaining,
                now.to_rfc3339(),
            ),
        )?;
        for member in members {
            self.conn.execute(
                "INSERT INTO group_members (student_key, group_id) VALUES (?, ?)",
                (member.key().as_str(), id.to_string()),
            )?;
        }

        tracing::debug!(group_id = %id, size = members.len(), "inserted group");
        Ok(Group {
            id,
            members: members.to_vec(),
            capacity_remaining,
            created_at: now,
        })
    }

    fn insert_individual(
        &self,
        name: &str,
        student_id: &str,
        email: &str,
    ) -> StoreResult<Individual> {
        let key = IdentityKey::new(student_id);
        if self.find_individual(&key)?.is_some() {
            return Err(StoreError::DuplicateStudent(key.to_string()));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO individuals (id, name, student_id, student_key, email, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                name,
                student_id,
                key.as_str(),
                email,
                now.to_rfc3339(),
            ),
        )?;

        Ok(Individual {
            id,
            name: name.to_string(),
            student_id: student_id.to_string(),
            email: email.to_string(),
            created_at: now,
        })
    }

    fn update_group_members(&self, group_id: Uuid, members: &[Member]) -> StoreResult<Group> {
        let Some(existing) = self.find_group(group_id)? else {
            return Err(StoreError::NotFound {
                entity: "group",
                id: group_id.to_string(),
            });
        };

        let capacity_remaining = capacity_for(members.len());
        self.conn.execute(
            "UPDATE groups SET members = ?, vacancies = ? WHERE id = ?",
            (
                codec::encode_list(members)?,
                capacity_remaining,
                group_id.to_string(),
            ),
        )?;

        // Keep the membership index in step; rows that survive keep their email.
        let previous = self.member_keys(group_id)?;
        let current: HashSet<String> = members.iter().map(|m| m.key().to_string()).collect();
        for gone in previous.difference(&current) {
            self.conn
                .execute("DELETE FROM group_members WHERE student_key = ?", [gone])?;
        }
        for added in current.difference(&previous) {
            self.conn.execute(
                "INSERT INTO group_members (student_key, group_id) VALUES (?, ?)",
                (added, group_id.to_string()),
            )?;
        }

        Ok(Group {
            id: group_id,
            members: members.to_vec(),
            capacity_remaining,
            created_at: existing.created_at,
        })
    }

    fn delete_group(&self, group_id: Uuid) -> StoreResult<bool> {
        self.conn.execute(
            "DELETE FROM group_members WHERE group_id = ?",
            [group_id.to_string()],
        )?;
        let rows = self
            .conn
            .execute("DELETE FROM groups WHERE id = ?", [group_id.to_string()])?;
        Ok(rows > 0)
    }

    fn delete_individual(&self, key: &IdentityKey) -> StoreResult<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM individuals WHERE student_key = ?", [key.as_str()])?;
        Ok(rows > 0)
    }

    fn list_groups(&self) -> StoreResult<Vec<Group>> {
        self.query_groups(
            &format!("SELECT {GROUP_COLUMNS} FROM groups g ORDER BY g.created_at, g.rowid"),
            [],
        )
    }

    fn list_individuals(&self) -> StoreResult<Vec<Individual>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {INDIVIDUAL_COLUMNS} FROM individuals ORDER BY created_at, rowid"
        ))?;
        let individuals = stmt
            .query_map([], individual_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(individuals)
    }

    fn list_groups_with_capacity_between(&self, lo: u8, hi: u8) -> StoreResult<Vec<Group>> {
        self.query_groups(
            &format!(
                "SELECT {GROUP_COLUMNS} FROM groups g
                 WHERE g.vacancies BETWEEN ? AND ?
                 ORDER BY g.created_at, g.rowid"
            ),
            (lo, hi),
        )
    }

    fn member_email(&self, key: &IdentityKey) -> StoreResult<Option<String>> {
        let email = self
            .conn
            .query_row(
                "SELECT email FROM group_members WHERE student_key = ?",
                [key.as_str()],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(email.flatten())
    }

    fn remember_member_email(&self, key: &IdentityKey, email: &str) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE group_members SET email = ? WHERE student_key = ?",
            (email, key.as_str()),
        )?;
        Ok(())
    }
}
