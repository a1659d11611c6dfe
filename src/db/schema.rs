use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::codec;
use crate::identity::IdentityKey;
use crate::models::{capacity_for, MAX_GROUP_SIZE};

struct Migration {
    version: &'static str,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "001",
        name: "initial",
        sql: include_str!("migrations/001_initial.sql"),
    },
    Migration {
        version: "002",
        name: "group_vacancy_index",
        sql: include_str!("migrations/002_group_vacancy_index.sql"),
    },
];

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )
    .context("Failed to create schema_migrations table")?;

    // Files written by the legacy tool have integer ids and no version tracking
    if is_legacy_database(conn)? {
        upgrade_legacy(conn).context("Failed to convert legacy roster database")?;
    }

    let applied = get_applied_migrations(conn)?;

    for migration in MIGRATIONS {
        if !applied.contains(&migration.version.to_string()) {
            apply_migration(conn, migration)?;
        }
    }

    Ok(())
}

fn is_legacy_database(conn: &Connection) -> Result<bool> {
    let migration_count: i32 =
        conn.query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
            row.get(0)
        })?;

    if migration_count > 0 {
        return Ok(false);
    }

    let id_type: Option<String> = conn
        .query_row(
            "SELECT type FROM pragma_table_info('groups') WHERE name = 'id'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    Ok(id_type.is_some_and(|t| t.eq_ignore_ascii_case("INTEGER")))
}

fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let versions = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(versions)
}

fn mark_migration_applied(conn: &Connection, version: &str, name: &str) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)",
        (version, name, &now),
    )?;
    Ok(())
}

fn apply_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    tracing::info!(
        "Applying migration {}: {}",
        migration.version,
        migration.name
    );

    conn.execute_batch(&format!("BEGIN TRANSACTION; {} COMMIT;", migration.sql))
        .with_context(|| {
            format!(
                "Failed to apply migration {}: {}",
                migration.version, migration.name
            )
        })?;

    mark_migration_applied(conn, migration.version, migration.name)?;

    tracing::info!("Migration {} applied successfully", migration.version);
    Ok(())
}

/// Legacy timestamps look like `2024-09-30 14:03:11.482913`.
fn legacy_timestamp(raw: Option<String>) -> String {
    raw.and_then(|s| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S%.f").ok())
        .map(|naive| naive.and_utc())
        .unwrap_or_else(Utc::now)
        .to_rfc3339()
}

/// Rewrite a legacy database in place as schema version 001.
///
/// Member lists are read with the strict legacy list reader. Students the
/// legacy tool let into several places are kept in the first group that
/// lists them, and grouped students lose their individual record.
fn upgrade_legacy(conn: &Connection) -> Result<()> {
    tracing::info!("Detected legacy roster database, converting to migration 001");

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "ALTER TABLE groups RENAME TO legacy_groups;
         ALTER TABLE individuals RENAME TO legacy_individuals;",
    )?;
    tx.execute_batch(MIGRATIONS[0].sql)?;

    let individuals = {
        let mut stmt = tx.prepare(
            "SELECT name, student_id, email, created_at FROM legacy_individuals ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    for (name, student_id, email, created_at) in individuals {
        let student_id = student_id.unwrap_or_default();
        let key = IdentityKey::new(&student_id);
        if key.is_empty() {
            tracing::warn!("Skipping legacy individual without a student id");
            continue;
        }
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO individuals (id, name, student_id, student_key, email, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                name.unwrap_or_default(),
                student_id.trim(),
                key.as_str(),
                email.unwrap_or_else(|| crate::models::UNKNOWN_EMAIL.to_string()),
                legacy_timestamp(created_at),
            ),
        )?;
        if inserted == 0 {
            tracing::warn!(student_id = %key, "Skipping duplicate legacy individual");
        }
    }

    let groups = {
        let mut stmt =
            tx.prepare("SELECT id, members, created_at FROM legacy_groups ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let mut placed: HashSet<IdentityKey> = HashSet::new();
    for (legacy_id, members, created_at) in groups {
        let members = codec::decode_legacy_list(members.as_deref().unwrap_or("[]"))
            .with_context(|| format!("Legacy group {legacy_id} has an unreadable member list"))?;

        let mut kept = Vec::with_capacity(members.len());
        for member in members {
            if placed.insert(member.key()) {
                kept.push(member);
            } else {
                tracing::warn!(
                    legacy_group = legacy_id,
                    student_id = %member.key(),
                    "Dropping student already placed in an earlier legacy group"
                );
            }
        }
        if kept.is_empty() {
            tracing::warn!(legacy_group = legacy_id, "Skipping empty legacy group");
            continue;
        }
        if kept.len() > MAX_GROUP_SIZE {
            anyhow::bail!("Legacy group {} has {} members", legacy_id, kept.len());
        }

        let id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO groups (id, members, vacancies, created_at) VALUES (?, ?, ?, ?)",
            (
                &id,
                codec::encode_list(&kept)?,
                capacity_for(kept.len()),
                legacy_timestamp(created_at),
            ),
        )?;
        for member in &kept {
            tx.execute(
                "INSERT INTO group_members (student_key, group_id) VALUES (?, ?)",
                (member.key().as_str(), &id),
            )?;
        }
    }

    tx.execute_batch(
        "UPDATE group_members SET email = (
             SELECT i.email FROM individuals i WHERE i.student_key = group_members.student_key
         );
         DELETE FROM individuals WHERE student_key IN (SELECT student_key FROM group_members);
         DROP TABLE legacy_groups;
         DROP TABLE legacy_individuals;",
    )?;
    mark_migration_applied(&tx, "001", "initial")?;
    tx.commit()?;

    tracing::info!("Legacy roster database converted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in ["groups", "individuals", "group_members"] {
            let count: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }

        let versions = get_applied_migrations(&conn).unwrap();
        assert_eq!(versions, vec!["001", "002"]);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let versions = get_applied_migrations(&conn).unwrap();
        assert_eq!(versions, vec!["001", "002"]);
    }

    #[test]
    fn test_legacy_db_is_converted() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE groups (id INTEGER PRIMARY KEY AUTOINCREMENT, members TEXT, vacancies INTEGER, created_at TIMESTAMP);
             CREATE TABLE individuals (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, student_id TEXT UNIQUE, email TEXT, created_at TIMESTAMP);
             INSERT INTO groups (members, vacancies, created_at)
                 VALUES ('[''Ada (S1)'', ''Bob (S2)'']', 2, '2024-09-30 14:03:11.482913');
             INSERT INTO groups (members, vacancies, created_at)
                 VALUES ('[''Bob (S2)'', ''Cy (S3)'']', 2, '2024-09-30 14:05:00.000000');
             INSERT INTO individuals (name, student_id, email, created_at)
                 VALUES ('Ada', 'S1', 'ada@x', '2024-09-29 10:00:00.000000');
             INSERT INTO individuals (name, student_id, email, created_at)
                 VALUES ('Dee', 'S4', 'dee@x', '2024-09-29 11:00:00.000000');",
        )
        .unwrap();

        run_migrations(&conn).unwrap();

        let versions = get_applied_migrations(&conn).unwrap();
        assert_eq!(versions, vec!["001", "002"]);

        let individuals: Vec<String> = conn
            .prepare("SELECT student_key FROM individuals")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(individuals, vec!["S4"]);

        let ada_email: Option<String> = conn
            .query_row(
                "SELECT email FROM group_members WHERE student_key = 'S1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(ada_email.as_deref(), Some("ada@x"));

        // Bob stays with the first group only
        let second: String = conn
            .query_row(
                "SELECT members FROM groups WHERE vacancies = 3",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(codec::decode_list(&second).unwrap().len(), 1);
    }

    #[test]
    fn test_legacy_db_with_unreadable_members_is_left_untouched() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE groups (id INTEGER PRIMARY KEY AUTOINCREMENT, members TEXT, vacancies INTEGER, created_at TIMESTAMP);
             CREATE TABLE individuals (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, student_id TEXT, email TEXT, created_at TIMESTAMP);
             INSERT INTO groups (members, vacancies, created_at) VALUES ('[''Ada'', ''Bob'']', 2, NULL);",
        )
        .unwrap();

        assert!(run_migrations(&conn).is_err());

        let legacy_tables: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name LIKE 'legacy_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(legacy_tables, 0);
    }
}
