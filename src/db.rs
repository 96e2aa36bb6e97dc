use crate::auth::Session;
use crate::identity::IdentityNumber;
use crate::student::{ClassLabel, ExpectedStudent, RegisteredStudent, UploadBatch};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Event for audit trail (imports, reconciliations, registrations)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Registered students (one row per identity number)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            national_id TEXT UNIQUE NOT NULL,
            given_name TEXT NOT NULL,
            family_name TEXT NOT NULL,
            class TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Upload batches and the expected students they carry
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS upload_batches (
            batch_id TEXT PRIMARY KEY,
            source_file TEXT NOT NULL,
            uploaded_at TEXT NOT NULL,
            accepted_rows INTEGER NOT NULL,
            rejected_rows INTEGER NOT NULL,
            content_hash TEXT NOT NULL,
            reconciled_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS expected_students (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            batch_id TEXT NOT NULL,
            row_number INTEGER NOT NULL,
            national_id TEXT NOT NULL,
            given_name TEXT NOT NULL,
            family_name TEXT NOT NULL,
            class TEXT NOT NULL,
            registered INTEGER NOT NULL DEFAULT 0,
            UNIQUE (batch_id, national_id)
        )",
        [],
    )?;

    // ==========================================================================
    // Admin accounts and sessions
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS admins (
            username TEXT PRIMARY KEY,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            issued_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_expected_batch ON expected_students(batch_id, row_number)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_expiry ON sessions(expires_at)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// Column decoding helpers
// ============================================================================

/// Fixed-width UTC timestamps so that text comparison matches time order
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_class(idx: usize, value: &str) -> rusqlite::Result<ClassLabel> {
    value
        .parse::<ClassLabel>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ============================================================================
// Registered students
// ============================================================================

/// Insert a registered student. Returns `false` if the identity number is
/// already registered.
pub fn insert_student(conn: &Connection, student: &RegisteredStudent) -> Result<bool> {
    let result = conn.execute(
        "INSERT INTO students (national_id, given_name, family_name, class, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            student.national_id.as_str(),
            student.given_name,
            student.family_name,
            student.class.code(),
            ts(student.created_at),
        ],
    );

    match result {
        Ok(_) => Ok(true),
        Err(e) if is_constraint_violation(&e) => Ok(false),
        Err(e) => Err(e).context("Failed to insert student"),
    }
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<RegisteredStudent> {
    let national_id: String = row.get(0)?;
    let class: String = row.get(3)?;
    let created_at: String = row.get(4)?;

    Ok(RegisteredStudent {
        national_id: IdentityNumber::from_digits(&national_id),
        given_name: row.get(1)?,
        family_name: row.get(2)?,
        class: parse_class(3, &class)?,
        created_at: parse_timestamp(4, &created_at)?,
    })
}

pub fn get_all_students(conn: &Connection) -> Result<Vec<RegisteredStudent>> {
    let mut stmt = conn.prepare(
        "SELECT national_id, given_name, family_name, class, created_at
         FROM students
         ORDER BY created_at, id",
    )?;

    let students = stmt
        .query_map([], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(students)
}

pub fn get_student(conn: &Connection, national_id: &IdentityNumber) -> Result<Option<RegisteredStudent>> {
    let student = conn
        .query_row(
            "SELECT national_id, given_name, family_name, class, created_at
             FROM students WHERE national_id = ?1",
            params![national_id.as_str()],
            student_from_row,
        )
        .optional()?;

    Ok(student)
}

pub fn count_students(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// Upload batches / expected students
// ============================================================================

/// Replace every expected student of `batch` with `students`, atomically.
pub fn replace_batch(conn: &Connection, batch: &UploadBatch, students: &[ExpectedStudent]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;

    let removed = tx.execute(
        "DELETE FROM expected_students WHERE batch_id = ?1",
        params![batch.batch_id],
    )?;

    tx.execute(
        "INSERT INTO upload_batches (
            batch_id, source_file, uploaded_at, accepted_rows, rejected_rows, content_hash, reconciled_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(batch_id) DO UPDATE SET
            source_file = excluded.source_file,
            uploaded_at = excluded.uploaded_at,
            accepted_rows = excluded.accepted_rows,
            rejected_rows = excluded.rejected_rows,
            content_hash = excluded.content_hash,
            reconciled_at = excluded.reconciled_at",
        params![
            batch.batch_id,
            batch.source_file,
            ts(batch.uploaded_at),
            batch.accepted_rows as i64,
            batch.rejected_rows as i64,
            batch.content_hash,
            batch.reconciled_at.map(ts),
        ],
    )?;

    let mut inserted = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO expected_students (
                batch_id, row_number, national_id, given_name, family_name, class, registered
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;

        for student in students {
            stmt.execute(params![
                batch.batch_id,
                student.row_number as i64,
                student.national_id.as_str(),
                student.given_name,
                student.family_name,
                student.class.code(),
                student.registered,
            ])
            .with_context(|| {
                format!(
                    "Failed to insert expected student from row {} of batch {}",
                    student.row_number, batch.batch_id
                )
            })?;
            inserted += 1;
        }
    }

    tx.commit()?;

    debug!(batch = %batch.batch_id, removed, inserted, "replaced upload batch");
    Ok(inserted)
}

fn expected_from_row(row: &Row<'_>) -> rusqlite::Result<ExpectedStudent> {
    let row_number: i64 = row.get(1)?;
    let national_id: String = row.get(2)?;
    let class: String = row.get(5)?;

    Ok(ExpectedStudent {
        batch_id: row.get(0)?,
        row_number: row_number as usize,
        national_id: IdentityNumber::from_digits(&national_id),
        given_name: row.get(3)?,
        family_name: row.get(4)?,
        class: parse_class(5, &class)?,
        registered: row.get(6)?,
    })
}

/// Expected students of one batch, in upload row order.
pub fn get_expected_for_batch(conn: &Connection, batch_id: &str) -> Result<Vec<ExpectedStudent>> {
    let mut stmt = conn.prepare(
        "SELECT batch_id, row_number, national_id, given_name, family_name, class, registered
         FROM expected_students
         WHERE batch_id = ?1
         ORDER BY row_number, id",
    )?;

    let students = stmt
        .query_map(params![batch_id], expected_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(students)
}

/// Stored rows of one batch whose registration flag is false.
pub fn get_unregistered_for_batch(conn: &Connection, batch_id: &str) -> Result<Vec<ExpectedStudent>> {
    let mut stmt = conn.prepare(
        "SELECT batch_id, row_number, national_id, given_name, family_name, class, registered
         FROM expected_students
         WHERE batch_id = ?1 AND registered = 0
         ORDER BY row_number, id",
    )?;

    let students = stmt
        .query_map(params![batch_id], expected_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(students)
}

fn batch_from_row(row: &Row<'_>) -> rusqlite::Result<UploadBatch> {
    let uploaded_at: String = row.get(2)?;
    let accepted: i64 = row.get(3)?;
    let rejected: i64 = row.get(4)?;
    let reconciled_at: Option<String> = row.get(6)?;

    Ok(UploadBatch {
        batch_id: row.get(0)?,
        source_file: row.get(1)?,
        uploaded_at: parse_timestamp(2, &uploaded_at)?,
        accepted_rows: accepted as usize,
        rejected_rows: rejected as usize,
        content_hash: row.get(5)?,
        reconciled_at: reconciled_at
            .map(|s| parse_timestamp(6, &s))
            .transpose()?,
    })
}

pub fn get_batch(conn: &Connection, batch_id: &str) -> Result<Option<UploadBatch>> {
    let batch = conn
        .query_row(
            "SELECT batch_id, source_file, uploaded_at, accepted_rows, rejected_rows, content_hash, reconciled_at
             FROM upload_batches WHERE batch_id = ?1",
            params![batch_id],
            batch_from_row,
        )
        .optional()?;

    Ok(batch)
}

pub fn list_batches(conn: &Connection) -> Result<Vec<UploadBatch>> {
    let mut stmt = conn.prepare(
        "SELECT batch_id, source_file, uploaded_at, accepted_rows, rejected_rows, content_hash, reconciled_at
         FROM upload_batches
         ORDER BY uploaded_at DESC, batch_id",
    )?;

    let batches = stmt
        .query_map([], batch_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(batches)
}

/// Persist reconciliation flags for one batch.
///
/// Only rows of `batch_id` are touched. Returns the number of rows whose
/// flag actually changed, so re-applying the same updates returns 0.
pub fn apply_registration_updates(
    conn: &Connection,
    batch_id: &str,
    updates: &BTreeMap<IdentityNumber, bool>,
    reconciled_at: DateTime<Utc>,
) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;

    let mut changed = 0;
    {
        let mut stmt = tx.prepare(
            "UPDATE expected_students SET registered = ?1
             WHERE batch_id = ?2 AND national_id = ?3 AND registered != ?1",
        )?;

        for (national_id, registered) in updates {
            changed += stmt.execute(params![registered, batch_id, national_id.as_str()])?;
        }
    }

    tx.execute(
        "UPDATE upload_batches SET reconciled_at = ?1 WHERE batch_id = ?2",
        params![ts(reconciled_at), batch_id],
    )?;

    tx.commit()?;

    Ok(changed)
}

// ============================================================================
// Admin accounts and sessions
// ============================================================================

/// Returns `false` if the username is taken.
pub fn insert_admin(conn: &Connection, username: &str, password_hash: &str) -> Result<bool> {
    let result = conn.execute(
        "INSERT INTO admins (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
        params![username, password_hash, ts(Utc::now())],
    );

    match result {
        Ok(_) => Ok(true),
        Err(e) if is_constraint_violation(&e) => Ok(false),
        Err(e) => Err(e).context("Failed to insert admin"),
    }
}

/// Stored PHC hash for a username
pub fn get_admin_password_hash(conn: &Connection, username: &str) -> Result<Option<String>> {
    let hash = conn
        .query_row(
            "SELECT password_hash FROM admins WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )
        .optional()?;

    Ok(hash)
}

pub fn insert_session(conn: &Connection, session: &Session) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (token, username, issued_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            session.token,
            session.username,
            ts(session.issued_at),
            ts(session.expires_at),
        ],
    )?;

    Ok(())
}

pub fn get_session(conn: &Connection, token: &str) -> Result<Option<Session>> {
    let session = conn
        .query_row(
            "SELECT token, username, issued_at, expires_at FROM sessions WHERE token = ?1",
            params![token],
            |row| {
                let issued_at: String = row.get(2)?;
                let expires_at: String = row.get(3)?;
                Ok(Session {
                    token: row.get(0)?,
                    username: row.get(1)?,
                    issued_at: parse_timestamp(2, &issued_at)?,
                    expires_at: parse_timestamp(3, &expires_at)?,
                })
            },
        )
        .optional()?;

    Ok(session)
}

pub fn delete_session(conn: &Connection, token: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;

    Ok(deleted > 0)
}

pub fn delete_expired_sessions(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= ?1",
        params![ts(now)],
    )?;

    Ok(deleted)
}

// ============================================================================
// Audit trail
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            ts(event.timestamp),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: parse_timestamp(1, &timestamp_str)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn registered(id: &str) -> RegisteredStudent {
        RegisteredStudent {
            national_id: IdentityNumber::from_digits(id),
            given_name: "Sara".to_string(),
            family_name: "Ahmadi".to_string(),
            class: ClassLabel::C701,
            created_at: Utc::now(),
        }
    }

    fn expected(id: &str, batch: &str, row: usize) -> ExpectedStudent {
        ExpectedStudent {
            national_id: IdentityNumber::from_digits(id),
            given_name: format!("Given {}", row),
            family_name: "Family".to_string(),
            class: ClassLabel::C802,
            registered: false,
            batch_id: batch.to_string(),
            row_number: row,
        }
    }

    fn batch(id: &str, accepted: usize) -> UploadBatch {
        UploadBatch {
            batch_id: id.to_string(),
            source_file: format!("{}.csv", id),
            uploaded_at: Utc::now(),
            accepted_rows: accepted,
            rejected_rows: 0,
            content_hash: "abc".to_string(),
            reconciled_at: None,
        }
    }

    #[test]
    fn test_setup_is_idempotent() {
        let conn = test_conn();
        setup_database(&conn).unwrap();
        assert_eq!(count_students(&conn).unwrap(), 0);
    }

    #[test]
    fn test_insert_student_rejects_duplicate_identity() {
        let conn = test_conn();

        assert!(insert_student(&conn, &registered("0499370899")).unwrap());
        assert!(!insert_student(&conn, &registered("0499370899")).unwrap());
        assert!(insert_student(&conn, &registered("0010010017")).unwrap());

        assert_eq!(count_students(&conn).unwrap(), 2);

        let all = get_all_students(&conn).unwrap();
        assert_eq!(all[0].national_id.as_str(), "0499370899");
        assert_eq!(all[0].class, ClassLabel::C701);

        let found = get_student(&conn, &IdentityNumber::from_digits("0010010017")).unwrap();
        assert!(found.is_some());
        assert!(get_student(&conn, &IdentityNumber::from_digits("9876543210"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_replace_batch_discards_previous_rows() {
        let conn = test_conn();

        replace_batch(
            &conn,
            &batch("B1", 2),
            &[expected("0499370899", "B1", 2), expected("0010010017", "B1", 3)],
        )
        .unwrap();
        replace_batch(&conn, &batch("B2", 1), &[expected("9876543210", "B2", 2)]).unwrap();

        // Re-upload B1 with a single row
        replace_batch(&conn, &batch("B1", 1), &[expected("0020020023", "B1", 2)]).unwrap();

        let b1 = get_expected_for_batch(&conn, "B1").unwrap();
        assert_eq!(b1.len(), 1);
        assert_eq!(b1[0].national_id.as_str(), "0020020023");

        // Other batches untouched
        assert_eq!(get_expected_for_batch(&conn, "B2").unwrap().len(), 1);
        assert_eq!(get_batch(&conn, "B1").unwrap().unwrap().accepted_rows, 1);
        assert_eq!(list_batches(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_expected_read_back_in_row_order() {
        let conn = test_conn();
        replace_batch(
            &conn,
            &batch("B1", 3),
            &[
                expected("0499370899", "B1", 7),
                expected("0010010017", "B1", 2),
                expected("9876543210", "B1", 4),
            ],
        )
        .unwrap();

        let rows: Vec<usize> = get_expected_for_batch(&conn, "B1")
            .unwrap()
            .iter()
            .map(|s| s.row_number)
            .collect();
        assert_eq!(rows, vec![2, 4, 7]);
    }

    #[test]
    fn test_apply_updates_scoped_and_idempotent() {
        let conn = test_conn();
        replace_batch(
            &conn,
            &batch("B1", 2),
            &[expected("0499370899", "B1", 2), expected("0010010017", "B1", 3)],
        )
        .unwrap();
        replace_batch(&conn, &batch("B2", 1), &[expected("0499370899", "B2", 2)]).unwrap();

        let mut updates = BTreeMap::new();
        updates.insert(IdentityNumber::from_digits("0499370899"), true);
        updates.insert(IdentityNumber::from_digits("0010010017"), false);

        let now = Utc::now();
        assert_eq!(apply_registration_updates(&conn, "B1", &updates, now).unwrap(), 1);
        assert_eq!(apply_registration_updates(&conn, "B1", &updates, now).unwrap(), 0);

        let unregistered = get_unregistered_for_batch(&conn, "B1").unwrap();
        assert_eq!(unregistered.len(), 1);
        assert_eq!(unregistered[0].national_id.as_str(), "0010010017");

        // Same identity in B2 keeps its own flag
        assert!(!get_expected_for_batch(&conn, "B2").unwrap()[0].registered);
        assert!(get_batch(&conn, "B1").unwrap().unwrap().reconciled_at.is_some());
        assert!(get_batch(&conn, "B2").unwrap().unwrap().reconciled_at.is_none());
    }

    #[test]
    fn test_sessions_round_trip_and_expiry() {
        let conn = test_conn();
        let now = Utc::now();

        let session = Session {
            token: "tok-1".to_string(),
            username: "admin".to_string(),
            issued_at: now - Duration::hours(25),
            expires_at: now - Duration::hours(1),
        };
        insert_session(&conn, &session).unwrap();

        let loaded = get_session(&conn, "tok-1").unwrap().unwrap();
        assert_eq!(loaded.username, "admin");

        assert_eq!(delete_expired_sessions(&conn, now).unwrap(), 1);
        assert!(get_session(&conn, "tok-1").unwrap().is_none());
        assert!(!delete_session(&conn, "tok-1").unwrap());
    }

    #[test]
    fn test_admin_username_unique() {
        let conn = test_conn();
        assert!(insert_admin(&conn, "admin", "$argon2id$first").unwrap());
        assert!(!insert_admin(&conn, "admin", "$argon2id$second").unwrap());
        assert_eq!(
            get_admin_password_hash(&conn, "admin").unwrap(),
            Some("$argon2id$first".to_string())
        );
        assert!(get_admin_password_hash(&conn, "nobody").unwrap().is_none());
    }

    #[test]
    fn test_event_log() {
        let conn = test_conn();

        let event = Event::new(
            "batch_uploaded",
            "batch",
            "B1",
            serde_json::json!({"accepted": 3}),
            "test_actor",
        );

        insert_event(&conn, &event).unwrap();

        let events = get_events_for_entity(&conn, "batch", "B1").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "batch_uploaded");
        assert_eq!(events[0].actor, "test_actor");
        assert_eq!(events[0].data["accepted"], 3);
    }
}
