// 📋 Tracking Service - upload rosters and reconcile them against registrations
//
// import:    sheet → raw rows → validated rows → replace batch in store
// reconcile: load batch + all registrations → engine → persist flags

use crate::db::{self, Event};
use crate::error::{TrackerError, TrackerResult};
use crate::extract::{ingest_rows, RowError};
use crate::parser::{detect_format, get_parser, SheetFormat};
use crate::reconciliation::{ReconciliationEngine, ReconciliationReport};
use crate::student::{ExpectedStudent, UploadBatch};
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub batch: UploadBatch,
    pub accepted: usize,
    pub errors: Vec<RowError>,
}

impl ImportSummary {
    pub fn summary(&self) -> String {
        format!(
            "Imported batch {} from {}: {} accepted, {} rejected",
            self.batch.batch_id,
            self.batch.source_file,
            self.accepted,
            self.errors.len()
        )
    }
}

pub struct TrackingService {
    engine: ReconciliationEngine,
    actor: String,
}

impl TrackingService {
    pub fn new(actor: &str) -> Self {
        TrackingService {
            engine: ReconciliationEngine::new(),
            actor: actor.to_string(),
        }
    }

    /// Import a roster file. The format comes from the file extension.
    pub fn import_file(&self, conn: &Connection, path: &Path, batch_id: &str) -> TrackerResult<ImportSummary> {
        let format = detect_format(path).map_err(TrackerError::Sheet)?;
        let bytes = fs::read(path)?;
        let source_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");

        self.import_bytes(conn, &bytes, source_name, batch_id, format)
    }

    /// Import an uploaded roster, replacing any batch with the same id.
    ///
    /// A roster with no valid rows fails and leaves the stored batch as it was.
    pub fn import_bytes(
        &self,
        conn: &Connection,
        bytes: &[u8],
        source_name: &str,
        batch_id: &str,
        format: SheetFormat,
    ) -> TrackerResult<ImportSummary> {
        let batch_id = batch_id.trim();
        if batch_id.is_empty() {
            return Err(TrackerError::EmptyBatchId);
        }

        let rows = get_parser(format)
            .parse_reader(&mut Cursor::new(bytes), source_name)
            .map_err(TrackerError::Sheet)?;

        let report = match ingest_rows(&rows, batch_id) {
            Ok(report) => report,
            Err(e) => {
                warn!(batch = batch_id, source = source_name, "{}", e);
                return Err(e.into());
            }
        };

        let batch = UploadBatch {
            batch_id: batch_id.to_string(),
            source_file: source_name.to_string(),
            uploaded_at: Utc::now(),
            accepted_rows: report.accepted.len(),
            rejected_rows: report.errors.len(),
            content_hash: content_hash(bytes),
            reconciled_at: None,
        };

        db::replace_batch(conn, &batch, &report.accepted)?;

        let event = Event::new(
            "batch_uploaded",
            "batch",
            batch_id,
            serde_json::json!({
                "source_file": source_name,
                "format": format.name(),
                "accepted": batch.accepted_rows,
                "rejected": batch.rejected_rows,
                "content_hash": batch.content_hash,
            }),
            &self.actor,
        );
        db::insert_event(conn, &event)?;

        let summary = ImportSummary {
            accepted: report.accepted.len(),
            errors: report.errors,
            batch,
        };
        info!("{}", summary.summary());

        Ok(summary)
    }

    /// Reconcile a stored batch against all registrations and persist the flags.
    pub fn reconcile_batch(&self, conn: &Connection, batch_id: &str) -> TrackerResult<ReconciliationReport> {
        if db::get_batch(conn, batch_id)?.is_none() {
            return Err(TrackerError::UnknownBatch(batch_id.to_string()));
        }

        let expected = db::get_expected_for_batch(conn, batch_id)?;
        let registered = db::get_all_students(conn)?;

        let report = self.engine.report(batch_id, &expected, &registered);
        let changed = db::apply_registration_updates(
            conn,
            batch_id,
            &report.outcome.updates,
            report.reconciled_at,
        )?;

        let event = Event::new(
            "batch_reconciled",
            "batch",
            batch_id,
            serde_json::json!({
                "expected": report.expected_count,
                "registered": report.registered_count,
                "unregistered": report.unregistered_count,
                "changed": changed,
            }),
            &self.actor,
        );
        db::insert_event(conn, &event)?;

        Ok(report)
    }

    /// Students of a batch still flagged unregistered, in upload order.
    pub fn unregistered_for_batch(&self, conn: &Connection, batch_id: &str) -> TrackerResult<Vec<ExpectedStudent>> {
        if db::get_batch(conn, batch_id)?.is_none() {
            return Err(TrackerError::UnknownBatch(batch_id.to_string()));
        }

        Ok(db::get_unregistered_for_batch(conn, batch_id)?)
    }
}

impl Default for TrackingService {
    fn default() -> Self {
        Self::new("system")
    }
}

/// Default batch id for a roster file: its file stem
pub fn batch_id_for_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("batch")
        .to_string()
}

fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{IngestError, RowIssue};
    use crate::registration::{register, RegistrationForm};

    const ROSTER: &str = "first_name,last_name,national_id,class
Sara,Ahmadi,0499370899,701
Ali,Rezaei,0010010017,702
Bad,Row,1234567890,701
Reza,Karimi,0020020023,801
";

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        conn
    }

    fn register_id(conn: &Connection, id: &str) {
        let form = RegistrationForm {
            given_name: "Reg".to_string(),
            family_name: "Student".to_string(),
            national_id: id.to_string(),
            class: "701".to_string(),
        };
        register(conn, &form, Utc::now()).unwrap();
    }

    #[test]
    fn test_import_keeps_valid_rows() {
        let conn = test_conn();
        let service = TrackingService::default();

        let summary = service
            .import_bytes(&conn, ROSTER.as_bytes(), "roster.csv", "B1", SheetFormat::Csv)
            .unwrap();

        assert_eq!(summary.accepted, 3);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].row_number, 4);
        assert_eq!(summary.errors[0].issue, RowIssue::InvalidIdentity);
        assert_eq!(summary.batch.content_hash.len(), 64);
        assert_eq!(db::get_expected_for_batch(&conn, "B1").unwrap().len(), 3);
    }

    #[test]
    fn test_import_without_valid_rows_keeps_previous_batch() {
        let conn = test_conn();
        let service = TrackingService::default();

        service
            .import_bytes(&conn, ROSTER.as_bytes(), "roster.csv", "B1", SheetFormat::Csv)
            .unwrap();

        let bad = "national_id,class\n123,701\n";
        let err = service
            .import_bytes(&conn, bad.as_bytes(), "bad.csv", "B1", SheetFormat::Csv)
            .unwrap_err();

        assert!(matches!(
            err,
            TrackerError::Ingest(IngestError::NoValidRecords { .. })
        ));
        assert_eq!(db::get_expected_for_batch(&conn, "B1").unwrap().len(), 3);
    }

    #[test]
    fn test_empty_batch_id_rejected() {
        let conn = test_conn();
        let err = TrackingService::default()
            .import_bytes(&conn, ROSTER.as_bytes(), "roster.csv", "  ", SheetFormat::Csv)
            .unwrap_err();
        assert!(matches!(err, TrackerError::EmptyBatchId));
    }

    #[test]
    fn test_reconcile_batch_end_to_end() {
        let conn = test_conn();
        let service = TrackingService::default();

        register_id(&conn, "0010010017");
        service
            .import_bytes(&conn, ROSTER.as_bytes(), "roster.csv", "B1", SheetFormat::Csv)
            .unwrap();

        let report = service.reconcile_batch(&conn, "B1").unwrap();

        assert_eq!(report.expected_count, 3);
        assert_eq!(report.registered_count, 1);
        assert_eq!(report.unregistered_count, 2);
        assert_eq!(report.changed_count, 1);

        let unregistered: Vec<String> = service
            .unregistered_for_batch(&conn, "B1")
            .unwrap()
            .iter()
            .map(|s| s.national_id.to_string())
            .collect();
        assert_eq!(unregistered, vec!["0499370899", "0020020023"]);

        // A later registration is picked up on the next run
        register_id(&conn, "0020020023");
        let second = service.reconcile_batch(&conn, "B1").unwrap();
        assert_eq!(second.unregistered_count, 1);
        assert_eq!(second.changed_count, 1);

        // Nothing changed since: re-running is a no-op
        let third = service.reconcile_batch(&conn, "B1").unwrap();
        assert_eq!(third.outcome.updates, second.outcome.updates);
        assert_eq!(third.changed_count, 0);

        let events = db::get_events_for_entity(&conn, "batch", "B1").unwrap();
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn test_reupload_resets_flags() {
        let conn = test_conn();
        let service = TrackingService::default();

        register_id(&conn, "0499370899");
        service
            .import_bytes(&conn, ROSTER.as_bytes(), "roster.csv", "B1", SheetFormat::Csv)
            .unwrap();
        service.reconcile_batch(&conn, "B1").unwrap();

        service
            .import_bytes(&conn, ROSTER.as_bytes(), "roster.csv", "B1", SheetFormat::Csv)
            .unwrap();

        assert_eq!(service.unregistered_for_batch(&conn, "B1").unwrap().len(), 3);
        assert!(db::get_batch(&conn, "B1").unwrap().unwrap().reconciled_at.is_none());
    }

    #[test]
    fn test_unknown_batch() {
        let conn = test_conn();
        let service = TrackingService::default();

        assert!(matches!(
            service.reconcile_batch(&conn, "nope"),
            Err(TrackerError::UnknownBatch(_))
        ));
        assert!(matches!(
            service.unregistered_for_batch(&conn, "nope"),
            Err(TrackerError::UnknownBatch(_))
        ));
    }

    #[test]
    fn test_import_file_uses_extension_and_stem() {
        let conn = test_conn();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grade7.tsv");
        fs::write(&path, "نام\tنام خانوادگی\tکد ملی\tکلاس\nزهرا\tمحمدی\t۰۴۹۹۳۷۰۸۹۹\t۷۰۱\n").unwrap();

        let batch_id = batch_id_for_path(&path);
        let summary = TrackingService::default()
            .import_file(&conn, &path, &batch_id)
            .unwrap();

        assert_eq!(batch_id, "grade7");
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.batch.source_file, "grade7.tsv");
    }

    #[test]
    fn test_unreadable_sheet() {
        let conn = test_conn();
        let service = TrackingService::default();

        let err = service
            .import_file(&conn, Path::new("roster.xlsx"), "B1")
            .unwrap_err();
        assert!(matches!(err, TrackerError::Sheet(_)));

        let err = service
            .import_bytes(&conn, &[0xff, 0xfe, 0x00], "junk.csv", "B1", SheetFormat::Csv)
            .unwrap_err();
        assert!(matches!(err, TrackerError::Sheet(_)));
    }
}
