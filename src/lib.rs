// Student Tracker - Core Library
// Registration, roster uploads and reconciliation, shared by the CLI, the
// API server and tests

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod extract;
pub mod identity;
pub mod parser;
pub mod reconciliation;
pub mod registration;
pub mod student;
pub mod telemetry;
pub mod tracking;

// Re-export commonly used types
pub use auth::{AuthError, Authenticator, CredentialVerifier, Session, SqliteCredentials, create_admin};
pub use config::Config;
pub use db::{
    Event,
    setup_database, insert_student, get_all_students, get_student, count_students,
    replace_batch, get_expected_for_batch, get_unregistered_for_batch,
    get_batch, list_batches, apply_registration_updates,
    insert_event, get_events_for_entity,
};
pub use error::{TrackerError, TrackerResult};
pub use export::{export_unregistered, write_unregistered_csv};
pub use extract::{
    Field, RawRow, RowError, RowIssue, RowOutcome, IngestReport, IngestError,
    extract_row, ingest_rows, normalize_identity,
};
pub use identity::{IdentityError, IdentityNumber, check_digit, validate_identity};
pub use parser::{RosterParser, DelimitedParser, SheetFormat, detect_format, get_parser};
pub use reconciliation::{ReconciliationEngine, ReconciliationOutcome, ReconciliationReport};
pub use registration::{RegistrationError, RegistrationForm, register};
pub use student::{ClassLabel, ExpectedStudent, RegisteredStudent, StudentFields, UploadBatch};
pub use tracking::{ImportSummary, TrackingService, batch_id_for_path};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
