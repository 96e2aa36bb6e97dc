// 🧹 Row extraction - normalize loosely-labelled roster rows
//
// Rosters arrive with inconsistent headers ("first_name", "Given Name",
// "نام", ...). Each logical field carries an ordered list of accepted
// header synonyms; the first synonym present with a non-blank value wins.

use crate::identity::{validate_identity, IdentityNumber};
use crate::student::{ClassLabel, ExpectedStudent, StudentFields};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

// ============================================================================
// LOGICAL FIELDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    GivenName,
    FamilyName,
    Identity,
    Class,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::GivenName,
        Field::FamilyName,
        Field::Identity,
        Field::Class,
    ];

    /// Accepted header names, highest priority first
    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            Field::GivenName => &["given_name", "first_name", "name", "نام"],
            Field::FamilyName => &["family_name", "last_name", "surname", "نام خانوادگی"],
            Field::Identity => &["national_id", "national_code", "identity_number", "کد ملی"],
            Field::Class => &["class", "class_label", "classroom", "کلاس"],
        }
    }

    /// Canonical header used on export
    pub fn canonical_header(&self) -> &'static str {
        self.synonyms()[0]
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_header())
    }
}

// ============================================================================
// RAW ROW
// ============================================================================

/// One spreadsheet row as `(header, value)` pairs in column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    /// Spreadsheet line (header = 1, first data row = 2)
    pub row_number: usize,
    pub cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn new(row_number: usize, cells: Vec<(String, String)>) -> Self {
        RawRow { row_number, cells }
    }

    /// Look up a logical field through its synonym list.
    pub fn get(&self, field: Field) -> Option<&str> {
        field.synonyms().iter().find_map(|synonym| {
            let wanted = normalize_header(synonym);
            self.cells
                .iter()
                .filter(|(header, _)| normalize_header(header) == wanted)
                .map(|(_, value)| value.as_str())
                .find(|value| !value.trim().is_empty())
        })
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.trim().is_empty())
    }
}

// ============================================================================
// NORMALIZATION HELPERS
// ============================================================================

/// Lowercase, treat `-`, `_` and ZWNJ as spaces, collapse whitespace.
pub fn normalize_header(header: &str) -> String {
    let spaced: String = header
        .chars()
        .map(|c| match c {
            '-' | '_' | '\u{200C}' => ' ',
            other => other,
        })
        .collect();
    collapse_whitespace(&spaced).to_lowercase()
}

/// Trim and collapse internal whitespace runs to a single space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fold Persian and Arabic-Indic digits to ASCII.
pub fn fold_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
            other => other,
        })
        .collect()
}

/// Fold localized digits, then drop every non-digit character.
pub fn normalize_identity(raw: &str) -> String {
    fold_digits(raw).chars().filter(|c| c.is_ascii_digit()).collect()
}

// ============================================================================
// ROW EXTRACTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum RowIssue {
    #[error("missing field: {0}")]
    MissingField(Field),

    #[error("invalid national identity number")]
    InvalidIdentity,

    #[error("invalid class label")]
    InvalidClass,

    #[error("identity number already appears earlier in this upload")]
    DuplicateIdentity,
}

pub type RowOutcome = Result<StudentFields, RowIssue>;

/// Extract and validate the four logical fields of one row.
pub fn extract_row(row: &RawRow) -> RowOutcome {
    let mut values = Vec::with_capacity(Field::ALL.len());
    for field in Field::ALL {
        match row.get(field) {
            Some(value) => values.push(value),
            None => return Err(RowIssue::MissingField(field)),
        }
    }

    let given_name = collapse_whitespace(values[0]);
    let family_name = collapse_whitespace(values[1]);

    let digits = normalize_identity(values[2]);
    if !validate_identity(&digits) {
        return Err(RowIssue::InvalidIdentity);
    }

    let class = collapse_whitespace(&fold_digits(values[3]))
        .parse::<ClassLabel>()
        .map_err(|_| RowIssue::InvalidClass)?;

    Ok(StudentFields {
        given_name,
        family_name,
        national_id: IdentityNumber::from_digits(&digits),
        class,
    })
}

// ============================================================================
// BATCH INGESTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row_number: usize,
    pub issue: RowIssue,
    /// Identity value as it appeared in the sheet, if any
    pub raw_identity: Option<String>,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.raw_identity {
            Some(raw) => write!(f, "row {} ({}): {}", self.row_number, raw, self.issue),
            None => write!(f, "row {}: {}", self.row_number, self.issue),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub batch_id: String,
    pub accepted: Vec<ExpectedStudent>,
    pub errors: Vec<RowError>,
    pub total_rows: usize,
}

impl IngestReport {
    pub fn summary(&self) -> String {
        format!(
            "Batch {}: {} rows, {} accepted, {} rejected",
            self.batch_id,
            self.total_rows,
            self.accepted.len(),
            self.errors.len()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("no valid records found ({} rows rejected)", .errors.len())]
    NoValidRecords { errors: Vec<RowError> },
}

/// Validate every row of a roster, keeping the good ones.
///
/// Blank rows are skipped silently. Rows that fail are reported, not fatal;
/// only a roster with zero valid rows is an error.
pub fn ingest_rows(rows: &[RawRow], batch_id: &str) -> Result<IngestReport, IngestError> {
    let mut accepted = Vec::new();
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    let mut total_rows = 0;

    for row in rows.iter().filter(|r| !r.is_blank()) {
        total_rows += 1;

        let outcome = extract_row(row).and_then(|fields| {
            if seen.insert(fields.national_id.clone()) {
                Ok(fields)
            } else {
                Err(RowIssue::DuplicateIdentity)
            }
        });

        match outcome {
            Ok(fields) => accepted.push(ExpectedStudent::from_fields(fields, batch_id, row.row_number)),
            Err(issue) => {
                debug!(row = row.row_number, %issue, "rejected roster row");
                errors.push(RowError {
                    row_number: row.row_number,
                    issue,
                    raw_identity: row.get(Field::Identity).map(|s| s.trim().to_string()),
                });
            }
        }
    }

    if accepted.is_empty() {
        return Err(IngestError::NoValidRecords { errors });
    }

    let report = IngestReport {
        batch_id: batch_id.to_string(),
        accepted,
        errors,
        total_rows,
    };
    info!("{}", report.summary());

    Ok(report)
}

// ============================================================================
// TESTS
// ============================================================================
