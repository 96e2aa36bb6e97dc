// 🎓 Student records - registered students, expected students, upload batches

use crate::identity::IdentityNumber;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// CLASS LABEL (closed set)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClassLabel {
    #[serde(rename = "701")]
    C701,
    #[serde(rename = "702")]
    C702,
    #[serde(rename = "703")]
    C703,
    #[serde(rename = "704")]
    C704,
    #[serde(rename = "801")]
    C801,
    #[serde(rename = "802")]
    C802,
    #[serde(rename = "803")]
    C803,
    #[serde(rename = "901")]
    C901,
    #[serde(rename = "902")]
    C902,
    #[serde(rename = "903")]
    C903,
}

impl ClassLabel {
    pub const ALL: [ClassLabel; 10] = [
        ClassLabel::C701,
        ClassLabel::C702,
        ClassLabel::C703,
        ClassLabel::C704,
        ClassLabel::C801,
        ClassLabel::C802,
        ClassLabel::C803,
        ClassLabel::C901,
        ClassLabel::C902,
        ClassLabel::C903,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            ClassLabel::C701 => "701",
            ClassLabel::C702 => "702",
            ClassLabel::C703 => "703",
            ClassLabel::C704 => "704",
            ClassLabel::C801 => "801",
            ClassLabel::C802 => "802",
            ClassLabel::C803 => "803",
            ClassLabel::C901 => "901",
            ClassLabel::C902 => "902",
            ClassLabel::C903 => "903",
        }
    }

    /// Grade (7, 8 or 9) the class belongs to
    pub fn grade(&self) -> u8 {
        match self {
            ClassLabel::C701 | ClassLabel::C702 | ClassLabel::C703 | ClassLabel::C704 => 7,
            ClassLabel::C801 | ClassLabel::C802 | ClassLabel::C803 => 8,
            ClassLabel::C901 | ClassLabel::C902 | ClassLabel::C903 => 9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown class label: {0:?}")]
pub struct UnknownClass(pub String);

impl FromStr for ClassLabel {
    type Err = UnknownClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        ClassLabel::ALL
            .iter()
            .copied()
            .find(|c| c.code() == trimmed)
            .ok_or_else(|| UnknownClass(trimmed.to_string()))
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ============================================================================
// REGISTERED STUDENT
// ============================================================================

/// A student who submitted the registration form.
/// Read-only input to reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredStudent {
    pub national_id: IdentityNumber,
    pub given_name: String,
    pub family_name: String,
    pub class: ClassLabel,
    pub created_at: DateTime<Utc>,
}

impl RegisteredStudent {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
    }
}

// ============================================================================
// EXPECTED STUDENT
// ============================================================================

/// A student listed in an uploaded roster.
///
/// `registered` is the only field reconciliation changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedStudent {
    pub national_id: IdentityNumber,
    pub given_name: String,
    pub family_name: String,
    pub class: ClassLabel,
    #[serde(default)]
    pub registered: bool,
    pub batch_id: String,
    /// Spreadsheet line (header = 1)
    pub row_number: usize,
}

impl ExpectedStudent {
    pub fn from_fields(fields: StudentFields, batch_id: &str, row_number: usize) -> Self {
        ExpectedStudent {
            national_id: fields.national_id,
            given_name: fields.given_name,
            family_name: fields.family_name,
            class: fields.class,
            registered: false,
            batch_id: batch_id.to_string(),
            row_number,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
    }
}

/// The four logical fields shared by registration and roster rows,
/// normalized and validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentFields {
    pub given_name: String,
    pub family_name: String,
    pub national_id: IdentityNumber,
    pub class: ClassLabel,
}

// ============================================================================
// UPLOAD BATCH
// ============================================================================

/// Metadata for one roster ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadBatch {
    pub batch_id: String,
    pub source_file: String,
    pub uploaded_at: DateTime<Utc>,
    pub accepted_rows: usize,
    pub rejected_rows: usize,
    /// SHA-256 of the uploaded bytes
    pub content_hash: String,
    pub reconciled_at: Option<DateTime<Utc>>,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_label_closed_set() {
        assert_eq!(ClassLabel::ALL.len(), 10);
        for class in ClassLabel::ALL {
            assert_eq!(class.code().parse::<ClassLabel>().unwrap(), class);
        }
        assert!("705".parse::<ClassLabel>().is_err());
        assert!("".parse::<ClassLabel>().is_err());
        assert!("7O1".parse::<ClassLabel>().is_err());
    }

    #[test]
    fn test_class_label_trims_input() {
        assert_eq!(" 803 ".parse::<ClassLabel>().unwrap(), ClassLabel::C803);
    }

    #[test]
    fn test_class_grade() {
        assert_eq!(ClassLabel::C704.grade(), 7);
        assert_eq!(ClassLabel::C802.grade(), 8);
        assert_eq!(ClassLabel::C903.grade(), 9);
    }

    #[test]
    fn test_class_label_serializes_as_code() {
        let json = serde_json::to_string(&ClassLabel::C901).unwrap();
        assert_eq!(json, "\"901\"");
        let parsed: ClassLabel = serde_json::from_str("\"702\"").unwrap();
        assert_eq!(parsed, ClassLabel::C702);
    }

    #[test]
    fn test_expected_from_fields_defaults_unregistered() {
        let fields = StudentFields {
            given_name: "Sara".to_string(),
            family_name: "Ahmadi".to_string(),
            national_id: IdentityNumber::from_digits("0499370899"),
            class: ClassLabel::C701,
        };

        let expected = ExpectedStudent::from_fields(fields, "B1", 2);

        assert!(!expected.registered);
        assert_eq!(expected.batch_id, "B1");
        assert_eq!(expected.row_number, 2);
        assert_eq!(expected.full_name(), "Sara Ahmadi");
    }
}
