// 📝 Registration - validate and store a submitted registration form

use crate::db::{self, Event};
use crate::extract::{collapse_whitespace, fold_digits, normalize_identity};
use crate::identity::IdentityNumber;
use crate::student::{ClassLabel, RegisteredStudent};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Registration form as submitted by a student or parent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationForm {
    pub given_name: String,
    pub family_name: String,
    pub national_id: String,
    pub class: String,
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error(transparent)]
    InvalidIdentity(#[from] crate::identity::IdentityError),

    #[error(transparent)]
    InvalidClass(#[from] crate::student::UnknownClass),

    #[error("national id {0} is already registered")]
    AlreadyRegistered(IdentityNumber),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl RegistrationForm {
    /// Normalize and validate the form into a student record.
    ///
    /// Separators and Persian digits in the national id are accepted; the
    /// normalized digits must pass the checksum.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<RegisteredStudent, RegistrationError> {
        let given_name = collapse_whitespace(&self.given_name);
        if given_name.is_empty() {
            return Err(RegistrationError::MissingField("given_name"));
        }

        let family_name = collapse_whitespace(&self.family_name);
        if family_name.is_empty() {
            return Err(RegistrationError::MissingField("family_name"));
        }

        if self.national_id.trim().is_empty() {
            return Err(RegistrationError::MissingField("national_id"));
        }
        let national_id = IdentityNumber::parse(&normalize_identity(&self.national_id))?;

        if self.class.trim().is_empty() {
            return Err(RegistrationError::MissingField("class"));
        }
        let class = fold_digits(&self.class).parse::<ClassLabel>()?;

        Ok(RegisteredStudent {
            national_id,
            given_name,
            family_name,
            class,
            created_at: now,
        })
    }
}

/// Validate and persist a registration.
pub fn register(
    conn: &Connection,
    form: &RegistrationForm,
    now: DateTime<Utc>,
) -> Result<RegisteredStudent, RegistrationError> {
    let student = form.validate(now)?;

    if !db::insert_student(conn, &student)? {
        return Err(RegistrationError::AlreadyRegistered(student.national_id));
    }

    let event = Event::new(
        "student_registered",
        "student",
        student.national_id.as_str(),
        serde_json::json!({ "class": student.class.code() }),
        "registration_form",
    );
    db::insert_event(conn, &event)?;

    info!(class = %student.class, "student registered");
    Ok(student)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(id: &str, class: &str) -> RegistrationForm {
        RegistrationForm {
            given_name: " Sara ".to_string(),
            family_name: "Ahmadi  Far".to_string(),
            national_id: id.to_string(),
            class: class.to_string(),
        }
    }

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_validate_normalizes_fields() {
        let student = form("۰۴۹۹-۳۷۰-۸۹۹", "۷۰۱").validate(Utc::now()).unwrap();

        assert_eq!(student.given_name, "Sara");
        assert_eq!(student.family_name, "Ahmadi Far");
        assert_eq!(student.national_id.as_str(), "0499370899");
        assert_eq!(student.class, ClassLabel::C701);
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let now = Utc::now();

        let mut missing = form("0499370899", "701");
        missing.given_name = "   ".to_string();
        assert!(matches!(
            missing.validate(now),
            Err(RegistrationError::MissingField("given_name"))
        ));

        assert!(matches!(
            form("", "701").validate(now),
            Err(RegistrationError::MissingField("national_id"))
        ));
        assert!(matches!(
            form("0499370898", "701").validate(now),
            Err(RegistrationError::InvalidIdentity(_))
        ));
        assert!(matches!(
            form("0499370899", "705").validate(now),
            Err(RegistrationError::InvalidClass(_))
        ));
    }

    #[test]
    fn test_register_once_per_identity() {
        let conn = test_conn();
        let now = Utc::now();

        register(&conn, &form("0499370899", "701"), now).unwrap();
        let err = register(&conn, &form("0499370899", "802"), now).unwrap_err();

        assert!(matches!(err, RegistrationError::AlreadyRegistered(_)));
        assert_eq!(db::count_students(&conn).unwrap(), 1);
        assert_eq!(
            db::get_events_for_entity(&conn, "student", "0499370899")
                .unwrap()
                .len(),
            1
        );
    }
}
