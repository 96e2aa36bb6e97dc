// ⚖️ Reconciliation Engine - Which expected students never registered?
//
// Joins one upload batch of expected students against every registered
// student by national identity number:
//   registered_ids = { s.national_id | s in registered }
//   updates[e.id]  = e.id ∈ registered_ids        for every e in expected
//   unregistered   = [ e | e in expected, e.id ∉ registered_ids ]   (input order)
//
// Only the identity number is compared. Names and classes that differ
// between the roster and the registration are not reported.

use crate::identity::IdentityNumber;
use crate::student::{ExpectedStudent, RegisteredStudent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::info;

// ============================================================================
// RECONCILIATION OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationOutcome {
    /// Expected students with no matching registration, in input order
    pub unregistered: Vec<ExpectedStudent>,

    /// New registration flag for every expected student
    pub updates: BTreeMap<IdentityNumber, bool>,
}

impl ReconciliationOutcome {
    pub fn registered_count(&self) -> usize {
        self.updates.values().filter(|flag| **flag).count()
    }

    /// Identities whose stored flag differs from the new one.
    pub fn changed_flags(&self, expected: &[ExpectedStudent]) -> Vec<IdentityNumber> {
        expected
            .iter()
            .filter(|e| {
                self.updates
                    .get(&e.national_id)
                    .map_or(false, |flag| *flag != e.registered)
            })
            .map(|e| e.national_id.clone())
            .collect()
    }
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub batch_id: String,
    pub outcome: ReconciliationOutcome,
    pub expected_count: usize,
    pub registered_count: usize,
    pub unregistered_count: usize,
    /// Flags that differ from what was stored before this run
    pub changed_count: usize,
    pub reconciled_at: DateTime<Utc>,
}

impl ReconciliationReport {
    pub fn is_complete(&self) -> bool {
        self.unregistered_count == 0
    }

    /// Share of expected students who have registered (0.0 - 1.0)
    pub fn registration_rate(&self) -> f64 {
        if self.expected_count == 0 {
            return 1.0;
        }
        self.registered_count as f64 / self.expected_count as f64
    }

    pub fn summary(&self) -> String {
        format!(
            "Reconciliation for batch {}: {} expected, {} registered, {} unregistered ({:.1}% complete, {} flags changed)",
            self.batch_id,
            self.expected_count,
            self.registered_count,
            self.unregistered_count,
            self.registration_rate() * 100.0,
            self.changed_count
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct ReconciliationEngine;

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine
    }

    /// Partition expected students into registered / unregistered.
    ///
    /// Example:
    /// ```
    /// use student_tracker::ReconciliationEngine;
    ///
    /// let engine = ReconciliationEngine::new();
    /// let outcome = engine.reconcile(&[], &[]);
    /// assert!(outcome.unregistered.is_empty());
    /// assert!(outcome.updates.is_empty());
    /// ```
    pub fn reconcile(
        &self,
        expected: &[ExpectedStudent],
        registered: &[RegisteredStudent],
    ) -> ReconciliationOutcome {
        let registered_ids: HashSet<&IdentityNumber> =
            registered.iter().map(|s| &s.national_id).collect();

        let mut updates = BTreeMap::new();
        let mut unregistered = Vec::new();

        for student in expected {
            let is_registered = registered_ids.contains(&student.national_id);
            updates.insert(student.national_id.clone(), is_registered);

            if !is_registered {
                unregistered.push(student.clone());
            }
        }

        ReconciliationOutcome {
            unregistered,
            updates,
        }
    }

    /// Reconcile one batch and wrap the result with counts and a timestamp.
    pub fn report(
        &self,
        batch_id: &str,
        expected: &[ExpectedStudent],
        registered: &[RegisteredStudent],
    ) -> ReconciliationReport {
        let outcome = self.reconcile(expected, registered);
        let changed_count = outcome.changed_flags(expected).len();

        let report = ReconciliationReport {
            batch_id: batch_id.to_string(),
            expected_count: expected.len(),
            registered_count: outcome.registered_count(),
            unregistered_count: outcome.unregistered.len(),
            changed_count,
            outcome,
            reconciled_at: Utc::now(),
        };

        info!("{}", report.summary());
        report
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::student::ClassLabel;

    fn expected(id: &str, batch: &str, row: usize) -> ExpectedStudent {
        ExpectedStudent {
            national_id: IdentityNumber::from_digits(id),
            given_name: format!("Given {}", row),
            family_name: format!("Family {}", row),
            class: ClassLabel::C701,
            registered: false,
            batch_id: batch.to_string(),
            row_number: row,
        }
    }

    fn registered(id: &str, class: ClassLabel) -> RegisteredStudent {
        RegisteredStudent {
            national_id: IdentityNumber::from_digits(id),
            given_name: "Reg".to_string(),
            family_name: "Student".to_string(),
            class,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_end_to_end_scenario() {
        let engine = ReconciliationEngine::new();
        let reg = vec![registered("0010010011", ClassLabel::C701)];
        let exp = vec![expected("0010010011", "B1", 2), expected("0020020022", "B1", 3)];

        let outcome = engine.reconcile(&exp, &reg);

        assert_eq!(outcome.unregistered.len(), 1);
        assert_eq!(outcome.unregistered[0].national_id.as_str(), "0020020022");

        let mut wanted = BTreeMap::new();
        wanted.insert(IdentityNumber::from_digits("0010010011"), true);
        wanted.insert(IdentityNumber::from_digits("0020020022"), false);
        assert_eq!(outcome.updates, wanted);
    }

    #[test]
    fn test_empty_expected() {
        let engine = ReconciliationEngine::new();
        let reg = vec![registered("0010010011", ClassLabel::C801)];

        let outcome = engine.reconcile(&[], &reg);

        assert!(outcome.unregistered.is_empty());
        assert!(outcome.updates.is_empty());
    }

    #[test]
    fn test_empty_registered_marks_everyone_unregistered() {
        let engine = ReconciliationEngine::new();
        let exp = vec![
            expected("0010010017", "B1", 2),
            expected("0020020023", "B1", 3),
            expected("0499370899", "B1", 4),
        ];

        let outcome = engine.reconcile(&exp, &[]);

        assert_eq!(outcome.unregistered, exp);
        assert!(outcome.updates.values().all(|flag| !flag));
        assert_eq!(outcome.updates.len(), 3);
    }

    #[test]
    fn test_everyone_registered() {
        let engine = ReconciliationEngine::new();
        let exp = vec![expected("0010010017", "B1", 2), expected("0020020023", "B1", 3)];
        let reg = vec![
            registered("0020020023", ClassLabel::C902),
            registered("0010010017", ClassLabel::C701),
            registered("9876543210", ClassLabel::C803),
        ];

        let outcome = engine.reconcile(&exp, &reg);

        assert!(outcome.unregistered.is_empty());
        assert!(outcome.updates.values().all(|flag| *flag));
        assert_eq!(outcome.registered_count(), 2);
    }

    #[test]
    fn test_order_preserved() {
        let engine = ReconciliationEngine::new();
        let exp = vec![
            expected("0499370899", "B1", 2),
            expected("0010010017", "B1", 3),
            expected("9876543210", "B1", 4),
            expected("0020020023", "B1", 5),
        ];
        let reg = vec![registered("0010010017", ClassLabel::C701)];

        let outcome = engine.reconcile(&exp, &reg);

        let rows: Vec<usize> = outcome.unregistered.iter().map(|s| s.row_number).collect();
        assert_eq!(rows, vec![2, 4, 5]);
    }

    #[test]
    fn test_idempotent_updates() {
        let engine = ReconciliationEngine::new();
        let mut exp = vec![expected("0010010017", "B1", 2), expected("0020020023", "B1", 3)];
        let reg = vec![registered("0010010017", ClassLabel::C701)];

        let first = engine.reconcile(&exp, &reg);
        let second = engine.reconcile(&exp, &reg);
        assert_eq!(first.updates, second.updates);

        // Apply the updates, then nothing changes on the next run
        for student in exp.iter_mut() {
            student.registered = first.updates[&student.national_id];
        }
        let third = engine.reconcile(&exp, &reg);
        assert_eq!(third.updates, first.updates);
        assert!(third.changed_flags(&exp).is_empty());
    }

    #[test]
    fn test_name_and_class_mismatch_not_flagged() {
        let engine = ReconciliationEngine::new();
        let exp = vec![expected("0010010017", "B1", 2)];
        let reg = vec![registered("0010010017", ClassLabel::C903)];

        let outcome = engine.reconcile(&exp, &reg);

        assert!(outcome.unregistered.is_empty());
        assert_eq!(outcome.updates[&IdentityNumber::from_digits("0010010017")], true);
    }

    #[test]
    fn test_changed_flags_detects_deregistration() {
        let engine = ReconciliationEngine::new();
        let mut exp = vec![expected("0010010017", "B1", 2)];
        exp[0].registered = true;

        let outcome = engine.reconcile(&exp, &[]);

        assert_eq!(
            outcome.changed_flags(&exp),
            vec![IdentityNumber::from_digits("0010010017")]
        );
    }

    #[test]
    fn test_report_counts() {
        let engine = ReconciliationEngine::new();
        let exp = vec![
            expected("0010010017", "B1", 2),
            expected("0020020023", "B1", 3),
            expected("0499370899", "B1", 4),
            expected("9876543210", "B1", 5),
        ];
        let reg = vec![registered("0010010017", ClassLabel::C701)];

        let report = engine.report("B1", &exp, &reg);

        assert_eq!(report.expected_count, 4);
        assert_eq!(report.registered_count, 1);
        assert_eq!(report.unregistered_count, 3);
        assert_eq!(report.changed_count, 1);
        assert!(!report.is_complete());
        assert!((report.registration_rate() - 0.25).abs() < f64::EPSILON);
        assert!(report.summary().contains("batch B1"));
    }

    #[test]
    fn test_report_empty_batch_is_complete() {
        let report = ReconciliationEngine::new().report("B0", &[], &[]);
        assert!(report.is_complete());
        assert_eq!(report.registration_rate(), 1.0);
    }
}
