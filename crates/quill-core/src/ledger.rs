//! Pending-change ledger
//!
//! Keeps every change proposed in the current session in insertion order. A change
//! starts `pending` and moves once to `accepted` or `rejected`; the ledger refuses any
//! other transition.

use crate::core_types::{ChangeStatus, PendingChange};
use crate::errors::QuillError;

#[derive(Debug, Default, Clone)]
pub struct PendingChangeLedger {
    changes: Vec<PendingChange>,
}

/// Outcome of an accept-all or reject-all pass.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkReport {
    pub attempted: usize,
    pub succeeded: usize,
    /// Change id and error for every item left pending.
    pub failures: Vec<(String, QuillError)>,
}

impl BulkReport {
    pub fn summary(&self, verb: &str) -> String {
        format!(
            "{} {} of {} pending changes.",
            verb, self.succeeded, self.attempted
        )
    }
}

impl PendingChangeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, change: PendingChange) -> Result<(), QuillError> {
        if self.changes.iter().any(|c| c.id == change.id) {
            return Err(QuillError::ValidationError(format!(
                "Change {} is already recorded",
                change.id
            )));
        }
        log::debug!(
            "Recorded pending change {} for {}",
            change.id,
            change.target_id
        );
        self.changes.push(change);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&PendingChange> {
        self.changes.iter().find(|c| c.id == id)
    }

    /// The change with `id`, provided it is still pending.
    pub fn get_pending(&self, id: &str) -> Result<&PendingChange, QuillError> {
        let change = self
            .get(id)
            .ok_or_else(|| QuillError::ChangeNotFound(id.to_string()))?;
        if change.status != ChangeStatus::Pending {
            return Err(QuillError::ChangeAlreadyResolved {
                id: id.to_string(),
                status: change.status,
            });
        }
        Ok(change)
    }

    pub fn all(&self) -> &[PendingChange] {
        &self.changes
    }

    pub fn pending(&self) -> Vec<&PendingChange> {
        self.changes
            .iter()
            .filter(|c| c.status == ChangeStatus::Pending)
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| c.status == ChangeStatus::Pending)
            .count()
    }

    /// Moves a pending change to a terminal status.
    pub fn mark(&mut self, id: &str, status: ChangeStatus) -> Result<(), QuillError> {
        if status == ChangeStatus::Pending {
            return Err(QuillError::ValidationError(
                "A change cannot be moved back to pending".to_string(),
            ));
        }
        let change = self
            .changes
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| QuillError::ChangeNotFound(id.to_string()))?;
        if change.status != ChangeStatus::Pending {
            return Err(QuillError::ChangeAlreadyResolved {
                id: id.to_string(),
                status: change.status,
            });
        }
        change.status = status;
        log::info!("Change {} {}", id, status);
        Ok(())
    }

    pub fn for_message(&self, message_id: &str) -> Vec<&PendingChange> {
        self.changes
            .iter()
            .filter(|c| c.message_id == message_id)
            .collect()
    }

    /// Flips the presentation-only expanded flag and returns the new value.
    pub fn toggle_expanded(&mut self, id: &str) -> Result<bool, QuillError> {
        let change = self
            .changes
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| QuillError::ChangeNotFound(id.to_string()))?;
        change.expanded = !change.expanded;
        Ok(change.expanded)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::ChangeKind;

    fn change(id: &str, message_id: &str) -> PendingChange {
        PendingChange {
            id: id.to_string(),
            kind: ChangeKind::Insert,
            target_id: "a.md".to_string(),
            target_name: "a.md".to_string(),
            content: "x".to_string(),
            status: ChangeStatus::Pending,
            expanded: false,
            message_id: message_id.to_string(),
        }
    }

    #[test]
    fn test_transitions_are_terminal() {
        let mut ledger = PendingChangeLedger::new();
        ledger.record(change("c1", "m1")).unwrap();
        ledger.mark("c1", ChangeStatus::Accepted).unwrap();

        let err = ledger.mark("c1", ChangeStatus::Rejected).unwrap_err();
        assert_eq!(
            err,
            QuillError::ChangeAlreadyResolved {
                id: "c1".to_string(),
                status: ChangeStatus::Accepted
            }
        );
        assert!(ledger.mark("c1", ChangeStatus::Accepted).is_err());
        assert_eq!(ledger.get("c1").unwrap().status, ChangeStatus::Accepted);
    }

    #[test]
    fn test_cannot_mark_pending() {
        let mut ledger = PendingChangeLedger::new();
        ledger.record(change("c1", "m1")).unwrap();
        assert!(ledger.mark("c1", ChangeStatus::Pending).is_err());
    }

    #[test]
    fn test_unknown_change() {
        let mut ledger = PendingChangeLedger::new();
        assert_eq!(
            ledger.mark("nope", ChangeStatus::Accepted),
            Err(QuillError::ChangeNotFound("nope".to_string()))
        );
        assert!(ledger.get_pending("nope").is_err());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut ledger = PendingChangeLedger::new();
        ledger.record(change("c1", "m1")).unwrap();
        assert!(ledger.record(change("c1", "m2")).is_err());
        assert_eq!(ledger.all().len(), 1);
    }

    #[test]
    fn test_filters() {
        let mut ledger = PendingChangeLedger::new();
        ledger.record(change("c1", "m1")).unwrap();
        ledger.record(change("c2", "m1")).unwrap();
        ledger.record(change("c3", "m2")).unwrap();
        ledger.mark("c2", ChangeStatus::Rejected).unwrap();

        assert_eq!(ledger.pending_count(), 2);
        assert_eq!(ledger.for_message("m1").len(), 2);
        let ids: Vec<&str> = ledger.pending().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3"]);
    }

    #[test]
    fn test_toggle_expanded() {
        let mut ledger = PendingChangeLedger::new();
        ledger.record(change("c1", "m1")).unwrap();
        assert!(ledger.toggle_expanded("c1").unwrap());
        assert!(!ledger.toggle_expanded("c1").unwrap());
    }

    #[test]
    fn test_bulk_summary() {
        let report = BulkReport {
            attempted: 3,
            succeeded: 2,
            failures: vec![],
        };
        assert_eq!(report.summary("Accepted"), "Accepted 2 of 3 pending changes.");
    }
}
