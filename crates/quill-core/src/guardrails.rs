//! Confirmation guardrails for destructive document operations
//!
//! Deleting a document or cutting content out of one is never done on the model's say
//! so alone. The operation is parked in a single-slot [`ConfirmationGate`] and the
//! user's next message decides whether it runs.

use crate::core_types::PendingOperation;
use crate::errors::QuillError;

pub const DEFAULT_AFFIRMATIONS: [&str; 2] = ["yes", "confirm"];

// ============================================================================
// CONFIRMATION TYPES
// ============================================================================

/// How a user reply to a confirmation prompt was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationResponse {
    Yes,
    No,
}

/// Classifies replies as affirmative when they contain one of the keywords
/// (case-insensitive) or are exactly `y`.
#[derive(Debug, Clone)]
pub struct AffirmationClassifier {
    keywords: Vec<String>,
}

impl AffirmationClassifier {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.into().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn classify(&self, reply: &str) -> ConfirmationResponse {
        let reply = reply.trim().to_lowercase();
        if reply == "y" || self.keywords.iter().any(|k| reply.contains(k.as_str())) {
            ConfirmationResponse::Yes
        } else {
            ConfirmationResponse::No
        }
    }
}

impl Default for AffirmationClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_AFFIRMATIONS)
    }
}

// ============================================================================
// GATE
// ============================================================================

/// What [`ConfirmationGate::resolve`] decided about the parked operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Run the operation.
    Confirmed(PendingOperation),
    /// Drop it; the message is the reply shown to the user.
    Cancelled { operation: PendingOperation, message: String },
}

#[derive(Debug, Default)]
pub struct ConfirmationGate {
    slot: Option<PendingOperation>,
    classifier: AffirmationClassifier,
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classifier(classifier: AffirmationClassifier) -> Self {
        Self {
            slot: None,
            classifier,
        }
    }

    pub fn is_awaiting(&self) -> bool {
        self.slot.is_some()
    }

    pub fn pending(&self) -> Option<&PendingOperation> {
        self.slot.as_ref()
    }

    /// Parks an operation until the user answers. Only one may wait at a time.
    pub fn stage(&mut self, operation: PendingOperation) -> Result<(), QuillError> {
        if let Some(existing) = &self.slot {
            return Err(QuillError::ConfirmationPending(format!(
                "{} operation is awaiting confirmation",
                existing.display_name()
            )));
        }
        log::info!("Awaiting confirmation for {}", operation.display_name());
        self.slot = Some(operation);
        Ok(())
    }

    /// Consumes the parked operation using the user's reply. `None` when idle.
    pub fn resolve(&mut self, reply: &str) -> Option<GateDecision> {
        let operation = self.slot.take()?;
        match self.classifier.classify(reply) {
            ConfirmationResponse::Yes => {
                log::info!("{} operation confirmed", operation.display_name());
                Some(GateDecision::Confirmed(operation))
            }
            ConfirmationResponse::No => {
                let message = format!("{} operation cancelled.", operation.display_name());
                log::info!("{}", message);
                Some(GateDecision::Cancelled { operation, message })
            }
        }
    }

    /// Drops whatever is parked without running it.
    pub fn clear(&mut self) -> Option<PendingOperation> {
        self.slot.take()
    }
}

/// Question appended to the model's reply when an operation is parked.
pub fn confirmation_prompt(reply: &str, operation: &PendingOperation) -> String {
    let question = match operation {
        PendingOperation::Delete { target } => format!("delete {}", target),
        PendingOperation::RemoveContent { target, .. } => {
            format!("remove content from {}", target)
        }
        PendingOperation::Write { filename, .. } => format!(
            "add this content to {}",
            filename.as_deref().unwrap_or("the active file")
        ),
        PendingOperation::Create { filename, .. } => format!("create {}", filename),
    };
    let reply = reply.trim();
    if reply.is_empty() {
        format!("Would you like me to {}?", question)
    } else {
        format!("{}\n\nWould you like me to {}?", reply, question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delete_op() -> PendingOperation {
        PendingOperation::Delete {
            target: "old.md".to_string(),
        }
    }

    #[test]
    fn test_classifier_defaults() {
        let classifier = AffirmationClassifier::default();
        assert_eq!(classifier.classify("yes"), ConfirmationResponse::Yes);
        assert_eq!(classifier.classify("Yes please"), ConfirmationResponse::Yes);
        assert_eq!(classifier.classify("I CONFIRM"), ConfirmationResponse::Yes);
        assert_eq!(classifier.classify("y"), ConfirmationResponse::Yes);
        assert_eq!(classifier.classify(" Y "), ConfirmationResponse::Yes);
        assert_eq!(classifier.classify("no"), ConfirmationResponse::No);
        assert_eq!(classifier.classify("yeah"), ConfirmationResponse::No);
        assert_eq!(classifier.classify(""), ConfirmationResponse::No);
    }

    #[test]
    fn test_custom_keywords() {
        let classifier = AffirmationClassifier::new(["do it"]);
        assert_eq!(classifier.classify("ok, do it"), ConfirmationResponse::Yes);
        assert_eq!(classifier.classify("yes"), ConfirmationResponse::No);
    }

    #[test]
    fn test_single_slot() {
        let mut gate = ConfirmationGate::new();
        gate.stage(delete_op()).unwrap();
        let err = gate.stage(delete_op()).unwrap_err();
        assert!(matches!(err, QuillError::ConfirmationPending(_)));
        assert!(gate.is_awaiting());
    }

    #[test]
    fn test_yes_confirms_and_returns_to_idle() {
        let mut gate = ConfirmationGate::new();
        gate.stage(delete_op()).unwrap();
        assert_eq!(
            gate.resolve("yes"),
            Some(GateDecision::Confirmed(delete_op()))
        );
        assert!(!gate.is_awaiting());
        assert_eq!(gate.resolve("yes"), None);
    }

    #[test]
    fn test_other_reply_cancels() {
        let mut gate = ConfirmationGate::new();
        gate.stage(delete_op()).unwrap();
        match gate.resolve("actually, keep it") {
            Some(GateDecision::Cancelled { message, .. }) => {
                assert_eq!(message, "Delete operation cancelled.")
            }
            other => panic!("unexpected decision: {:?}", other),
        }
        assert!(!gate.is_awaiting());
    }

    #[test]
    fn test_confirmation_prompt() {
        assert_eq!(
            confirmation_prompt("I can remove that file.", &delete_op()),
            "I can remove that file.\n\nWould you like me to delete old.md?"
        );
        let op = PendingOperation::RemoveContent {
            target: "n.md".to_string(),
            pattern: Some("x".to_string()),
            start_line: None,
            end_line: None,
        };
        assert_eq!(
            confirmation_prompt("", &op),
            "Would you like me to remove content from n.md?"
        );
    }
}
