//! Chat sessions: persistence boundary and per-session state

pub mod store;

pub use store::{FileSessionStore, MemorySessionStore, SessionStore};

use crate::core_types::{ChatMessage, ChatSession};
use crate::guardrails::ConfirmationGate;
use crate::ledger::PendingChangeLedger;

/// Everything that belongs to the session currently shown to the user.
///
/// The ledger and gate never survive a session switch; messages are reloaded from the
/// store.
#[derive(Debug)]
pub struct SessionContext {
    pub session: ChatSession,
    pub messages: Vec<ChatMessage>,
    pub ledger: PendingChangeLedger,
    pub gate: ConfirmationGate,
    pub active_document: Option<String>,
}

impl SessionContext {
    pub fn new(session: ChatSession, gate: ConfirmationGate) -> Self {
        Self {
            session,
            messages: Vec::new(),
            ledger: PendingChangeLedger::new(),
            gate,
            active_document: None,
        }
    }

    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn is_first_user_message(&self) -> bool {
        !self
            .messages
            .iter()
            .any(|m| m.role == crate::core_types::Role::User)
    }
}
