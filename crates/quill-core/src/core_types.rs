//! Core type definitions shared by the chat pipeline
//!
//! Sessions and messages are the persisted conversation state. Pending changes are the
//! ledger records for proposed document mutations, and intents/operations are the
//! transient values that flow from the parser into the executor and confirmation gate.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_SESSION_TITLE: &str = "New Chat";
const TITLE_MAX_CHARS: usize = 20;

/// Generates a globally unique id for messages, sessions and changes.
pub fn generate_id() -> String {
    format!("id_{}", Uuid::new_v4().simple())
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: generate_id(),
            title: DEFAULT_SESSION_TITLE.to_string(),
        }
    }

    /// Title derived from the first user message: 20 characters plus an ellipsis.
    pub fn title_from_message(message: &str) -> String {
        if message.chars().count() > TITLE_MAX_CHARS {
            let head: String = message.chars().take(TITLE_MAX_CHARS).collect();
            format!("{}...", head)
        } else {
            message.to_string()
        }
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_id(generate_id(), Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_id(generate_id(), Role::Assistant, content)
    }

    pub fn with_id(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Pending,
    Accepted,
    Rejected,
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeStatus::Pending => "pending",
            ChangeStatus::Accepted => "accepted",
            ChangeStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// How a pending change was staged.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Content written into an existing document inside an annotated region.
    Insert,
    /// A document that does not exist yet; nothing is written until accepted.
    Create,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PendingChange {
    pub id: String,
    pub kind: ChangeKind,
    /// Normalized document path the change applies to.
    pub target_id: String,
    /// File name shown to the user.
    pub target_name: String,
    pub content: String,
    pub status: ChangeStatus,
    pub expanded: bool,
    pub message_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Write,
    Create,
    Delete,
    RemoveContent,
    None,
}

impl ActionKind {
    pub fn from_marker(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "write" => Some(ActionKind::Write),
            "create" => Some(ActionKind::Create),
            "delete" => Some(ActionKind::Delete),
            "remove_content" => Some(ActionKind::RemoveContent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Write => "write",
            ActionKind::Create => "create",
            ActionKind::Delete => "delete",
            ActionKind::RemoveContent => "remove_content",
            ActionKind::None => "none",
        }
    }
}

/// Structured result of parsing an action marker out of a model reply.
///
/// Line numbers are 0-indexed here; the wire format is 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionIntent {
    pub kind: ActionKind,
    pub filename: Option<String>,
    pub content: Option<String>,
    pub pattern: Option<String>,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
}

impl ActionIntent {
    pub fn none() -> Self {
        Self {
            kind: ActionKind::None,
            filename: None,
            content: None,
            pattern: None,
            start_line: None,
            end_line: None,
        }
    }

    pub fn is_none(&self) -> bool {
        self.kind == ActionKind::None
    }
}

/// A confirmable action parked in the confirmation gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOperation {
    Write {
        filename: Option<String>,
        content: String,
    },
    Create {
        filename: String,
        content: String,
    },
    Delete {
        target: String,
    },
    RemoveContent {
        target: String,
        pattern: Option<String>,
        start_line: Option<usize>,
        end_line: Option<usize>,
    },
}

impl PendingOperation {
    pub fn kind(&self) -> ActionKind {
        match self {
            PendingOperation::Write { .. } => ActionKind::Write,
            PendingOperation::Create { .. } => ActionKind::Create,
            PendingOperation::Delete { .. } => ActionKind::Delete,
            PendingOperation::RemoveContent { .. } => ActionKind::RemoveContent,
        }
    }

    /// Capitalized operation name used in cancellation replies ("Delete", "Remove_content").
    pub fn display_name(&self) -> String {
        let name = self.kind().as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}
