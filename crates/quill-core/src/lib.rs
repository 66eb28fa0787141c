//! Core of an LLM chat that edits markdown documents.
//!
//! A model reply may open with an action marker (`[ACTION:write filename:notes.md]`).
//! This crate turns such replies into reversible document mutations and tracks them
//! until the user accepts or rejects them.
//!
//! # Architecture Overview
//!
//! - **Streaming**: [`llm::StreamAccumulator`] folds a model's chunk stream into the
//!   final reply and maps transport failures onto typed outcomes
//! - **Parsing**: [`actions::MarkerParser`] extracts the first action marker
//! - **Resolution**: [`documents::FuzzyResolver`] maps loose names onto documents
//! - **Execution**: [`actions::MutationExecutor`] inserts annotated regions, removes
//!   content and accepts or rejects staged changes
//! - **Approval**: [`ledger::PendingChangeLedger`] and [`guardrails::ConfirmationGate`]
//! - **Orchestration**: [`chat::ChatPipeline`] runs whole turns over a session
//! - **Configuration**: YAML with environment-resolved API keys

pub mod actions;
pub mod chat;
pub mod config;
pub mod core_types;
pub mod documents;
pub mod errors;
pub mod guardrails;
pub mod ledger;
pub mod llm;
pub mod prompt;
pub mod session;

pub use chat::ChatPipeline;
pub use config::*;
pub use core_types::{ChangeStatus, ChatMessage, ChatSession, PendingChange};
pub use documents::{DocumentAccessor, MemoryDocuments, VaultDocuments};
pub use errors::QuillError;
pub use ledger::BulkReport;
pub use llm::{ModelAdapter, StreamOutcome};
pub use session::{FileSessionStore, MemorySessionStore, SessionStore};
