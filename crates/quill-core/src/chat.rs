//! Chat pipeline
//!
//! Drives one conversation turn end to end: the user message is appended, the model
//! reply is accumulated, the first action marker is parsed out of the finished text and
//! handed to the executor or parked in the confirmation gate, and the assistant reply is
//! appended and persisted. Nothing here runs on partial text.

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::actions::{validate_removal, IntentParser, MarkerParser, MutationExecutor};
use crate::config::{ActionsConfig, LlmConfig, QuillConfig};
use crate::core_types::{
    generate_id, ActionIntent, ActionKind, ChangeStatus, ChatMessage, ChatSession,
    PendingChange, PendingOperation, Role,
};
use crate::documents::{DocumentAccessor, FuzzyResolver};
use crate::errors::QuillError;
use crate::guardrails::{confirmation_prompt, AffirmationClassifier, ConfirmationGate, GateDecision};
use crate::ledger::{BulkReport, PendingChangeLedger};
use crate::llm::providers::create_adapter;
use crate::llm::{ModelAdapter, ModelSettings, StreamAccumulator, StreamOutcome};
use crate::prompt::{build_prompt, ActiveDocument};
use crate::session::{SessionContext, SessionStore};

pub struct ChatPipeline {
    adapter: Arc<dyn ModelAdapter>,
    settings: ModelSettings,
    executor: MutationExecutor,
    store: Arc<dyn SessionStore>,
    parser: Box<dyn IntentParser>,
    accumulator: StreamAccumulator,
    actions: ActionsConfig,
    sessions: Vec<ChatSession>,
    context: SessionContext,
}

impl ChatPipeline {
    /// Loads the stored sessions, creating one when there are none, and selects the first.
    pub async fn open(
        adapter: Arc<dyn ModelAdapter>,
        documents: Arc<dyn DocumentAccessor>,
        store: Arc<dyn SessionStore>,
        config: &QuillConfig,
    ) -> Result<Self, QuillError> {
        let resolver = FuzzyResolver::new()
            .with_extension(config.vault.extension.clone())
            .with_threshold(config.actions.match_threshold);
        let executor = MutationExecutor::new(documents)
            .with_resolver(resolver)
            .with_default_new_file(config.actions.default_new_file.clone());

        let mut sessions = store.list_sessions().await?;
        if sessions.is_empty() {
            sessions.push(ChatSession::new());
            store.save_sessions(&sessions).await?;
            log::info!("Created initial chat session {}", sessions[0].id);
        }

        let first = sessions[0].clone();
        let messages = store.load_messages(&first.id).await?.unwrap_or_default();
        let gate = new_gate(&config.actions);

        Ok(Self {
            adapter,
            settings: config.llm.parameters.to_settings(),
            executor,
            store,
            parser: Box::new(MarkerParser::new()),
            accumulator: StreamAccumulator::new(),
            actions: config.actions.clone(),
            sessions,
            context: SessionContext::new(first, gate).with_messages(messages),
        })
    }

    pub fn with_parser(mut self, parser: Box<dyn IntentParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn current_session(&self) -> &ChatSession {
        &self.context.session
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.context.messages
    }

    pub fn ledger(&self) -> &PendingChangeLedger {
        &self.context.ledger
    }

    pub fn is_awaiting_confirmation(&self) -> bool {
        self.context.gate.is_awaiting()
    }

    pub fn active_document(&self) -> Option<&str> {
        self.context.active_document.as_deref()
    }

    pub fn model_name(&self) -> String {
        self.adapter.name()
    }

    /// In-progress reply text while a turn is streaming.
    pub fn subscribe_stream(&self) -> watch::Receiver<Option<String>> {
        self.accumulator.subscribe()
    }

    // ------------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------------

    pub async fn new_chat(&mut self) -> Result<ChatSession, QuillError> {
        let session = ChatSession::new();
        self.sessions.push(session.clone());
        self.store.save_sessions(&self.sessions).await?;
        log::info!("Created chat session {}", session.id);
        self.switch_session(&session.id).await?;
        Ok(session)
    }

    /// Deletes a session and its history. The last remaining session cannot be deleted.
    pub async fn delete_chat(&mut self, session_id: &str) -> Result<(), QuillError> {
        if self.sessions.len() <= 1 {
            return Err(QuillError::ValidationError(
                "Cannot delete the last chat session.".to_string(),
            ));
        }
        let index = self
            .sessions
            .iter()
            .position(|s| s.id == session_id)
            .ok_or_else(|| session_not_found(session_id))?;

        self.sessions.remove(index);
        self.store.save_sessions(&self.sessions).await?;
        self.store.delete_messages(session_id).await?;
        log::info!("Deleted chat session {}", session_id);

        if self.context.session.id == session_id {
            let first = self.sessions[0].id.clone();
            self.switch_session(&first).await?;
        }
        Ok(())
    }

    /// Makes another session current, replacing messages, ledger and gate.
    pub async fn switch_session(&mut self, session_id: &str) -> Result<(), QuillError> {
        if self.context.session.id == session_id {
            return Ok(());
        }
        let session = self
            .sessions
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
            .ok_or_else(|| session_not_found(session_id))?;

        let orphaned: Vec<String> = self
            .context
            .ledger
            .pending()
            .iter()
            .map(|c| format!("{} ({})", c.id, c.target_name))
            .collect();
        if !orphaned.is_empty() {
            log::warn!(
                "Leaving session {} with {} pending change(s) still annotated: {}",
                self.context.session.id,
                orphaned.len(),
                orphaned.join(", ")
            );
        }
        if let Some(operation) = self.context.gate.clear() {
            log::info!(
                "Dropped unconfirmed {} operation on session switch",
                operation.display_name()
            );
        }

        let messages = self.store.load_messages(&session.id).await?.unwrap_or_default();
        let active_document = self.context.active_document.take();
        self.context = SessionContext::new(session, new_gate(&self.actions)).with_messages(messages);
        self.context.active_document = active_document;
        log::info!("Switched to chat session {}", session_id);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Documents and model
    // ------------------------------------------------------------------------

    /// Sets the document the user is looking at. Names go through fuzzy resolution.
    pub async fn set_active_document(&mut self, name: Option<&str>) -> Result<Option<String>, QuillError> {
        let resolved = match name {
            Some(name) => Some(self.executor.resolve_target(Some(name), None).await?),
            None => None,
        };
        log::debug!("Active document: {:?}", resolved);
        self.context.active_document = resolved.clone();
        Ok(resolved)
    }

    /// Switches to the model described by `llm`.
    pub async fn set_model(&mut self, llm: &LlmConfig) -> Result<(), QuillError> {
        let adapter = create_adapter(llm)?;
        self.settings = llm.parameters.to_settings();
        self.replace_adapter(adapter).await
    }

    /// Swaps the adapter in place. A non-empty conversation gets a note about the change.
    pub async fn replace_adapter(&mut self, adapter: Arc<dyn ModelAdapter>) -> Result<(), QuillError> {
        self.adapter = adapter;
        if !self.context.messages.is_empty() {
            let note = format!(
                "Model changed to {}. This conversation will continue with the new model.",
                self.adapter.name()
            );
            self.context.messages.push(ChatMessage::assistant(note));
            self.persist().await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Turns
    // ------------------------------------------------------------------------

    pub async fn send_message(&mut self, text: &str) -> Result<Option<ChatMessage>, QuillError> {
        self.send_message_with_cancel(text, &CancellationToken::new())
            .await
    }

    /// Runs one turn and returns the assistant message it appended.
    ///
    /// `None` when the input was empty or the stream was cancelled. Errors are storage
    /// failures only; everything else becomes the assistant's reply.
    pub async fn send_message_with_cancel(
        &mut self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ChatMessage>, QuillError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        if self.context.gate.is_awaiting() {
            self.push_user_message(text).await?;
            let reply_id = generate_id();
            let reply = match self.context.gate.resolve(text) {
                Some(GateDecision::Confirmed(operation)) => {
                    self.run_operation(operation, &reply_id).await
                }
                Some(GateDecision::Cancelled { message, .. }) => message,
                None => String::new(),
            };
            return self.push_reply(reply_id, reply).await.map(Some);
        }

        self.push_user_message(text).await?;
        let active = self.read_active_document().await;
        let prompt = build_prompt(
            active.as_ref().map(|(name, content)| ActiveDocument {
                name: crate::documents::file_name(name),
                content,
            }),
            &self.context.messages,
        );

        log::info!(
            "Turn started in session {} (prompt {} characters)",
            self.context.session.id,
            prompt.prefix.chars().count()
        );
        let outcome = self
            .accumulator
            .accumulate(self.adapter.as_ref(), &prompt, &self.settings, cancel)
            .await;

        let reply_id = generate_id();
        let reply = match outcome {
            StreamOutcome::Complete(text) => self.dispatch(&text, &reply_id).await,
            StreamOutcome::Truncated { text, error } => {
                log::warn!("Model stream ended early, using partial reply: {}", error);
                self.dispatch(&text, &reply_id).await
            }
            StreamOutcome::Failed(error) => {
                log::error!("Model request failed: {}", error);
                error.user_message()
            }
            StreamOutcome::Cancelled { partial } => {
                log::info!("Turn cancelled after {} characters", partial.chars().count());
                return Ok(None);
            }
        };

        self.push_reply(reply_id, reply).await.map(Some)
    }

    async fn push_user_message(&mut self, text: &str) -> Result<(), QuillError> {
        if self.context.is_first_user_message() {
            let title = ChatSession::title_from_message(text);
            self.context.session.title = title.clone();
            if let Some(entry) = self
                .sessions
                .iter_mut()
                .find(|s| s.id == self.context.session.id)
            {
                entry.title = title;
            }
            self.store.save_sessions(&self.sessions).await?;
        }
        self.context.messages.push(ChatMessage::user(text));
        self.persist().await
    }

    async fn push_reply(&mut self, id: String, reply: String) -> Result<ChatMessage, QuillError> {
        let message = ChatMessage::with_id(id, Role::Assistant, reply);
        self.context.messages.push(message.clone());
        self.persist().await?;
        Ok(message)
    }

    async fn persist(&self) -> Result<(), QuillError> {
        if self.context.messages.is_empty() {
            return Ok(());
        }
        self.store
            .save_messages(&self.context.session.id, &self.context.messages)
            .await
    }

    async fn read_active_document(&self) -> Option<(String, String)> {
        let name = self.context.active_document.clone()?;
        match self.executor.documents().read(&name).await {
            Ok(content) => Some((name, content)),
            Err(e) => {
                log::warn!("Could not read active document {}: {}", name, e);
                None
            }
        }
    }

    /// Turns a finished reply into the text shown to the user, acting on its marker.
    async fn dispatch(&mut self, response: &str, message_id: &str) -> String {
        let parsed = self.parser.parse(response);
        let visible = parsed.stripped_text;
        let intent = parsed.intent;
        if intent.is_none() {
            return visible;
        }
        log::info!(
            "Action {} requested for {:?}",
            intent.kind.as_str(),
            intent.filename
        );

        match self.handle_intent(intent, &visible, message_id).await {
            Ok(reply) => reply,
            Err(error) => {
                log::warn!("Action failed: {}", error);
                error.user_message()
            }
        }
    }

    async fn handle_intent(
        &mut self,
        intent: ActionIntent,
        visible: &str,
        message_id: &str,
    ) -> Result<String, QuillError> {
        let active = self.context.active_document.clone();
        let content = intent.content.clone().unwrap_or_default();

        match intent.kind {
            ActionKind::Write if self.actions.confirm_writes => {
                if intent.filename.is_none() && active.is_none() {
                    return Err(QuillError::TargetNotFound(crate::actions::NO_ACTIVE_FILE.to_string()));
                }
                self.park(
                    visible,
                    PendingOperation::Write {
                        filename: intent.filename,
                        content,
                    },
                )
            }
            ActionKind::Write => {
                let target = self
                    .executor
                    .resolve_target(intent.filename.as_deref(), active.as_deref())
                    .await?;
                let status = self.write_change(&target, &content, message_id).await?;
                Ok(join_reply(visible, &status))
            }
            ActionKind::Create if self.actions.confirm_writes => {
                let filename = intent
                    .filename
                    .unwrap_or_else(|| self.actions.default_new_file.clone());
                self.park(visible, PendingOperation::Create { filename, content })
            }
            ActionKind::Create => {
                let status = self.stage_create(intent.filename.as_deref(), &content, message_id)?;
                Ok(join_reply(visible, &status))
            }
            ActionKind::Delete => {
                let target = self
                    .executor
                    .resolve_target(intent.filename.as_deref(), active.as_deref())
                    .await?;
                self.park(visible, PendingOperation::Delete { target })
            }
            ActionKind::RemoveContent => {
                validate_removal(intent.pattern.as_deref(), intent.start_line, intent.end_line)?;
                let target = self
                    .executor
                    .resolve_target(intent.filename.as_deref(), active.as_deref())
                    .await?;
                self.park(
                    visible,
                    PendingOperation::RemoveContent {
                        target,
                        pattern: intent.pattern,
                        start_line: intent.start_line,
                        end_line: intent.end_line,
                    },
                )
            }
            ActionKind::None => Ok(visible.to_string()),
        }
    }

    fn park(&mut self, visible: &str, operation: PendingOperation) -> Result<String, QuillError> {
        let reply = confirmation_prompt(visible, &operation);
        self.context.gate.stage(operation)?;
        Ok(reply)
    }

    /// Executes an operation the user confirmed.
    async fn run_operation(&mut self, operation: PendingOperation, message_id: &str) -> String {
        let active = self.context.active_document.clone();
        let result = match operation {
            PendingOperation::Delete { target } => {
                let result = self.executor.delete(&target).await;
                if result.is_ok() && active.as_deref() == Some(target.as_str()) {
                    self.context.active_document = None;
                }
                result
            }
            PendingOperation::RemoveContent {
                target,
                pattern,
                start_line,
                end_line,
            } => {
                self.executor
                    .remove_content(&target, pattern.as_deref(), start_line, end_line, active.as_deref())
                    .await
            }
            PendingOperation::Write { filename, content } => {
                match self
                    .executor
                    .resolve_target(filename.as_deref(), active.as_deref())
                    .await
                {
                    Ok(target) => self.write_change(&target, &content, message_id).await,
                    Err(e) => Err(e),
                }
            }
            PendingOperation::Create { filename, content } => {
                self.stage_create(Some(&filename), &content, message_id)
            }
        };

        result.unwrap_or_else(|error| {
            log::warn!("Confirmed operation failed: {}", error);
            error.user_message()
        })
    }

    async fn write_change(
        &mut self,
        target: &str,
        content: &str,
        message_id: &str,
    ) -> Result<String, QuillError> {
        let change = self.executor.write(target, content, message_id).await?;
        let status = format!(
            "Content added to {}. Changes highlighted in the file.",
            change.target_name
        );
        self.context.ledger.record(change)?;
        Ok(status)
    }

    fn stage_create(
        &mut self,
        filename: Option<&str>,
        content: &str,
        message_id: &str,
    ) -> Result<String, QuillError> {
        let change = self.executor.stage_create(filename, content, message_id)?;
        let status = format!(
            "Proposed new file {}. Accept the change to create it.",
            change.target_name
        );
        self.context.ledger.record(change)?;
        Ok(status)
    }

    // ------------------------------------------------------------------------
    // Pending changes
    // ------------------------------------------------------------------------

    pub async fn accept_change(&mut self, change_id: &str) -> Result<String, QuillError> {
        let change = self.context.ledger.get_pending(change_id)?.clone();
        let message = self.executor.accept(&change).await?;
        self.context.ledger.mark(change_id, ChangeStatus::Accepted)?;
        Ok(message)
    }

    pub async fn reject_change(&mut self, change_id: &str) -> Result<String, QuillError> {
        let change = self.context.ledger.get_pending(change_id)?.clone();
        let message = self.executor.reject(&change).await?;
        self.context.ledger.mark(change_id, ChangeStatus::Rejected)?;
        Ok(message)
    }

    pub async fn accept_all(&mut self) -> BulkReport {
        self.resolve_all(ChangeStatus::Accepted).await
    }

    pub async fn reject_all(&mut self) -> BulkReport {
        self.resolve_all(ChangeStatus::Rejected).await
    }

    /// Applies every pending change. Documents are processed concurrently; changes to
    /// the same document run in ledger order so their read-modify-write cycles don't
    /// overlap. A failed item stays pending.
    async fn resolve_all(&mut self, status: ChangeStatus) -> BulkReport {
        let mut groups: Vec<Vec<PendingChange>> = Vec::new();
        for change in self.context.ledger.pending() {
            match groups.iter_mut().find(|g| g[0].target_id == change.target_id) {
                Some(group) => group.push(change.clone()),
                None => groups.push(vec![change.clone()]),
            }
        }

        let executor = &self.executor;
        let outcomes = join_all(groups.into_iter().map(|group| async move {
            let mut results = Vec::with_capacity(group.len());
            for change in group {
                let result = match status {
                    ChangeStatus::Rejected => executor.reject(&change).await,
                    _ => executor.accept(&change).await,
                };
                results.push((change.id, result));
            }
            results
        }))
        .await;

        let mut report = BulkReport {
            attempted: 0,
            succeeded: 0,
            failures: Vec::new(),
        };
        for (id, result) in outcomes.into_iter().flatten() {
            report.attempted += 1;
            match result.and_then(|_| self.context.ledger.mark(&id, status)) {
                Ok(()) => report.succeeded += 1,
                Err(error) => {
                    log::warn!("Could not resolve change {}: {}", id, error);
                    report.failures.push((id, error));
                }
            }
        }
        log::info!(
            "Bulk {}: {} of {} succeeded",
            status,
            report.succeeded,
            report.attempted
        );
        report
    }

    pub fn toggle_expanded(&mut self, change_id: &str) -> Result<bool, QuillError> {
        self.context.ledger.toggle_expanded(change_id)
    }

    pub fn changes_for_message(&self, message_id: &str) -> Vec<&PendingChange> {
        self.context.ledger.for_message(message_id)
    }
}

fn new_gate(actions: &ActionsConfig) -> ConfirmationGate {
    ConfirmationGate::with_classifier(AffirmationClassifier::new(actions.affirmations.iter()))
}

fn session_not_found(session_id: &str) -> QuillError {
    QuillError::ValidationError(format!("Chat session {} not found.", session_id))
}

fn join_reply(visible: &str, status: &str) -> String {
    let visible = visible.trim();
    if visible.is_empty() {
        status.to_string()
    } else {
        format!("{}\n\n{}", visible, status)
    }
}
