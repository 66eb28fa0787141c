//! Applies parsed actions to documents.
//!
//! Writes land immediately inside an annotated region and are recorded as pending
//! changes; creates are only staged. Accepting or rejecting a change later resolves the
//! region (or performs the staged create). Deletes and content removal run only once
//! the confirmation gate has let them through.

use std::sync::Arc;

use regex::RegexBuilder;

use crate::actions::annotation;
use crate::actions::sanitizer::sanitize_content;
use crate::core_types::{generate_id, ChangeKind, ChangeStatus, PendingChange};
use crate::documents::{file_name, DocumentAccessor, FuzzyResolver};
use crate::errors::QuillError;

pub const DEFAULT_NEW_FILE: &str = "new-file.md";

pub const NO_ACTIVE_FILE: &str =
    "No active file found. Please specify a filename or open a file first.";

pub struct MutationExecutor {
    docs: Arc<dyn DocumentAccessor>,
    resolver: FuzzyResolver,
    default_new_file: String,
}

impl MutationExecutor {
    pub fn new(docs: Arc<dyn DocumentAccessor>) -> Self {
        Self {
            docs,
            resolver: FuzzyResolver::new(),
            default_new_file: DEFAULT_NEW_FILE.to_string(),
        }
    }

    pub fn with_resolver(mut self, resolver: FuzzyResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_default_new_file(mut self, name: impl Into<String>) -> Self {
        self.default_new_file = name.into();
        self
    }

    pub fn documents(&self) -> &Arc<dyn DocumentAccessor> {
        &self.docs
    }

    pub fn resolver(&self) -> &FuzzyResolver {
        &self.resolver
    }

    /// Picks the document an action applies to: the resolved `filename` when given,
    /// otherwise the active document.
    pub async fn resolve_target(
        &self,
        filename: Option<&str>,
        active: Option<&str>,
    ) -> Result<String, QuillError> {
        match filename {
            Some(name) => match self.resolver.resolve(self.docs.as_ref(), name).await? {
                Some(resolution) => Ok(resolution.into_name()),
                None => Err(QuillError::TargetNotFound(format!(
                    "File \"{}\" not found.",
                    name
                ))),
            },
            None => active
                .map(str::to_string)
                .ok_or_else(|| QuillError::TargetNotFound(NO_ACTIVE_FILE.to_string())),
        }
    }

    /// Inserts sanitized content as an annotated region and returns the pending change.
    pub async fn write(
        &self,
        target: &str,
        raw_content: &str,
        message_id: &str,
    ) -> Result<PendingChange, QuillError> {
        let content = sanitize_content(raw_content);
        if content.is_empty() {
            return Err(QuillError::ValidationError(
                "No content was provided to add to the file.".to_string(),
            ));
        }

        let id = generate_id();
        let current = self.docs.read(target).await?;
        let updated = annotation::insert_region(&current, &id, &content);
        self.docs.modify(target, &updated).await?;
        log::info!("Inserted change {} into {}", id, target);

        Ok(PendingChange {
            id,
            kind: ChangeKind::Insert,
            target_id: target.to_string(),
            target_name: file_name(target).to_string(),
            content,
            status: ChangeStatus::Pending,
            expanded: false,
            message_id: message_id.to_string(),
        })
    }

    /// Stages a new document. Nothing is written until the change is accepted.
    pub fn stage_create(
        &self,
        filename: Option<&str>,
        content: &str,
        message_id: &str,
    ) -> Result<PendingChange, QuillError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(QuillError::ValidationError(
                "No content was provided for the new file.".to_string(),
            ));
        }
        let requested = filename
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(self.default_new_file.as_str());
        let target = self.resolver.normalize(requested);

        let change = PendingChange {
            id: generate_id(),
            kind: ChangeKind::Create,
            target_name: file_name(&target).to_string(),
            target_id: target,
            content: content.to_string(),
            status: ChangeStatus::Pending,
            expanded: false,
            message_id: message_id.to_string(),
        };
        log::info!("Staged creation of {} as {}", change.target_id, change.id);
        Ok(change)
    }

    pub async fn delete(&self, target: &str) -> Result<String, QuillError> {
        self.docs.delete(target).await?;
        log::info!("Deleted {}", target);
        Ok(format!("File '{}' has been deleted.", target))
    }

    /// Removes a line range when it is valid for the document, otherwise the first
    /// case-insensitive match of `pattern`.
    pub async fn remove_content(
        &self,
        target: &str,
        pattern: Option<&str>,
        start_line: Option<usize>,
        end_line: Option<usize>,
        active: Option<&str>,
    ) -> Result<String, QuillError> {
        validate_removal(pattern, start_line, end_line)?;
        let name = file_name(target);
        let current = self.docs.read(target).await?;

        if let (Some(start), Some(end)) = (start_line, end_line) {
            if let Some(updated) = annotation::remove_lines(&current, start, end) {
                self.docs.modify(target, &updated).await?;
                log::info!("Removed lines {}..={} from {}", start, end, target);
                return Ok(format!(
                    "Content from lines {} to {} has been removed from {}.",
                    start + 1,
                    end + 1,
                    name
                ));
            }
            if pattern.is_none() {
                return Err(QuillError::ValidationError(format!(
                    "Invalid line range {} to {}: {} has {} lines.",
                    start + 1,
                    end + 1,
                    name,
                    annotation::line_count(&current)
                )));
            }
        }

        let pattern = pattern.ok_or_else(|| {
            QuillError::ValidationError(
                "No pattern or line range provided for content removal.".to_string(),
            )
        })?;
        let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        // An empty match would leave the document untouched
        let found = regex
            .find_iter(&current)
            .find(|m| !m.is_empty())
            .map(|m| m.range());
        let Some(range) = found else {
            return Err(QuillError::PatternNotFound {
                pattern: pattern.to_string(),
                document: name.to_string(),
            });
        };

        if active == Some(target) {
            self.docs.replace_range(target, range, "").await?;
        } else {
            let mut updated = current;
            updated.replace_range(range, "");
            self.docs.modify(target, &updated).await?;
        }
        log::info!("Removed content matching '{}' from {}", pattern, target);
        Ok(format!(
            "Content matching \"{}\" has been removed from {}.",
            pattern, name
        ))
    }

    /// Makes a pending change permanent.
    pub async fn accept(&self, change: &PendingChange) -> Result<String, QuillError> {
        match change.kind {
            ChangeKind::Insert => {
                let current = self.docs.read(&change.target_id).await?;
                let updated = annotation::accept_region(&current, &change.id).ok_or_else(|| {
                    QuillError::TargetNotFound(format!(
                        "The highlighted change is no longer in {}.",
                        change.target_name
                    ))
                })?;
                self.docs.modify(&change.target_id, &updated).await?;
                log::debug!("Accepted region {} in {}", change.id, change.target_id);
                Ok(format!("Changes accepted in {}.", change.target_name))
            }
            ChangeKind::Create => {
                if self.docs.exists(&change.target_id).await {
                    let current = self.docs.read(&change.target_id).await?;
                    let updated = format!("{}\n\n{}", current, change.content);
                    self.docs.modify(&change.target_id, &updated).await?;
                    log::info!("Appended staged content to existing {}", change.target_id);
                    Ok(format!("Content added to {}.", change.target_name))
                } else {
                    self.docs.create(&change.target_id, &change.content).await?;
                    log::info!("Created {}", change.target_id);
                    Ok(format!("File '{}' has been created.", change.target_id))
                }
            }
        }
    }

    /// Reverts a pending change. A region that is already gone counts as reverted.
    pub async fn reject(&self, change: &PendingChange) -> Result<String, QuillError> {
        match change.kind {
            ChangeKind::Insert => {
                let current = self.docs.read(&change.target_id).await?;
                match annotation::reject_region(&current, &change.id) {
                    Some(updated) => {
                        self.docs.modify(&change.target_id, &updated).await?;
                        log::debug!("Removed region {} from {}", change.id, change.target_id);
                    }
                    None => log::warn!(
                        "Region {} already missing from {}",
                        change.id,
                        change.target_id
                    ),
                }
                Ok(format!(
                    "Changes rejected and removed from {}.",
                    change.target_name
                ))
            }
            ChangeKind::Create => Ok(format!(
                "Discarded the new file '{}'.",
                change.target_id
            )),
        }
    }
}

/// Content removal needs a pattern or a complete line range.
pub fn validate_removal(
    pattern: Option<&str>,
    start_line: Option<usize>,
    end_line: Option<usize>,
) -> Result<(), QuillError> {
    let has_pattern = pattern.map_or(false, |p| !p.is_empty());
    let has_range = start_line.is_some() && end_line.is_some();
    if has_pattern || has_range {
        Ok(())
    } else {
        Err(QuillError::ValidationError(
            "No pattern or line range provided for content removal.".to_string(),
        ))
    }
}
