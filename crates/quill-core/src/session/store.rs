//! Session persistence
//!
//! The session list lives in `sessions.json`; each session's messages live in their own
//! `history-<id>.json` next to it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::fs;

use crate::core_types::{ChatMessage, ChatSession};
use crate::errors::QuillError;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn list_sessions(&self) -> Result<Vec<ChatSession>, QuillError>;

    async fn save_sessions(&self, sessions: &[ChatSession]) -> Result<(), QuillError>;

    /// `None` when nothing was ever saved for the session.
    async fn load_messages(&self, session_id: &str) -> Result<Option<Vec<ChatMessage>>, QuillError>;

    async fn save_messages(&self, session_id: &str, messages: &[ChatMessage]) -> Result<(), QuillError>;

    async fn delete_messages(&self, session_id: &str) -> Result<(), QuillError>;
}

pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn sessions_path(&self) -> PathBuf {
        self.dir.join("sessions.json")
    }

    fn history_path(&self, session_id: &str) -> Result<PathBuf, QuillError> {
        if session_id.is_empty()
            || !session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(QuillError::ValidationError(format!(
                "Invalid session id: {}",
                session_id
            )));
        }
        Ok(self.dir.join(format!("history-{}.json", session_id)))
    }

    async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, QuillError> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(QuillError::StorageFailure(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn write_json<T: serde::Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<(), QuillError> {
        fs::create_dir_all(&self.dir).await.map_err(|e| {
            QuillError::StorageFailure(format!("Failed to create {}: {}", self.dir.display(), e))
        })?;
        let content = serde_json::to_string_pretty(value)?;
        fs::write(path, content).await.map_err(|e| {
            QuillError::StorageFailure(format!("Failed to write {}: {}", path.display(), e))
        })
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn list_sessions(&self) -> Result<Vec<ChatSession>, QuillError> {
        Ok(Self::read_json(&self.sessions_path()).await?.unwrap_or_default())
    }

    async fn save_sessions(&self, sessions: &[ChatSession]) -> Result<(), QuillError> {
        self.write_json(&self.sessions_path(), sessions).await
    }

    async fn load_messages(&self, session_id: &str) -> Result<Option<Vec<ChatMessage>>, QuillError> {
        let path = self.history_path(session_id)?;
        Self::read_json(&path).await
    }

    async fn save_messages(&self, session_id: &str, messages: &[ChatMessage]) -> Result<(), QuillError> {
        let path = self.history_path(session_id)?;
        self.write_json(&path, messages).await?;
        log::debug!("Saved {} messages for session {}", messages.len(), session_id);
        Ok(())
    }

    async fn delete_messages(&self, session_id: &str) -> Result<(), QuillError> {
        let path = self.history_path(session_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(QuillError::StorageFailure(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[derive(Default)]
struct MemoryInner {
    sessions: Vec<ChatSession>,
    histories: HashMap<String, Vec<ChatMessage>>,
}

/// Keeps everything in process.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<MemoryInner>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn list_sessions(&self) -> Result<Vec<ChatSession>, QuillError> {
        Ok(self.lock().sessions.clone())
    }

    async fn save_sessions(&self, sessions: &[ChatSession]) -> Result<(), QuillError> {
        self.lock().sessions = sessions.to_vec();
        Ok(())
    }

    async fn load_messages(&self, session_id: &str) -> Result<Option<Vec<ChatMessage>>, QuillError> {
        Ok(self.lock().histories.get(session_id).cloned())
    }

    async fn save_messages(&self, session_id: &str, messages: &[ChatMessage]) -> Result<(), QuillError> {
        self.lock()
            .histories
            .insert(session_id.to_string(), messages.to_vec());
        Ok(())
    }

    async fn delete_messages(&self, session_id: &str) -> Result<(), QuillError> {
        self.lock().histories.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path().join("sessions"));

        assert!(store.list_sessions().await.unwrap().is_empty());
        assert_eq!(store.load_messages("id_abc").await.unwrap(), None);

        let session = ChatSession::new();
        store.save_sessions(&[session.clone()]).await.unwrap();
        assert_eq!(store.list_sessions().await.unwrap(), vec![session.clone()]);

        let messages = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
        store.save_messages(&session.id, &messages).await.unwrap();
        assert!(dir
            .path()
            .join("sessions")
            .join(format!("history-{}.json", session.id))
            .exists());
        assert_eq!(store.load_messages(&session.id).await.unwrap(), Some(messages));

        store.delete_messages(&session.id).await.unwrap();
        assert_eq!(store.load_messages(&session.id).await.unwrap(), None);
        store.delete_messages(&session.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_ids() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path());
        assert!(matches!(
            store.save_messages("../evil", &[]).await,
            Err(QuillError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_file_store_corrupt_history() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("history-bad.json"), "{not json").unwrap();
        let store = FileSessionStore::new(dir.path());
        assert!(matches!(
            store.load_messages("bad").await,
            Err(QuillError::ParsingError(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemorySessionStore::new();
        store.save_messages("a", &[ChatMessage::user("x")]).await.unwrap();
        assert_eq!(store.load_messages("a").await.unwrap().unwrap().len(), 1);
        assert_eq!(store.load_messages("b").await.unwrap(), None);
    }
}
