//! In-process document store.
//!
//! Used by tests and dry runs. Iteration order is the name order of the underlying
//! `BTreeMap`, which keeps fuzzy-match tie breaking deterministic. Individual documents
//! can be made to fail on write to exercise partial-failure paths.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::documents::DocumentAccessor;
use crate::errors::QuillError;

/// Number of mutating calls the store has served.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub create: usize,
    pub modify: usize,
    pub delete: usize,
}

#[derive(Default)]
struct Inner {
    docs: BTreeMap<String, String>,
    failing: HashSet<String>,
    calls: CallCounts,
}

#[derive(Default)]
pub struct MemoryDocuments {
    inner: Mutex<Inner>,
}

impl MemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents<I, K, V>(docs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        for (name, content) in docs {
            store.insert(name, content);
        }
        store
    }

    /// Seeds a document without counting it as a call.
    pub fn insert(&self, name: impl Into<String>, content: impl Into<String>) {
        self.lock().docs.insert(name.into(), content.into());
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.lock().docs.get(name).cloned()
    }

    /// Makes every create/modify/delete against `name` fail with a storage error.
    pub fn fail_writes_to(&self, name: impl Into<String>) {
        self.lock().failing.insert(name.into());
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_writable(inner: &Inner, name: &str) -> Result<(), QuillError> {
        if inner.failing.contains(name) {
            return Err(QuillError::StorageFailure(format!(
                "write to {} rejected by store",
                name
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentAccessor for MemoryDocuments {
    async fn exists(&self, name: &str) -> bool {
        self.lock().docs.contains_key(name)
    }

    async fn read(&self, name: &str) -> Result<String, QuillError> {
        self.lock()
            .docs
            .get(name)
            .cloned()
            .ok_or_else(|| QuillError::TargetNotFound(format!("File \"{}\" not found.", name)))
    }

    async fn create(&self, name: &str, content: &str) -> Result<(), QuillError> {
        let mut inner = self.lock();
        inner.calls.create += 1;
        Self::check_writable(&inner, name)?;
        if inner.docs.contains_key(name) {
            return Err(QuillError::AlreadyExists(name.to_string()));
        }
        inner.docs.insert(name.to_string(), content.to_string());
        Ok(())
    }

    async fn modify(&self, name: &str, content: &str) -> Result<(), QuillError> {
        let mut inner = self.lock();
        inner.calls.modify += 1;
        Self::check_writable(&inner, name)?;
        match inner.docs.get_mut(name) {
            Some(existing) => {
                *existing = content.to_string();
                Ok(())
            }
            None => Err(QuillError::TargetNotFound(format!(
                "File \"{}\" not found.",
                name
            ))),
        }
    }

    async fn delete(&self, name: &str) -> Result<(), QuillError> {
        let mut inner = self.lock();
        inner.calls.delete += 1;
        Self::check_writable(&inner, name)?;
        inner
            .docs
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| QuillError::TargetNotFound(format!("File \"{}\" not found.", name)))
    }

    async fn list(&self) -> Result<Vec<String>, QuillError> {
        Ok(self.lock().docs.keys().cloned().collect())
    }
}
