//! Document storage boundary.
//!
//! The pipeline never touches files directly; it goes through a [`DocumentAccessor`].
//! Names handed to an accessor are already normalized with [`normalize_name`].

pub mod memory;
pub mod resolver;
pub mod vault;

use std::ops::Range;

use async_trait::async_trait;

use crate::errors::QuillError;

pub use memory::MemoryDocuments;
pub use resolver::{FuzzyResolver, Resolution};
pub use vault::VaultDocuments;

pub const DEFAULT_EXTENSION: &str = "md";

#[async_trait]
pub trait DocumentAccessor: Send + Sync {
    async fn exists(&self, name: &str) -> bool;

    /// Fails with [`QuillError::TargetNotFound`] when the document is absent.
    async fn read(&self, name: &str) -> Result<String, QuillError>;

    /// Fails with [`QuillError::AlreadyExists`] when the name is taken.
    async fn create(&self, name: &str, content: &str) -> Result<(), QuillError>;

    async fn modify(&self, name: &str, content: &str) -> Result<(), QuillError>;

    async fn delete(&self, name: &str) -> Result<(), QuillError>;

    /// Every document name known to the store.
    async fn list(&self) -> Result<Vec<String>, QuillError>;

    /// Replaces a byte range of the document in place.
    ///
    /// Stores backed by a live editor override this to edit at a position instead of
    /// rewriting the whole text.
    async fn replace_range(
        &self,
        name: &str,
        range: Range<usize>,
        replacement: &str,
    ) -> Result<(), QuillError> {
        let mut content = self.read(name).await?;
        if range.end > content.len()
            || !content.is_char_boundary(range.start)
            || !content.is_char_boundary(range.end)
        {
            return Err(QuillError::ValidationError(format!(
                "Range {:?} is outside of {}",
                range, name
            )));
        }
        content.replace_range(range, replacement);
        self.modify(name, &content).await
    }
}

/// Canonical form of a document name: `/` separators, no empty segments, and the
/// given extension appended when missing.
pub fn normalize_name(name: &str, extension: &str) -> String {
    let unified = name.trim().replace('\\', "/");
    let mut path = unified
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/");
    let suffix = format!(".{}", extension);
    if !path.is_empty() && !path.ends_with(&suffix) {
        path.push_str(&suffix);
    }
    path
}

/// Last path segment of a document name.
pub fn file_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}
