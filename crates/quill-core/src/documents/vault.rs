//! Filesystem-backed document store rooted at a vault directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::documents::{DocumentAccessor, DEFAULT_EXTENSION};
use crate::errors::QuillError;

pub struct VaultDocuments {
    root: PathBuf,
    extension: String,
}

impl VaultDocuments {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, QuillError> {
        if name.is_empty() || name.split('/').any(|segment| segment == "..") {
            return Err(QuillError::ValidationError(format!(
                "Invalid document name: {}",
                name
            )));
        }
        Ok(self.root.join(name))
    }

    fn storage_error(action: &str, name: &str, err: std::io::Error) -> QuillError {
        log::error!("Failed to {} {}: {}", action, name, err);
        QuillError::StorageFailure(format!("Failed to {} {}: {}", action, name, err))
    }
}

#[async_trait]
impl DocumentAccessor for VaultDocuments {
    async fn exists(&self, name: &str) -> bool {
        match self.path_for(name) {
            Ok(path) => fs::metadata(&path)
                .await
                .map(|meta| meta.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn read(&self, name: &str) -> Result<String, QuillError> {
        let path = self.path_for(name)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                QuillError::TargetNotFound(format!("File \"{}\" not found.", name)),
            ),
            Err(e) => Err(Self::storage_error("read", name, e)),
        }
    }

    async fn create(&self, name: &str, content: &str) -> Result<(), QuillError> {
        let path = self.path_for(name)?;
        if fs::metadata(&path).await.is_ok() {
            return Err(QuillError::AlreadyExists(name.to_string()));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::storage_error("create directory for", name, e))?;
        }
        fs::write(&path, content)
            .await
            .map_err(|e| Self::storage_error("create", name, e))?;
        log::debug!("Created document {}", name);
        Ok(())
    }

    async fn modify(&self, name: &str, content: &str) -> Result<(), QuillError> {
        let path = self.path_for(name)?;
        if fs::metadata(&path).await.is_err() {
            return Err(QuillError::TargetNotFound(format!(
                "File \"{}\" not found.",
                name
            )));
        }
        fs::write(&path, content)
            .await
            .map_err(|e| Self::storage_error("write", name, e))
    }

    async fn delete(&self, name: &str) -> Result<(), QuillError> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                QuillError::TargetNotFound(format!("File \"{}\" not found.", name)),
            ),
            Err(e) => Err(Self::storage_error("delete", name, e)),
        }
    }

    async fn list(&self) -> Result<Vec<String>, QuillError> {
        let mut names = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if path.extension().and_then(|ext| ext.to_str()) == Some(self.extension.as_str()) {
                    if let Ok(relative) = path.strip_prefix(&self.root) {
                        let name = relative
                            .components()
                            .map(|c| c.as_os_str().to_string_lossy().into_owned())
                            .collect::<Vec<_>>()
                            .join("/");
                        names.push(name);
                    }
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
