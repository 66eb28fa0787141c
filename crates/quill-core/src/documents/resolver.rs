//! Fuzzy document lookup
//!
//! Maps a loosely specified name ("MeetingNotes", "notes/todo") to a document known to
//! the store. Strategies are tried in order: exact path, case-insensitive file name,
//! then a character-overlap similarity score that must clear a threshold.

use std::collections::HashMap;

use crate::documents::{file_name, normalize_name, DocumentAccessor, DEFAULT_EXTENSION};
use crate::errors::QuillError;

pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;

/// Scores two lowercase file names between 0.0 and 1.0.
pub type SimilarityFn = fn(&str, &str) -> f64;

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Exact(String),
    FileName(String),
    Similar { name: String, score: f64 },
}

impl Resolution {
    pub fn name(&self) -> &str {
        match self {
            Resolution::Exact(name) | Resolution::FileName(name) => name,
            Resolution::Similar { name, .. } => name,
        }
    }

    pub fn into_name(self) -> String {
        match self {
            Resolution::Exact(name) | Resolution::FileName(name) => name,
            Resolution::Similar { name, .. } => name,
        }
    }
}

/// Shared character multiset size over the longer name's length.
///
/// Position and order are ignored, so unrelated names built from the same letters
/// score high.
pub fn shared_character_score(candidate: &str, target: &str) -> f64 {
    let candidate_len = candidate.chars().count();
    let target_len = target.chars().count();
    let longest = candidate_len.max(target_len);
    if longest == 0 {
        return 0.0;
    }

    let mut remaining: HashMap<char, usize> = HashMap::new();
    for ch in target.chars() {
        *remaining.entry(ch).or_insert(0) += 1;
    }

    let mut shared = 0usize;
    for ch in candidate.chars() {
        if let Some(count) = remaining.get_mut(&ch) {
            if *count > 0 {
                *count -= 1;
                shared += 1;
            }
        }
    }

    shared as f64 / longest as f64
}

#[derive(Debug, Clone)]
pub struct FuzzyResolver {
    extension: String,
    threshold: f64,
    scorer: SimilarityFn,
}

impl Default for FuzzyResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FuzzyResolver {
    pub fn new() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            threshold: DEFAULT_MATCH_THRESHOLD,
            scorer: shared_character_score,
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_scorer(mut self, scorer: SimilarityFn) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn normalize(&self, name: &str) -> String {
        normalize_name(name, &self.extension)
    }

    pub async fn resolve(
        &self,
        docs: &dyn DocumentAccessor,
        name: &str,
    ) -> Result<Option<Resolution>, QuillError> {
        let path = self.normalize(name);
        if path.is_empty() {
            return Ok(None);
        }

        if docs.exists(&path).await {
            log::debug!("Resolved '{}' by exact path", name);
            return Ok(Some(Resolution::Exact(path)));
        }

        let candidates = docs.list().await?;
        let wanted = file_name(&path).to_lowercase();

        if let Some(hit) = candidates
            .iter()
            .find(|candidate| file_name(candidate).to_lowercase() == wanted)
        {
            log::debug!("Resolved '{}' to '{}' by file name", name, hit);
            return Ok(Some(Resolution::FileName(hit.clone())));
        }

        let mut best: Option<(&String, f64)> = None;
        for candidate in &candidates {
            let score = (self.scorer)(&file_name(candidate).to_lowercase(), &wanted);
            if best.map_or(score > 0.0, |(_, best_score)| score > best_score) {
                best = Some((candidate, score));
            }
        }

        match best {
            Some((candidate, score)) if score > self.threshold => {
                log::debug!(
                    "Resolved '{}' to '{}' by similarity {:.2}",
                    name,
                    candidate,
                    score
                );
                Ok(Some(Resolution::Similar {
                    name: candidate.clone(),
                    score,
                }))
            }
            Some((candidate, score)) => {
                log::debug!(
                    "Closest match for '{}' was '{}' at {:.2}, below threshold {:.2}",
                    name,
                    candidate,
                    score,
                    self.threshold
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::MemoryDocuments;

    #[test]
    fn test_score_identical() {
        assert_eq!(shared_character_score("abc.md", "abc.md"), 1.0);
    }

    #[test]
    fn test_score_counts_multiset() {
        // "aab" vs "abb": shared multiset {a, b} = 2 of 3
        let score = shared_character_score("aab", "abb");
        assert!((score - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_score_is_order_insensitive() {
        assert_eq!(shared_character_score("stop.md", "pots.md"), 1.0);
    }

    #[tokio::test]
    async fn test_exact_path() {
        let docs = MemoryDocuments::with_documents([("daily/today.md", "")]);
        let resolved = FuzzyResolver::new()
            .resolve(&docs, "daily/today")
            .await
            .unwrap();
        assert_eq!(resolved, Some(Resolution::Exact("daily/today.md".to_string())));
    }

    #[tokio::test]
    async fn test_case_insensitive_file_name() {
        let docs = MemoryDocuments::with_documents([("projects/Roadmap.md", "")]);
        let resolved = FuzzyResolver::new()
            .resolve(&docs, "roadmap.md")
            .await
            .unwrap();
        assert_eq!(
            resolved,
            Some(Resolution::FileName("projects/Roadmap.md".to_string()))
        );
    }

    #[tokio::test]
    async fn test_similarity_match() {
        let docs = MemoryDocuments::with_documents([("meeting-notes.md", ""), ("zzz.md", "")]);
        let resolved = FuzzyResolver::new()
            .resolve(&docs, "MeetingNotes")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.name(), "meeting-notes.md");
        assert!(matches!(resolved, Resolution::Similar { score, .. } if score > 0.9));
    }

    #[tokio::test]
    async fn test_below_threshold_is_none() {
        let docs = MemoryDocuments::with_documents([("xyz.md", "")]);
        let resolved = FuzzyResolver::new()
            .resolve(&docs, "completely-different")
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn test_ties_keep_first_candidate() {
        let docs = MemoryDocuments::with_documents([("ab-one.md", ""), ("ab-two.md", "")]);
        let resolver = FuzzyResolver::new().with_scorer(|_, _| 0.8);
        let resolved = resolver.resolve(&docs, "ab").await.unwrap().unwrap();
        assert_eq!(resolved.name(), "ab-one.md");
    }

    #[tokio::test]
    async fn test_custom_threshold() {
        let docs = MemoryDocuments::with_documents([("notes.md", "")]);
        let strict = FuzzyResolver::new().with_threshold(0.99);
        assert!(strict.resolve(&docs, "note").await.unwrap().is_none());
    }
}
