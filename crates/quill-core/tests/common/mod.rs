#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use quill_core::config::QuillConfig;
use quill_core::llm::{ChunkStream, ModelAdapter, ModelSettings, Prompt};
use quill_core::{ChatPipeline, MemoryDocuments, MemorySessionStore, QuillError};

/// Streaming model that plays back one scripted turn per request.
#[derive(Clone, Default)]
pub struct ScriptedModel {
    turns: Arc<Mutex<VecDeque<Vec<Result<String, QuillError>>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.turn(vec![Ok(text)])
    }

    pub fn turn(self, chunks: Vec<Result<&str, QuillError>>) -> Self {
        self.turns
            .lock()
            .unwrap()
            .push_back(chunks.into_iter().map(|c| c.map(str::to_string)).collect());
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn remaining_turns(&self) -> usize {
        self.turns.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelAdapter for ScriptedModel {
    fn name(&self) -> String {
        "mock / scripted".to_string()
    }

    async fn complete(&self, prompt: &Prompt, settings: &ModelSettings) -> Result<String, QuillError> {
        use futures::StreamExt;
        let chunks: Vec<_> = self.iterate(prompt, settings).await?.collect().await;
        chunks.into_iter().collect()
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn iterate(&self, prompt: &Prompt, _: &ModelSettings) -> Result<ChunkStream, QuillError> {
        self.prompts.lock().unwrap().push(prompt.prefix.clone());
        let chunks = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![Ok("OK".to_string())]);
        Ok(Box::pin(stream::iter(chunks)))
    }
}

pub struct Harness {
    pub pipeline: ChatPipeline,
    pub docs: Arc<MemoryDocuments>,
    pub store: Arc<MemorySessionStore>,
    pub model: ScriptedModel,
}

pub async fn harness(model: ScriptedModel, docs: MemoryDocuments) -> Harness {
    harness_with_config(model, docs, QuillConfig::default()).await
}

pub async fn harness_with_config(
    model: ScriptedModel,
    docs: MemoryDocuments,
    config: QuillConfig,
) -> Harness {
    let docs = Arc::new(docs);
    let store = Arc::new(MemorySessionStore::new());
    let pipeline = ChatPipeline::open(
        Arc::new(model.clone()),
        docs.clone(),
        store.clone(),
        &config,
    )
    .await
    .unwrap();
    Harness {
        pipeline,
        docs,
        store,
        model,
    }
}
