// Deterministic stand-ins for the model provider, shared by unit tests

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::embeddings::{Embedder, EmbeddingError, normalize_input};
use crate::generation::{ChatMessage, ChatModel};
use crate::provider::ProviderError;

pub(crate) const DIMENSION: usize = 64;

/// FNV-1a bucket for a lowercase word
pub(crate) fn bucket(word: &str) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in word.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % DIMENSION as u64) as usize
}

pub(crate) fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DIMENSION];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        vector[bucket(&word.to_lowercase())] += 1.0;
    }
    vector
}

/// Word-count embedder; texts sharing words score higher
#[derive(Debug, Default)]
pub(crate) struct BagOfWordsEmbedder {
    pub(crate) calls: AtomicUsize,
    pub(crate) texts_embedded: AtomicUsize,
}

impl BagOfWordsEmbedder {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for BagOfWordsEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let text = normalize_input(text)?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts_embedded.fetch_add(1, Ordering::SeqCst);
        Ok(bag_of_words(&text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            let text = normalize_input(text)?;
            self.texts_embedded.fetch_add(1, Ordering::SeqCst);
            vectors.push(bag_of_words(&text));
        }
        Ok(vectors)
    }
}

/// Finishes earlier batches last, so completion order is the reverse of issue order
#[derive(Debug)]
pub(crate) struct ReverseDelayEmbedder {
    issued: AtomicUsize,
    total_batches: usize,
}

impl ReverseDelayEmbedder {
    pub(crate) fn new(total_batches: usize) -> Self {
        Self {
            issued: AtomicUsize::new(0),
            total_batches,
        }
    }
}

#[async_trait]
impl Embedder for ReverseDelayEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(bag_of_words(&normalize_input(text)?))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let issued = self.issued.fetch_add(1, Ordering::SeqCst);
        let remaining = self.total_batches.saturating_sub(issued) as u64;
        tokio::time::sleep(Duration::from_millis(remaining * 15)).await;

        texts
            .iter()
            .map(|text| normalize_input(text).map(|t| bag_of_words(&t)))
            .collect()
    }
}

/// Fails any batch containing `marker`
#[derive(Debug)]
pub(crate) struct FailingEmbedder {
    pub(crate) marker: &'static str,
}

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.contains(self.marker) {
            return Err(ProviderError::Status(500).into());
        }
        Ok(bag_of_words(&normalize_input(text)?))
    }
}

/// Returns vectors of a fixed dimension regardless of input
#[derive(Debug)]
pub(crate) struct ConstantEmbedder {
    pub(crate) vector: Vec<f32>,
}

#[async_trait]
impl Embedder for ConstantEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        normalize_input(text)?;
        Ok(self.vector.clone())
    }
}

/// Chat model that records every prompt and answers with a canned reply
#[derive(Debug)]
pub(crate) struct RecordingChatModel {
    reply: Result<String, ()>,
    pub(crate) prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl RecordingChatModel {
    pub(crate) fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            reply: Err(()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().expect("prompt log poisoned").clone()
    }
}

#[async_trait]
impl ChatModel for RecordingChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        self.prompts
            .lock()
            .expect("prompt log poisoned")
            .push(messages.to_vec());
        self.reply.clone().map_err(|()| ProviderError::Timeout)
    }
}
