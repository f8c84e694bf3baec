// RAG module
// Ingestion into per-session indexes and retrieval-augmented answering


use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::documents::{ChunkingConfig, DocumentFormat, LoadError, chunk_text, load_bytes};
use crate::embeddings::{Embedder, EmbeddingError};
use crate::generation::{ChatModel, build_messages};
use crate::index::{IngestOptions, ScoredChunk, VectorIndex};
use crate::provider::{OpenAiClient, ProviderError};
use crate::session::{SessionId, SessionInfo, SessionStore};
use crate::{RagError, Result};

pub const UPLOAD_STATUS: &str = "File processed successfully";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks handed to the chat model as context
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

/// Failure while answering a question against an existing session
#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("Retrieval failed: {0}")]
    Retrieval(#[source] EmbeddingError),
    #[error("Generation failed: {0}")]
    Generation(#[source] ProviderError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub session_id: SessionId,
    pub status: String,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub answer: String,
    /// Retrieved chunk texts, best match first
    pub context: Vec<String>,
}

/// Owns the session store and the model capabilities used by every session
pub struct RagService {
    sessions: Arc<SessionStore>,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    chunking: ChunkingConfig,
    ingest: IngestOptions,
    retrieval: RetrievalConfig,
}

impl std::fmt::Debug for RagService {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagService")
            .field("sessions", &self.sessions)
            .field("chunking", &self.chunking)
            .field("ingest", &self.ingest)
            .field("retrieval", &self.retrieval)
            .finish_non_exhaustive()
    }
}

impl RagService {
    #[inline]
    pub fn new(
        sessions: Arc<SessionStore>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            sessions,
            embedder,
            chat,
            chunking: ChunkingConfig::default(),
            ingest: IngestOptions::default(),
            retrieval: RetrievalConfig::default(),
        }
    }

    /// Wire up the OpenAI-compatible provider and a session store from `config`.
    ///
    /// Fails when the API key variable is unset.
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let client = Arc::new(OpenAiClient::from_env(&config.provider)?);
        Self::with_provider(config, client)
    }

    /// Like [`RagService::from_config`], reusing an already built provider client
    /// for both embeddings and chat.
    #[inline]
    pub fn with_provider(config: &Config, client: Arc<OpenAiClient>) -> Result<Self> {
        config.validate()?;
        let sessions = Arc::new(SessionStore::new(config.sessions));

        Ok(Self::new(sessions, Arc::clone(&client) as Arc<dyn Embedder>, client)
            .with_chunking(config.chunking)
            .with_ingest(config.ingest)
            .with_retrieval(config.retrieval))
    }

    #[inline]
    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    #[inline]
    pub fn with_ingest(mut self, ingest: IngestOptions) -> Self {
        self.ingest = ingest;
        self
    }

    #[inline]
    pub fn with_retrieval(mut self, retrieval: RetrievalConfig) -> Self {
        self.retrieval = retrieval;
        self
    }

    #[inline]
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    #[inline]
    pub fn retrieval(&self) -> RetrievalConfig {
        self.retrieval
    }

    /// Index an uploaded file's bytes into a new session
    #[inline]
    pub async fn upload(&self, bytes: &[u8], filename: &str) -> Result<UploadReceipt> {
        let format = DocumentFormat::from_filename(filename);
        debug!("Loading {} ({} bytes) as {:?}", filename, bytes.len(), format);

        let text = load_bytes(format, bytes)?;
        let receipt = self.ingest_text(&text).await?;
        info!(
            "Uploaded {} into session {} ({} chunks)",
            filename, receipt.session_id, receipt.chunk_count
        );
        Ok(receipt)
    }

    /// Index a file on disk; `filename` overrides the name used for format detection
    #[inline]
    pub async fn upload_path(&self, path: &Path, filename: Option<&str>) -> Result<UploadReceipt> {
        let bytes = tokio::fs::read(path).await.map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let name = filename.map_or_else(
            || {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            },
            ToString::to_string,
        );
        self.upload(&bytes, &name).await
    }

    /// Chunk, embed and store `text` as a new session.
    ///
    /// A document without any non-blank chunk creates no session.
    #[inline]
    pub async fn ingest_text(&self, text: &str) -> Result<UploadReceipt> {
        let chunks = chunk_text(text, &self.chunking)?;
        if chunks.is_empty() {
            return Err(RagError::EmptyDocument);
        }

        let index = VectorIndex::build(&chunks, self.embedder.as_ref(), self.ingest)
            .await
            .inspect_err(|e| warn!("Ingestion aborted: {}", e))?;
        if index.is_empty() {
            return Err(RagError::EmptyDocument);
        }

        let chunk_count = index.len();
        let session_id = self.sessions.create(index).await;

        Ok(UploadReceipt {
            session_id,
            status: UPLOAD_STATUS.to_string(),
            chunk_count,
        })
    }

    /// Retrieve the best chunks for `question` and ask the chat model to answer from them
    #[inline]
    pub async fn answer(&self, session_id: &SessionId, question: &str) -> Result<Answer> {
        let index = self.sessions.get(session_id).await?;

        let hits = index
            .search(question, self.retrieval.top_k, self.embedder.as_ref())
            .await
            .map_err(AnswerError::Retrieval)?;
        let context: Vec<String> = hits.into_iter().map(|hit| hit.text).collect();
        debug!(
            "Answering in session {} with {} context chunks",
            session_id,
            context.len()
        );

        let messages = build_messages(question, &context);
        let answer = self
            .chat
            .complete(&messages)
            .await
            .map_err(AnswerError::Generation)?;

        Ok(Answer { answer, context })
    }

    /// Similarity search within one session without generation
    #[inline]
    pub async fn search(
        &self,
        session_id: &SessionId,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let index = self.sessions.get(session_id).await?;
        Ok(index.search(query, k, self.embedder.as_ref()).await?)
    }

    #[inline]
    pub async fn end_session(&self, session_id: &SessionId) -> Result<()> {
        self.sessions.delete(session_id).await
    }

    #[inline]
    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        self.sessions.list().await
    }
}
