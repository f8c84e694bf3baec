use thiserror::Error;

use crate::documents::loader::LoadError;
use crate::embeddings::EmbeddingError;
use crate::rag::AnswerError;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Answer error: {0}")]
    Answer(#[from] AnswerError),

    #[error("Document contains no text to index")]
    EmptyDocument,

    #[error("Invalid chunking parameters: chunk_size={chunk_size}, overlap={overlap}")]
    InvalidChunking { chunk_size: usize, overlap: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// Stable, machine-readable name of the error kind.
    #[inline]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Load(_) => "load_error",
            Self::Embedding(_) => "embedding_error",
            Self::SessionNotFound(_) => "session_not_found",
            Self::Answer(_) => "answer_error",
            Self::EmptyDocument => "empty_document",
            Self::InvalidChunking { .. } => "invalid_chunking",
            Self::Io(_) => "io_error",
            Self::Other(_) => "internal_error",
        }
    }

    /// Whether the caller can fix the request and try again.
    #[inline]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound(_)
                | Self::EmptyDocument
                | Self::Load(_)
                | Self::InvalidChunking { .. }
        )
    }
}

pub mod commands;
pub mod config;
pub mod documents;
pub mod embeddings;
pub mod generation;
pub mod index;
pub mod mcp;
pub mod provider;
pub mod rag;
pub mod session;

#[cfg(test)]
mod testing;
