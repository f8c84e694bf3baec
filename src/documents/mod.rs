// Documents module
// Turns uploaded sources into plain text and fixed-size overlapping chunks

pub mod chunking;
pub mod loader;

pub use chunking::{ChunkingConfig, chunk_text};
pub use loader::{DocumentFormat, LoadError, load_bytes, load_path};
