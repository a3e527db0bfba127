//! Token-window chunking

use serde::{Deserialize, Serialize};

use dualrag_core::{tokenize, Chunk, Document, Error, Result};

/// Configuration for document chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Tokens per chunk
    pub chunk_size: usize,
    /// Tokens shared by consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            chunk_overlap,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfiguration(
                "chunk size must be at least 1 token".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfiguration(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Splits documents into overlapping token windows
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    /// Chunk a document. Windows advance by `chunk_size - chunk_overlap` tokens;
    /// the last window may be short and is emitted once.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let tokens = tokenize(&document.text);
        let size = self.config.chunk_size;
        let step = size - self.config.chunk_overlap;

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < tokens.len() {
            let end = (start + size).min(tokens.len());
            let start_offset = tokens[start].start;
            let end_offset = tokens[end - 1].end;

            chunks.push(Chunk {
                text: document.text[start_offset..end_offset].to_string(),
                source: document.source.clone(),
                sequence_index: chunks.len(),
                start_offset,
                end_offset,
            });

            if end == tokens.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

/// Chunk `document` into windows of `chunk_size` tokens overlapping by `overlap` tokens.
pub fn chunk(document: &Document, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    let chunker = Chunker::new(ChunkingConfig {
        chunk_size,
        chunk_overlap: overlap,
    })?;
    Ok(chunker.chunk(document))
}
