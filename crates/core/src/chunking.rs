use crate::error::IngestError;
use crate::keys::{chunk_key, DocumentId};
use crate::models::{Chunk, ExtractedText};
use crate::store::STORE_ITEM_LIMIT_BYTES;

pub const DEFAULT_MAX_CHUNK_SIZE: usize = 300_000;

/// Longest UTF-8 encoding of a single character.
const MAX_CHAR_WIDTH: usize = 4;

/// Where a chunk may end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChunkBoundary {
    /// Cut on exact byte offsets; all chunks but the last are full.
    #[default]
    Byte,
    /// Back off to the previous character boundary so no character is split.
    CharBoundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chunk_size: usize,
    pub boundary: ChunkBoundary,
}

impl ChunkingConfig {
    pub fn new(max_chunk_size: usize, boundary: ChunkBoundary) -> Result<Self, IngestError> {
        let config = Self {
            max_chunk_size,
            boundary,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chunk_size == 0 {
            return Err(IngestError::InvalidConfig(
                "max chunk size must be positive".to_string(),
            ));
        }

        if self.max_chunk_size >= STORE_ITEM_LIMIT_BYTES {
            return Err(IngestError::InvalidConfig(format!(
                "max chunk size {} must stay below the store item limit of {} bytes",
                self.max_chunk_size, STORE_ITEM_LIMIT_BYTES
            )));
        }

        if self.boundary == ChunkBoundary::CharBoundary && self.max_chunk_size < MAX_CHAR_WIDTH {
            return Err(IngestError::InvalidConfig(format!(
                "char-boundary chunking needs at least {MAX_CHAR_WIDTH} bytes per chunk"
            )));
        }

        Ok(())
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            boundary: ChunkBoundary::Byte,
        }
    }
}

/// Splits `text` into ordered payload slices no longer than the configured maximum.
pub fn split_payloads<'a>(text: &'a str, config: &ChunkingConfig) -> Vec<&'a [u8]> {
    let bytes = text.as_bytes();
    let limit = config.max_chunk_size.max(1);

    match config.boundary {
        ChunkBoundary::Byte => bytes.chunks(limit).collect(),
        ChunkBoundary::CharBoundary => {
            let mut payloads = Vec::with_capacity(bytes.len() / limit + 1);
            let mut start = 0;

            while start < bytes.len() {
                let mut end = (start + limit).min(bytes.len());
                while !text.is_char_boundary(end) {
                    end -= 1;
                }
                // a limit narrower than one character still has to make progress
                if end == start {
                    end = start + 1;
                    while !text.is_char_boundary(end) {
                        end += 1;
                    }
                }

                payloads.push(&bytes[start..end]);
                start = end;
            }

            payloads
        }
    }
}

pub fn build_chunks(
    document_id: &DocumentId,
    text: &ExtractedText,
    config: &ChunkingConfig,
) -> Vec<Chunk> {
    split_payloads(text.as_str(), config)
        .into_iter()
        .enumerate()
        .map(|(index, payload)| {
            let sequence_index = index as u64;
            Chunk {
                sequence_index,
                key: chunk_key(document_id, sequence_index),
                payload: payload.to_vec(),
            }
        })
        .collect()
}
