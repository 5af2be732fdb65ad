//! Chunk entity

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bounded span of a document's text; the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,

    pub document_id: Uuid,

    /// Position of the chunk within its document, starting at 0
    pub ordinal: u32,

    pub text: String,

    /// Byte offset of the first byte in the source text
    pub start: usize,

    /// Byte offset one past the last byte in the source text
    pub end: usize,

    /// Length in characters
    pub char_length: usize,
}

impl Chunk {
    /// Deterministic chunk id so that re-chunking identical input upserts the
    /// same index entries.
    pub fn derive_id(document_id: Uuid, ordinal: u32) -> Uuid {
        Uuid::new_v5(&document_id, format!("chunk:{ordinal}").as_bytes())
    }

    /// Approximate token count (~4 chars per token)
    pub fn token_estimate(&self) -> usize {
        self.char_length.div_ceil(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_id_is_stable() {
        let doc = Uuid::from_u128(42);
        assert_eq!(Chunk::derive_id(doc, 3), Chunk::derive_id(doc, 3));
        assert_ne!(Chunk::derive_id(doc, 3), Chunk::derive_id(doc, 4));
        assert_ne!(Chunk::derive_id(doc, 3), Chunk::derive_id(Uuid::from_u128(43), 3));
    }
}
