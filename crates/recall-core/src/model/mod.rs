//! Domain model shared by every layer of the engine.

mod document;
mod knowledge_base;
mod search_result;
mod vector;

pub use document::{Document, DocumentStatus, IndexingUpdate, NewDocument};
pub use knowledge_base::{CounterDelta, KnowledgeBase, KnowledgeBaseStatus};
pub use search_result::SearchResult;
pub(crate) use search_result::sort_by_score_desc;
pub use vector::{ChunkRecord, Vector, VectorStats};

use sha2::{Digest, Sha256};

/// Returns the lowercase hex SHA-256 digest of `text`.
///
/// Used for both document and chunk content hashes.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_deterministic() {
        let a = content_hash("The quick brown fox.");
        let b = content_hash("The quick brown fox.");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_content_hash_distinguishes_text() {
        assert_ne!(content_hash("alpha"), content_hash("alpha "));
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
