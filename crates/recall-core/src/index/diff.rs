//! Chunk-level diff between stored and freshly computed chunks.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::chunker::Chunk;
use crate::model::ChunkRecord;

/// One change needed to bring stored chunks in line with new content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkChange {
    /// A new chunk with no stored counterpart.
    Add { chunk: Chunk },
    /// A new chunk replacing the stored chunk at the same index.
    Update { old_id: Uuid, chunk: Chunk },
    /// A stored chunk whose content no longer appears.
    Delete { id: Uuid },
    /// A stored chunk kept as is but now at `chunk_index`.
    Move { id: Uuid, chunk_index: i32 },
}

/// Result of [`diff_chunks`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkDiff {
    /// New chunks whose content hash matched a stored chunk, moved or not.
    pub unchanged: usize,
    pub changes: Vec<ChunkChange>,
}

impl ChunkDiff {
    /// Returns whether the stored chunks already match.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn added(&self) -> usize {
        self.count(|c| matches!(c, ChunkChange::Add { .. }))
    }

    pub fn updated(&self) -> usize {
        self.count(|c| matches!(c, ChunkChange::Update { .. }))
    }

    pub fn deleted(&self) -> usize {
        self.count(|c| matches!(c, ChunkChange::Delete { .. }))
    }

    pub fn moved(&self) -> usize {
        self.count(|c| matches!(c, ChunkChange::Move { .. }))
    }

    fn count(&self, f: impl Fn(&ChunkChange) -> bool) -> usize {
        self.changes.iter().filter(|c| f(c)).count()
    }
}

/// Diffs stored chunks against new chunks, by content hash first and chunk
/// index second.
///
/// A new chunk whose hash matches a stored chunk is unchanged. A new chunk at
/// the index of a stored chunk whose hash is absent from the new set is an
/// update. Other new chunks are adds; stored chunks left unmatched are deletes.
/// An unchanged chunk whose position differs from its stored index is a move,
/// so after the diff is applied every live chunk carries its new index.
pub fn diff_chunks(existing: &[ChunkRecord], new: &[Chunk]) -> ChunkDiff {
    // Candidates are popped, so the lowest stored index is matched first.
    let mut by_hash: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, record) in existing.iter().enumerate().rev() {
        by_hash.entry(record.content_hash.as_str()).or_default().push(i);
    }
    let by_index: HashMap<i32, usize> = existing
        .iter()
        .enumerate()
        .map(|(i, record)| (record.chunk_index, i))
        .collect();
    let new_hashes: HashSet<&str> = new.iter().map(|c| c.content_hash.as_str()).collect();

    let mut consumed = vec![false; existing.len()];
    let mut unmatched = Vec::new();
    let mut diff = ChunkDiff::default();

    for chunk in new {
        let matched = by_hash
            .get_mut(chunk.content_hash.as_str())
            .and_then(|candidates| candidates.pop());
        match matched {
            Some(i) => {
                consumed[i] = true;
                diff.unchanged += 1;

                let chunk_index = chunk.index as i32;
                if existing[i].chunk_index != chunk_index {
                    diff.changes.push(ChunkChange::Move {
                        id: existing[i].id,
                        chunk_index,
                    });
                }
            }
            None => unmatched.push(chunk),
        }
    }

    for chunk in unmatched {
        let replaceable = by_index.get(&(chunk.index as i32)).copied().filter(|&i| {
            !consumed[i] && !new_hashes.contains(existing[i].content_hash.as_str())
        });
        match replaceable {
            Some(i) => {
                consumed[i] = true;
                diff.changes.push(ChunkChange::Update {
                    old_id: existing[i].id,
                    chunk: chunk.clone(),
                });
            }
            None => diff.changes.push(ChunkChange::Add {
                chunk: chunk.clone(),
            }),
        }
    }

    for (record, used) in existing.iter().zip(consumed) {
        if !used {
            diff.changes.push(ChunkChange::Delete { id: record.id });
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, hash: &str) -> Chunk {
        Chunk {
            index,
            content: format!("content {hash}"),
            start_offset: 0,
            end_offset: 0,
            token_count: 2,
            content_hash: hash.to_owned(),
        }
    }

    fn record(index: i32, hash: &str) -> ChunkRecord {
        ChunkRecord {
            id: Uuid::from_u128(index as u128 + 1),
            document_id: Uuid::nil(),
            chunk_index: index,
            content_hash: hash.to_owned(),
            content: format!("content {hash}"),
        }
    }

    fn existing() -> Vec<ChunkRecord> {
        vec![record(0, "h1"), record(1, "h2"), record(2, "h3")]
    }

    #[test]
    fn test_changed_middle_chunk_is_single_update() {
        let diff = diff_chunks(&existing(), &[chunk(0, "h1"), chunk(1, "h4"), chunk(2, "h3")]);
        assert_eq!(diff.unchanged, 2);
        assert_eq!(diff.updated(), 1);
        assert_eq!(diff.added(), 0);
        assert_eq!(diff.deleted(), 0);
        assert_eq!(
            diff.changes[0],
            ChunkChange::Update {
                old_id: Uuid::from_u128(2),
                chunk: chunk(1, "h4"),
            }
        );
    }

    #[test]
    fn test_removed_chunk_is_single_delete() {
        let diff = diff_chunks(&existing(), &[chunk(0, "h1"), chunk(1, "h3")]);
        assert_eq!(diff.unchanged, 2);
        assert_eq!(
            diff.changes,
            vec![
                ChunkChange::Move {
                    id: Uuid::from_u128(3),
                    chunk_index: 1,
                },
                ChunkChange::Delete { id: Uuid::from_u128(2) },
            ]
        );
    }

    #[test]
    fn test_prepended_chunk_shifts_the_rest() {
        let diff = diff_chunks(
            &existing(),
            &[chunk(0, "h0"), chunk(1, "h1"), chunk(2, "h2"), chunk(3, "h3")],
        );
        assert_eq!(diff.unchanged, 3);
        assert_eq!(diff.added(), 1);
        assert_eq!(diff.updated(), 0);
        assert_eq!(diff.moved(), 3);
        assert!(diff.changes.contains(&ChunkChange::Add { chunk: chunk(0, "h0") }));
        assert!(diff.changes.contains(&ChunkChange::Move {
            id: Uuid::from_u128(3),
            chunk_index: 3,
        }));
    }

    #[test]
    fn test_duplicate_content_matches_in_order() {
        let stored = vec![record(0, "h1"), record(1, "h1")];
        let diff = diff_chunks(&stored, &[chunk(0, "h1"), chunk(1, "h1")]);
        assert!(diff.is_empty());
        assert_eq!(diff.unchanged, 2);
    }

    #[test]
    fn test_appended_chunk_is_add() {
        let diff = diff_chunks(
            &existing(),
            &[chunk(0, "h1"), chunk(1, "h2"), chunk(2, "h3"), chunk(3, "h5")],
        );
        assert_eq!(diff.changes, vec![ChunkChange::Add { chunk: chunk(3, "h5") }]);
    }

    #[test]
    fn test_identical_sets_are_empty() {
        let diff = diff_chunks(&existing(), &[chunk(0, "h1"), chunk(1, "h2"), chunk(2, "h3")]);
        assert!(diff.is_empty());
        assert_eq!(diff.unchanged, 3);
    }

    #[test]
    fn test_from_nothing_everything_is_added() {
        let diff = diff_chunks(&[], &[chunk(0, "a"), chunk(1, "b")]);
        assert_eq!(diff.added(), 2);
        assert_eq!(diff_chunks(&existing(), &[]).deleted(), 3);
    }
}
