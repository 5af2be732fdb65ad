//! In-memory vector index
//!
//! Entries are spread over a fixed set of shards keyed by entry id. Each shard
//! is a `parking_lot::RwLock` over a map of `Arc`-shared entries:
//! - inserts of different ids mostly land on different shards and hold the
//!   write lock only for the map update
//! - searches hold one shard's read lock at a time while scoring it
//! - results own `Arc` clones, so a concurrent delete never leaves a search
//!   holding dangling data
//!
//! Search is an exact brute-force cosine scan over the eligible entries.

mod entry;
mod filter;
mod similarity;

pub use entry::{profile_entry_id, EntryKind, EntryMetadata, IndexEntry, Span};
pub use filter::EntryFilter;
pub use similarity::{cosine_similarity, cosine_with_norms, l2_norm};

use dealflow_common::config::{EmbeddingConfig, EngineConfig};
use dealflow_common::embeddings::Embedding;
use dealflow_common::errors::{AppError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// One search result
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub entry: Arc<IndexEntry>,
    pub similarity: f32,
}

/// Index-wide counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub entries: usize,
    pub chunk_entries: usize,
    pub profile_entries: usize,
    pub documents: usize,
    pub companies: usize,
    pub model_id: String,
    pub dimension: usize,
    pub shards: usize,
}

#[derive(Clone)]
struct Stored {
    entry: Arc<IndexEntry>,
    norm: f32,
    /// Insertion sequence; newer wins similarity ties
    seq: u64,
}

type Shard = RwLock<HashMap<Uuid, Stored>>;

/// Candidate ordered by similarity, then recency
struct Ranked {
    similarity: f32,
    seq: u64,
    entry: Arc<IndexEntry>,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.similarity
            .total_cmp(&other.similarity)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Sharded, internally synchronized vector store bound to one embedding model
pub struct VectorIndex {
    model_id: String,
    dimension: usize,
    shards: Vec<Shard>,
    sequence: AtomicU64,
}

impl VectorIndex {
    /// Create an empty index accepting vectors of `model_id` with `dimension` components
    pub fn new(model_id: impl Into<String>, dimension: usize, shards: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(AppError::invalid_argument("index dimension must be positive"));
        }
        if shards == 0 {
            return Err(AppError::invalid_argument("index needs at least one shard"));
        }
        Ok(Self {
            model_id: model_id.into(),
            dimension,
            shards: (0..shards).map(|_| RwLock::new(HashMap::new())).collect(),
            sequence: AtomicU64::new(0),
        })
    }

    pub fn from_config(embedding: &EmbeddingConfig, engine: &EngineConfig) -> Result<Self> {
        Self::new(embedding.model.clone(), embedding.dimension, engine.index_shards)
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn shard(&self, id: &Uuid) -> &Shard {
        let n = self.shards.len() as u128;
        &self.shards[(id.as_u128() % n) as usize]
    }

    fn check_model(&self, model_id: &str) -> Result<()> {
        if model_id != self.model_id {
            return Err(AppError::ModelMismatch {
                expected: self.model_id.clone(),
                actual: model_id.to_string(),
            });
        }
        Ok(())
    }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(AppError::invalid_argument(format!(
                "vector dimension {} does not match index dimension {}",
                vector.len(),
                self.dimension
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(AppError::invalid_argument("vector contains non-finite values"));
        }
        Ok(())
    }

    /// Whether [`insert`](Self::insert) would accept this embedding
    pub fn check_embedding(&self, embedding: &Embedding) -> Result<()> {
        self.check_model(&embedding.model_id)?;
        self.check_vector(&embedding.vector)
    }

    /// Add or replace an entry by id. Returns `true` when an entry was replaced.
    pub fn insert(&self, entry: IndexEntry) -> Result<bool> {
        self.check_embedding(&entry.embedding)?;

        let norm = l2_norm(&entry.embedding.vector);
        let id = entry.id;
        let mut shard = self.shard(&id).write();
        let seq = self.sequence.fetch_add(1, AtomicOrdering::Relaxed);
        let replaced = shard
            .insert(
                id,
                Stored {
                    entry: Arc::new(entry),
                    norm,
                    seq,
                },
            )
            .is_some();
        Ok(replaced)
    }

    /// Remove an entry. Returns whether it existed.
    pub fn delete(&self, id: &Uuid) -> bool {
        self.shard(id).write().remove(id).is_some()
    }

    /// Cascade-delete every entry belonging to a document
    pub fn delete_document(&self, document_id: &Uuid) -> usize {
        self.remove_where(|e| e.metadata.document_id.as_ref() == Some(document_id))
    }

    /// Remove chunks of a document whose ordinal is at or beyond `keep_ordinals_below`.
    ///
    /// Used after re-ingesting a document that now yields fewer chunks.
    pub fn prune_document(&self, document_id: &Uuid, keep_ordinals_below: u32) -> usize {
        self.remove_where(|e| {
            e.metadata.kind == EntryKind::Chunk
                && e.metadata.document_id.as_ref() == Some(document_id)
                && e.metadata.ordinal >= keep_ordinals_below
        })
    }

    fn remove_where(&self, predicate: impl Fn(&IndexEntry) -> bool) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut map = shard.write();
            let before = map.len();
            map.retain(|_, stored| !predicate(&stored.entry));
            removed += before - map.len();
        }
        removed
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<IndexEntry>> {
        self.shard(id).read().get(id).map(|s| Arc::clone(&s.entry))
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.shard(id).read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.read().is_empty())
    }

    pub fn stats(&self) -> IndexStats {
        let mut entries = 0;
        let mut chunk_entries = 0;
        let mut documents = HashSet::new();
        let mut companies = HashSet::new();

        for shard in &self.shards {
            let map = shard.read();
            entries += map.len();
            for stored in map.values() {
                let meta = &stored.entry.metadata;
                if meta.kind == EntryKind::Chunk {
                    chunk_entries += 1;
                }
                if let Some(doc) = meta.document_id {
                    documents.insert(doc);
                }
                companies.insert(meta.company_id);
            }
        }

        IndexStats {
            entries,
            chunk_entries,
            profile_entries: entries - chunk_entries,
            documents: documents.len(),
            companies: companies.len(),
            model_id: self.model_id.clone(),
            dimension: self.dimension,
            shards: self.shards.len(),
        }
    }

    /// Audit every stored entry against the index invariants.
    ///
    /// Returns the number of entries checked.
    pub fn validate(&self) -> Result<usize> {
        let mut checked = 0;
        for shard in &self.shards {
            let map = shard.read();
            for (key, stored) in map.iter() {
                let entry = &stored.entry;
                let fault = if *key != entry.id {
                    Some(format!("entry {} stored under key {}", entry.id, key))
                } else if entry.embedding.model_id != self.model_id {
                    Some(format!(
                        "entry {} has model '{}', index uses '{}'",
                        entry.id, entry.embedding.model_id, self.model_id
                    ))
                } else if entry.embedding.vector.len() != self.dimension {
                    Some(format!(
                        "entry {} has dimension {}, index uses {}",
                        entry.id,
                        entry.embedding.vector.len(),
                        self.dimension
                    ))
                } else if entry.metadata.kind == EntryKind::Chunk
                    && (entry.metadata.document_id.is_none() || entry.metadata.span.is_none())
                {
                    Some(format!("chunk entry {} lacks its document reference", entry.id))
                } else {
                    None
                };

                if let Some(message) = fault {
                    error!(entry_id = %entry.id, %message, "Index invariant violated");
                    return Err(AppError::IndexCorruption { message });
                }
                checked += 1;
            }
        }
        Ok(checked)
    }

    /// Top `k` entries by cosine similarity to `query`, best first.
    ///
    /// Equal similarities rank the most recently inserted entry first. The
    /// filter is applied before the cut, so the result holds the best `k`
    /// eligible entries.
    pub fn search(
        &self,
        query: &Embedding,
        k: usize,
        filter: Option<&EntryFilter>,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(AppError::invalid_argument("k must be positive"));
        }
        self.check_model(&query.model_id)?;
        self.check_vector(&query.vector)?;

        let query_norm = l2_norm(&query.vector);
        let capacity = k.min(self.len()).saturating_add(1);
        let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(capacity);
        let mut scanned = 0usize;

        for shard in &self.shards {
            let map = shard.read();
            for stored in map.values() {
                let entry = &stored.entry;
                if let Some(f) = filter {
                    if !f.matches(&entry.metadata) {
                        continue;
                    }
                }
                if entry.embedding.vector.len() != self.dimension {
                    let message = format!(
                        "entry {} has dimension {}, index uses {}",
                        entry.id,
                        entry.embedding.vector.len(),
                        self.dimension
                    );
                    error!(entry_id = %entry.id, %message, "Index invariant violated during search");
                    return Err(AppError::IndexCorruption { message });
                }

                scanned += 1;
                let similarity =
                    cosine_with_norms(&query.vector, query_norm, &entry.embedding.vector, stored.norm);
                heap.push(Reverse(Ranked {
                    similarity,
                    seq: stored.seq,
                    entry: Arc::clone(entry),
                }));
                if heap.len() > k {
                    heap.pop();
                }
            }
        }

        let hits: Vec<SearchHit> = heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(r)| SearchHit {
                entry: r.entry,
                similarity: r.similarity,
            })
            .collect();

        debug!(k, scanned, returned = hits.len(), "Vector search complete");
        Ok(hits)
    }
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("model_id", &self.model_id)
            .field("dimension", &self.dimension)
            .field("shards", &self.shards.len())
            .field("entries", &self.len())
            .finish()
    }
}
