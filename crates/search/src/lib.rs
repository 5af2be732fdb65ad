//! DealFlow search library
//!
//! Vector index, retrieval, company feature extraction, fit scoring and
//! ranking. Everything here is in-process and synchronous apart from query
//! embedding.

pub mod index;
pub mod ranking;
pub mod retrieval;
pub mod scoring;

pub use index::{EntryFilter, EntryKind, IndexEntry, IndexStats, SearchHit, VectorIndex};
pub use ranking::{RankOptions, Ranker};
pub use retrieval::{Evidence, RetrievalOrchestrator, RetrievalSettings, SimilarCompany};
pub use scoring::{
    FeatureExtractor, FeatureVector, FitScorer, Recommendation, ScoreResult, ScoreWeights,
    ScoringSettings, TargetProfile,
};
