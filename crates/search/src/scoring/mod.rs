//! Company features and acquisition-fit scoring

pub mod features;
mod fit;

pub use features::{Feature, FeatureExtractor, FeatureVector};
pub use fit::{
    Confidence, EvidenceContribution, FeatureContribution, FitScorer, Recommendation,
    ScoreResult, ScoreWeights, ScoringSettings, TargetProfile, TargetTerm,
};
