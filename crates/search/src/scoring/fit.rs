//! Acquisition-fit scoring
//!
//! Fuses two sub-scores into one composite in [0, 1]:
//! - relevance: rank-decayed weighted mean of evidence similarities
//! - financial: weighted agreement of the feature vector with a target profile
//!
//! Every score carries the evidence and feature contributions that produced it.

use super::features::{self, FeatureVector};
use crate::retrieval::Evidence;
use dealflow_common::config::{EngineConfig, ScoreWeightsConfig};
use dealflow_common::errors::{AppError, Result};
use dealflow_common::models::{CompanyRecord, Industry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Relative weight of relevance and financial fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub relevance: f64,
    pub financial: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeightsConfig::default().into()
    }
}

impl From<ScoreWeightsConfig> for ScoreWeights {
    fn from(config: ScoreWeightsConfig) -> Self {
        Self {
            relevance: config.relevance,
            financial: config.financial,
        }
    }
}

impl ScoreWeights {
    pub fn new(relevance: f64, financial: f64) -> Self {
        Self { relevance, financial }
    }

    /// Scale to sum 1. Negative, non-finite or all-zero weights are rejected.
    pub fn normalized(&self) -> Result<ScoreWeights> {
        let (r, f) = (self.relevance, self.financial);
        if !r.is_finite() || !f.is_finite() {
            return Err(AppError::invalid_argument("score weights must be finite"));
        }
        if r < 0.0 || f < 0.0 {
            return Err(AppError::invalid_argument("score weights must be non-negative"));
        }
        let sum = r + f;
        if sum <= 0.0 {
            return Err(AppError::invalid_argument("score weights must not both be zero"));
        }
        Ok(ScoreWeights::new(r / sum, f / sum))
    }
}

/// Desired value and importance of one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetTerm {
    pub target: f64,
    #[serde(default = "default_term_weight")]
    pub weight: f64,
}

fn default_term_weight() -> f64 {
    1.0
}

/// What an ideal acquisition looks like, per feature name.
///
/// Ordered map so summation order, and therefore the score, is reproducible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetProfile {
    pub terms: BTreeMap<String, TargetTerm>,
}

impl Default for TargetProfile {
    /// Growing, profitable, sizeable businesses
    fn default() -> Self {
        Self::empty()
            .with_term(features::GROWTH, 1.0, 2.0)
            .with_term(features::PROFIT_MARGIN, 1.0, 1.5)
            .with_term(features::REVENUE_SCALE, 1.0, 1.0)
            .with_term(features::EMPLOYEE_SCALE, 0.5, 0.5)
            .with_term(features::MATURITY, 0.5, 0.5)
    }
}

impl TargetProfile {
    pub fn empty() -> Self {
        Self {
            terms: BTreeMap::new(),
        }
    }

    pub fn with_term(mut self, feature: impl Into<String>, target: f64, weight: f64) -> Self {
        self.terms.insert(feature.into(), TargetTerm { target, weight });
        self
    }

    /// Prefer companies in `industry`
    pub fn with_industry(self, industry: Industry, weight: f64) -> Self {
        self.with_term(features::industry_feature(industry), 1.0, weight)
    }

    pub fn validate(&self) -> Result<()> {
        let known = features::feature_names();
        for (name, term) in &self.terms {
            if !known.contains(name) {
                return Err(AppError::invalid_argument(format!("unknown feature '{}'", name)));
            }
            if !term.target.is_finite() {
                return Err(AppError::invalid_argument(format!(
                    "target for '{}' must be finite",
                    name
                )));
            }
            if !term.weight.is_finite() || term.weight < 0.0 {
                return Err(AppError::invalid_argument(format!(
                    "weight for '{}' must be finite and non-negative",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Acquisition recommendation derived from the composite score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Buy,
    Hold,
    Pass,
}

impl Recommendation {
    pub fn from_score(score: f64) -> Self {
        if score > 0.7 {
            Recommendation::Buy
        } else if score > 0.4 {
            Recommendation::Hold
        } else {
            Recommendation::Pass
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Buy => "BUY",
            Recommendation::Hold => "HOLD",
            Recommendation::Pass => "PASS",
        }
    }
}

/// How far the score sits from the undecided midpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn from_score(score: f64) -> Self {
        let distance = (score - 0.5).abs();
        if distance > 0.3 {
            Confidence::High
        } else if distance > 0.15 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// One evidence item's share of the relevance sub-score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceContribution {
    pub evidence: Evidence,
    pub rank: usize,

    /// Rank-decay weight
    pub weight: f64,

    /// Similarity clamped to [0, 1]
    pub similarity: f64,

    /// Share of the relevance sub-score
    pub contribution: f64,
}

/// One feature's share of the financial sub-score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub name: String,
    pub value: f64,
    pub present: bool,
    pub target: f64,
    pub weight: f64,

    /// Share of the financial sub-score before clipping
    pub contribution: f64,
}

/// Composite fit score with a full breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub company_id: Uuid,
    pub company_name: String,
    pub score: f64,
    pub relevance: f64,
    pub financial: f64,

    /// Normalized weights actually applied
    pub weights: ScoreWeights,
    pub evidence: Vec<EvidenceContribution>,
    pub features: Vec<FeatureContribution>,
    pub recommendation: Recommendation,
    pub confidence: Confidence,
}

/// Scoring tuning taken from the engine configuration
#[derive(Debug, Clone)]
pub struct ScoringSettings {
    pub max_evidence: usize,
    pub relevance_decay: f64,
    pub relevance_decay_floor: f64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for ScoringSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_evidence: config.max_evidence,
            relevance_decay: config.relevance_decay,
            relevance_decay_floor: config.relevance_decay_floor,
        }
    }
}

/// Deterministic fit scorer against a target profile
#[derive(Debug, Clone)]
pub struct FitScorer {
    settings: ScoringSettings,
    target: TargetProfile,
}

impl FitScorer {
    pub fn new(settings: ScoringSettings, target: TargetProfile) -> Result<Self> {
        if settings.max_evidence == 0 {
            return Err(AppError::invalid_argument("max_evidence must be positive"));
        }
        let decay_ok = settings.relevance_decay.is_finite() && settings.relevance_decay >= 0.0;
        let floor_ok = settings.relevance_decay_floor.is_finite()
            && settings.relevance_decay_floor > 0.0
            && settings.relevance_decay_floor <= 1.0;
        if !decay_ok || !floor_ok {
            return Err(AppError::invalid_argument(
                "relevance decay must be non-negative and its floor in (0, 1]",
            ));
        }
        target.validate()?;
        Ok(Self { settings, target })
    }

    pub fn target(&self) -> &TargetProfile {
        &self.target
    }

    /// Same settings, different target profile
    pub fn with_target(&self, target: TargetProfile) -> Result<Self> {
        Self::new(self.settings.clone(), target)
    }

    /// Rank-decay weight for 0-based rank `r`
    fn rank_weight(&self, rank: usize) -> f64 {
        (1.0 - self.settings.relevance_decay * rank as f64).max(self.settings.relevance_decay_floor)
    }

    /// Relevance sub-score over the leading evidence, in the order supplied
    pub fn relevance(&self, evidence: &[Evidence]) -> (f64, Vec<EvidenceContribution>) {
        let considered: Vec<(usize, &Evidence, f64, f64)> = evidence
            .iter()
            .take(self.settings.max_evidence)
            .enumerate()
            .map(|(rank, e)| {
                let similarity = f64::from(e.similarity).clamp(0.0, 1.0);
                (rank, e, self.rank_weight(rank), similarity)
            })
            .collect();

        let weight_sum: f64 = considered.iter().map(|(_, _, w, _)| w).sum();
        if weight_sum == 0.0 {
            return (0.0, Vec::new());
        }

        let mut relevance = 0.0;
        let contributions = considered
            .into_iter()
            .map(|(rank, e, weight, similarity)| {
                let contribution = weight * similarity / weight_sum;
                relevance += contribution;
                EvidenceContribution {
                    evidence: e.clone(),
                    rank,
                    weight,
                    similarity,
                    contribution,
                }
            })
            .collect();

        (relevance.clamp(0.0, 1.0), contributions)
    }

    /// Financial sub-score: Σ wᵢ·tᵢ·vᵢ / Σ wᵢ·|tᵢ|, clipped to [0, 1]
    pub fn financial(&self, features: &FeatureVector) -> (f64, Vec<FeatureContribution>) {
        let denominator: f64 = self
            .target
            .terms
            .values()
            .map(|t| t.weight * t.target.abs())
            .sum();

        let contributions: Vec<FeatureContribution> = features
            .iter()
            .map(|feature| {
                let term = self.target.terms.get(&feature.name).copied();
                let (target, weight) = term.map_or((0.0, 0.0), |t| (t.target, t.weight));
                let contribution = if denominator > 0.0 {
                    weight * target * feature.value / denominator
                } else {
                    0.0
                };
                FeatureContribution {
                    name: feature.name.clone(),
                    value: feature.value,
                    present: feature.present,
                    target,
                    weight,
                    contribution,
                }
            })
            .collect();

        let raw: f64 = contributions.iter().map(|c| c.contribution).sum();
        (raw.clamp(0.0, 1.0), contributions)
    }

    /// Score one company from its evidence and features
    pub fn score(
        &self,
        company: &CompanyRecord,
        evidence: &[Evidence],
        features: &FeatureVector,
        weights: ScoreWeights,
    ) -> Result<ScoreResult> {
        let weights = weights.normalized()?;
        let (relevance, evidence) = self.relevance(evidence);
        let (financial, features) = self.financial(features);

        let score = (weights.relevance * relevance + weights.financial * financial).clamp(0.0, 1.0);

        Ok(ScoreResult {
            company_id: company.id,
            company_name: company.name.clone(),
            score,
            relevance,
            financial,
            weights,
            evidence,
            features,
            recommendation: Recommendation::from_score(score),
            confidence: Confidence::from_score(score),
        })
    }
}
