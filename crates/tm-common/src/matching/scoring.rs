use serde::Serialize;

use super::{
    baseline::{LowSignalBaseline, is_low_signal},
    similarity::{FieldAgreement, FieldPolicy, ProfileField, cosine_similarity},
    vocabulary::{TermVector, VectorSpace},
    weights::{BASIC_WEIGHTS, ENHANCED_WEIGHTS, Weights},
};
use crate::{Profile, compatibility::CompatibilityScores};

/// Component scores behind one candidate's combined score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub skill_similarity: f64,
    pub field_similarity: f64,
    pub project_compatibility: Option<f64>,
    pub goal_compatibility: Option<f64>,
    pub team_vibe_match: Option<f64>,
    /// Set when the combined score is the low-signal baseline rather than a weighted sum.
    pub low_signal_fallback: bool,
    pub shared_skills: Vec<String>,
    pub matched_fields: Vec<ProfileField>,
}

impl ScoreBreakdown {
    /// Skill and field signals between the current user and one candidate.
    pub fn base(
        space: &VectorSpace,
        current_vector: &TermVector,
        candidate_vector: &TermVector,
        current: &Profile,
        candidate: &Profile,
        policy: FieldPolicy,
    ) -> Self {
        let agreement = FieldAgreement::between(current, candidate);

        Self {
            skill_similarity: cosine_similarity(
                current_vector.as_slice(),
                candidate_vector.as_slice(),
            ),
            field_similarity: agreement.similarity(policy),
            project_compatibility: None,
            goal_compatibility: None,
            team_vibe_match: None,
            low_signal_fallback: false,
            shared_skills: space.shared_terms(current_vector, candidate_vector),
            matched_fields: agreement.matched,
        }
    }

    pub fn is_low_signal(&self) -> bool {
        is_low_signal(self.skill_similarity, self.field_similarity)
    }
}

pub struct ScoringEngine {
    weights: Weights,
}

impl ScoringEngine {
    pub fn new(weights: Weights) -> Self {
        Self { weights }
    }

    pub fn basic() -> Self {
        Self::new(BASIC_WEIGHTS)
    }

    pub fn enhanced() -> Self {
        Self::new(ENHANCED_WEIGHTS)
    }

    /// スキル + 属性の加重和。比較可能な情報が何もない場合は低シグナル用の
    /// ベースライン値を返す。
    pub fn score_basic(
        &self,
        breakdown: &mut ScoreBreakdown,
        baseline: &mut LowSignalBaseline,
    ) -> f64 {
        if breakdown.is_low_signal() {
            breakdown.low_signal_fallback = true;
            return baseline.sample();
        }

        breakdown.skill_similarity * self.weights.skills
            + breakdown.field_similarity * self.weights.fields
    }

    /// Weighted sum of all five signals. `compat` carries neutral values for any
    /// signal that was inapplicable or failed.
    pub fn score_enhanced(
        &self,
        breakdown: &mut ScoreBreakdown,
        compat: &CompatibilityScores,
    ) -> f64 {
        breakdown.project_compatibility = Some(compat.project);
        breakdown.goal_compatibility = Some(compat.goals);
        breakdown.team_vibe_match = Some(compat.team_vibe);

        breakdown.skill_similarity * self.weights.skills
            + breakdown.field_similarity * self.weights.fields
            + compat.project * self.weights.project
            + compat.goals * self.weights.goals
            + compat.team_vibe * self.weights.team_vibe
    }
}
