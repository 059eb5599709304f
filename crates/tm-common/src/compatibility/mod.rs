//! Project-idea and goal compatibility backed by an external reasoning service.
//!
//! The service is injected as a [`ReasoningService`] trait object. Its answers
//! are validated here before any field is trusted, and every failure mode
//! (error, timeout, malformed payload, missing input) resolves to
//! [`NEUTRAL_SCORE`] for that candidate only.

pub mod http;

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::AsRefStr;
use tracing::{debug, warn};

use crate::{
    HackathonGoal, Profile, error::ReasoningError, matching::MatchFilters, normalize::non_blank,
    telemetry,
};

pub use http::HttpReasoningService;

/// Substitute for any AI-derived score that is inapplicable or unavailable.
pub const NEUTRAL_SCORE: f64 = 0.5;

pub const COMPARE_PROJECTS: &str = "compare_projects";
pub const COMPARE_GOALS: &str = "compare_goals";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectComparisonRequest {
    pub project_a: String,
    pub project_b: String,
    pub skills_a: Vec<String>,
    pub skills_b: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalComparisonRequest {
    pub goals_a: Vec<String>,
    pub goals_b: Vec<String>,
    pub skills_a: Vec<String>,
    pub skills_b: Vec<String>,
}

/// External reasoning collaborator.
///
/// Implementations return the raw JSON answer; shape validation happens in
/// [`ProjectComparison::from_response`] and [`GoalComparison::from_response`].
#[async_trait]
pub trait ReasoningService: Send + Sync {
    fn name(&self) -> &'static str;

    async fn compare_projects(
        &self,
        request: &ProjectComparisonRequest,
    ) -> Result<Value, ReasoningError>;

    async fn compare_goals(&self, request: &GoalComparisonRequest)
    -> Result<Value, ReasoningError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectComparison {
    pub compatibility_score: f64,
    pub reasoning: String,
    pub suggested_roles: Vec<String>,
    pub potential_challenges: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProjectComparison {
    #[serde(alias = "compatibility_score")]
    compatibility_score: f64,
    #[serde(default)]
    reasoning: String,
    #[serde(default, alias = "suggested_roles")]
    suggested_roles: Vec<String>,
    #[serde(default, alias = "potential_challenges")]
    potential_challenges: Vec<String>,
}

impl ProjectComparison {
    pub fn from_response(value: &Value) -> Result<Self, ReasoningError> {
        let raw = RawProjectComparison::deserialize(value)?;

        Ok(Self {
            compatibility_score: unit_interval("compatibilityScore", raw.compatibility_score)?,
            reasoning: raw.reasoning,
            suggested_roles: raw.suggested_roles,
            potential_challenges: raw.potential_challenges,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalComparison {
    pub goal_compatibility: f64,
    pub team_vibe_match: f64,
    pub overall_compatibility: f64,
    pub reasoning: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGoalComparison {
    #[serde(alias = "goal_compatibility")]
    goal_compatibility: f64,
    #[serde(alias = "team_vibe_match")]
    team_vibe_match: f64,
    #[serde(alias = "overall_compatibility")]
    overall_compatibility: f64,
    #[serde(default)]
    reasoning: String,
}

impl GoalComparison {
    pub fn from_response(value: &Value) -> Result<Self, ReasoningError> {
        let raw = RawGoalComparison::deserialize(value)?;

        Ok(Self {
            goal_compatibility: unit_interval("goalCompatibility", raw.goal_compatibility)?,
            team_vibe_match: unit_interval("teamVibeMatch", raw.team_vibe_match)?,
            overall_compatibility: unit_interval(
                "overallCompatibility",
                raw.overall_compatibility,
            )?,
            reasoning: raw.reasoning,
        })
    }
}

fn unit_interval(field: &str, value: f64) -> Result<f64, ReasoningError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ReasoningError::Malformed(format!(
            "{field} = {value} is outside [0, 1]"
        )))
    }
}

/// How one AI signal was obtained for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SignalOutcome {
    Ok,
    /// Inputs were missing on either side; no call was made.
    Skipped,
    Failed,
    Timeout,
    Malformed,
}

impl SignalOutcome {
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            SignalOutcome::Failed | SignalOutcome::Timeout | SignalOutcome::Malformed
        )
    }
}

impl From<&ReasoningError> for SignalOutcome {
    fn from(value: &ReasoningError) -> Self {
        match value {
            ReasoningError::Timeout(_) => SignalOutcome::Timeout,
            ReasoningError::Malformed(_) => SignalOutcome::Malformed,
            _ => SignalOutcome::Failed,
        }
    }
}

/// The three AI-derived scores that take part in ranking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompatibilityScores {
    pub project: f64,
    pub goals: f64,
    pub team_vibe: f64,
}

impl Default for CompatibilityScores {
    fn default() -> Self {
        Self {
            project: NEUTRAL_SCORE,
            goals: NEUTRAL_SCORE,
            team_vibe: NEUTRAL_SCORE,
        }
    }
}

/// Advisory output passed through for display; never used for ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompatibilityAnalysis {
    pub project: Option<ProjectComparison>,
    pub goals: Option<GoalComparison>,
}

impl CompatibilityAnalysis {
    pub fn is_empty(&self) -> bool {
        self.project.is_none() && self.goals.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateCompatibility {
    pub scores: CompatibilityScores,
    pub analysis: CompatibilityAnalysis,
    pub project_outcome: SignalOutcome,
    pub goal_outcome: SignalOutcome,
}

impl CandidateCompatibility {
    /// All three scores neutral, with both signals marked as `outcome`.
    pub fn neutral(outcome: SignalOutcome) -> Self {
        Self {
            scores: CompatibilityScores::default(),
            analysis: CompatibilityAnalysis::default(),
            project_outcome: outcome,
            goal_outcome: outcome,
        }
    }

    pub fn failures(&self) -> usize {
        [self.project_outcome, self.goal_outcome]
            .into_iter()
            .filter(|o| o.is_failure())
            .count()
    }
}

/// Query text supplied by the caller, used in place of the current user's own
/// project idea / goals.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompatibilityQuery<'a> {
    pub project_idea: Option<&'a str>,
    pub goals: &'a [HackathonGoal],
}

impl<'a> CompatibilityQuery<'a> {
    pub fn from_filters(filters: &'a MatchFilters) -> Self {
        Self {
            project_idea: non_blank(filters.project_idea_query.as_deref()),
            goals: &filters.goal_query,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Upper bound for one external call, retries included.
    pub timeout: Duration,
    /// Candidates analyzed at the same time.
    pub max_concurrency: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5_000),
            max_concurrency: 4,
        }
    }
}

pub struct CompatibilityAnalyzer {
    service: Arc<dyn ReasoningService>,
    config: AnalyzerConfig,
}

impl CompatibilityAnalyzer {
    pub fn new(service: Arc<dyn ReasoningService>, config: AnalyzerConfig) -> Self {
        Self { service, config }
    }

    /// Analyzes every candidate. The result is index-aligned with `candidates`
    /// regardless of completion order.
    pub async fn analyze_all(
        &self,
        current: &Profile,
        candidates: &[&Profile],
        query: CompatibilityQuery<'_>,
    ) -> Vec<CandidateCompatibility> {
        // 完了順で受け取り、最後に入力順へ並べ直す
        let mut analyzed: Vec<(usize, CandidateCompatibility)> = stream::iter(
            candidates
                .iter()
                .enumerate()
                .map(|(index, candidate)| async move {
                    (index, self.analyze(current, candidate, query).await)
                }),
        )
        .buffer_unordered(self.config.max_concurrency.max(1))
        .collect()
        .await;

        analyzed.sort_unstable_by_key(|(index, _)| *index);
        analyzed.into_iter().map(|(_, result)| result).collect()
    }

    pub async fn analyze(
        &self,
        current: &Profile,
        candidate: &Profile,
        query: CompatibilityQuery<'_>,
    ) -> CandidateCompatibility {
        let (project, goals) = futures::join!(
            self.project_signal(current, candidate, query),
            self.goal_signal(current, candidate, query),
        );

        let (project_score, project_analysis, project_outcome) = project;
        let (goal_scores, goal_analysis, goal_outcome) = goals;

        CandidateCompatibility {
            scores: CompatibilityScores {
                project: project_score,
                goals: goal_scores.0,
                team_vibe: goal_scores.1,
            },
            analysis: CompatibilityAnalysis {
                project: project_analysis,
                goals: goal_analysis,
            },
            project_outcome,
            goal_outcome,
        }
    }

    async fn project_signal(
        &self,
        current: &Profile,
        candidate: &Profile,
        query: CompatibilityQuery<'_>,
    ) -> (f64, Option<ProjectComparison>, SignalOutcome) {
        let Some(request) = project_request(current, candidate, query) else {
            debug!(candidate_id = %candidate.id, "project idea missing; using neutral score");
            telemetry::record_reasoning_call(COMPARE_PROJECTS, SignalOutcome::Skipped);
            return (NEUTRAL_SCORE, None, SignalOutcome::Skipped);
        };

        let result = self
            .bounded(self.service.compare_projects(&request))
            .await
            .and_then(|value| ProjectComparison::from_response(&value));

        match result {
            Ok(comparison) => {
                telemetry::record_reasoning_call(COMPARE_PROJECTS, SignalOutcome::Ok);
                (comparison.compatibility_score, Some(comparison), SignalOutcome::Ok)
            }
            Err(err) => {
                let outcome = SignalOutcome::from(&err);
                self.log_failure(COMPARE_PROJECTS, candidate, &err);
                telemetry::record_reasoning_call(COMPARE_PROJECTS, outcome);
                (NEUTRAL_SCORE, None, outcome)
            }
        }
    }

    async fn goal_signal(
        &self,
        current: &Profile,
        candidate: &Profile,
        query: CompatibilityQuery<'_>,
    ) -> ((f64, f64), Option<GoalComparison>, SignalOutcome) {
        let neutral = (NEUTRAL_SCORE, NEUTRAL_SCORE);

        let Some(request) = goal_request(current, candidate, query) else {
            debug!(candidate_id = %candidate.id, "goals missing; using neutral scores");
            telemetry::record_reasoning_call(COMPARE_GOALS, SignalOutcome::Skipped);
            return (neutral, None, SignalOutcome::Skipped);
        };

        let result = self
            .bounded(self.service.compare_goals(&request))
            .await
            .and_then(|value| GoalComparison::from_response(&value));

        match result {
            Ok(comparison) => {
                telemetry::record_reasoning_call(COMPARE_GOALS, SignalOutcome::Ok);
                (
                    (comparison.goal_compatibility, comparison.team_vibe_match),
                    Some(comparison),
                    SignalOutcome::Ok,
                )
            }
            Err(err) => {
                let outcome = SignalOutcome::from(&err);
                self.log_failure(COMPARE_GOALS, candidate, &err);
                telemetry::record_reasoning_call(COMPARE_GOALS, outcome);
                (neutral, None, outcome)
            }
        }
    }

    async fn bounded<F>(&self, call: F) -> Result<Value, ReasoningError>
    where
        F: Future<Output = Result<Value, ReasoningError>>,
    {
        match tokio::time::timeout(self.config.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ReasoningError::Timeout(self.config.timeout)),
        }
    }

    fn log_failure(&self, operation: &'static str, candidate: &Profile, err: &ReasoningError) {
        warn!(
            service = self.service.name(),
            operation,
            candidate_id = %candidate.id,
            error = %err,
            "reasoning call failed; substituting neutral score"
        );
    }
}

fn project_request(
    current: &Profile,
    candidate: &Profile,
    query: CompatibilityQuery<'_>,
) -> Option<ProjectComparisonRequest> {
    let project_a = query
        .project_idea
        .or_else(|| non_blank(current.project_idea.as_deref()))?;
    let project_b = non_blank(candidate.project_idea.as_deref())?;

    Some(ProjectComparisonRequest {
        project_a: project_a.to_string(),
        project_b: project_b.to_string(),
        skills_a: current.skills.clone(),
        skills_b: candidate.skills.clone(),
    })
}

fn goal_request(
    current: &Profile,
    candidate: &Profile,
    query: CompatibilityQuery<'_>,
) -> Option<GoalComparisonRequest> {
    let goals_a: Vec<String> = if query.goals.is_empty() {
        current.goal_tags()
    } else {
        query.goals.iter().map(|g| g.as_ref().to_string()).collect()
    };

    if goals_a.is_empty() || candidate.goals.is_empty() {
        return None;
    }

    Some(GoalComparisonRequest {
        goals_a,
        goals_b: candidate.goal_tags(),
        skills_a: current.skills.clone(),
        skills_b: candidate.skills.clone(),
    })
}
