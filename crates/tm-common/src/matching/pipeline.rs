use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashSet},
    sync::Arc,
    time::Instant,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{Instrument, debug, info, info_span};

use super::{
    baseline::LowSignalBaseline,
    prefilter::{ExclusionReason, FilterEngine, MatchFilters},
    scoring::{ScoreBreakdown, ScoringEngine},
    vocabulary::VectorSpace,
};
use crate::{
    Profile,
    compatibility::{
        CandidateCompatibility, CompatibilityAnalysis, CompatibilityAnalyzer, CompatibilityQuery,
        ReasoningService, SignalOutcome,
    },
    config::{MatchMode, RankerConfig},
    error::RankError,
    run_id, telemetry,
};

/// One surviving candidate with its combined score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub candidate: Profile,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    /// Advisory text from the reasoning service, when it answered.
    pub analysis: Option<CompatibilityAnalysis>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankingSummary {
    /// Candidates handed in, before filtering.
    pub considered: usize,
    pub excluded: BTreeMap<ExclusionReason, usize>,
    pub ranked: usize,
    pub low_signal_fallbacks: usize,
    /// Reasoning signals that failed, timed out or came back malformed.
    pub reasoning_failures: usize,
}

impl RankingSummary {
    pub fn excluded_total(&self) -> usize {
        self.excluded.values().sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Ranking {
    pub run_id: String,
    /// Shared by every ranking produced by this process.
    pub process_id: String,
    pub ranked_at: DateTime<Utc>,
    pub mode: MatchMode,
    /// Descending by score; equal scores keep input order.
    pub results: Vec<MatchResult>,
    pub summary: RankingSummary,
}

pub struct MatchRanker {
    config: RankerConfig,
    filter: FilterEngine,
    analyzer: Option<CompatibilityAnalyzer>,
}

impl MatchRanker {
    pub fn new(config: RankerConfig) -> Self {
        Self {
            filter: FilterEngine::new(config.candidate_pool),
            config,
            analyzer: None,
        }
    }

    /// Enhanced mode consults `service`; without one every AI signal is neutral.
    pub fn with_reasoning_service(mut self, service: Arc<dyn ReasoningService>) -> Self {
        self.analyzer = Some(CompatibilityAnalyzer::new(
            service,
            self.config.analyzer.clone(),
        ));
        self
    }

    pub async fn rank(
        &self,
        current: Option<&Profile>,
        candidates: &[Profile],
        filters: &MatchFilters,
        excluded_ids: &HashSet<String>,
    ) -> Result<Vec<MatchResult>, RankError> {
        Ok(self
            .rank_detailed(current, candidates, filters, excluded_ids)
            .await?
            .results)
    }

    pub async fn rank_detailed(
        &self,
        current: Option<&Profile>,
        candidates: &[Profile],
        filters: &MatchFilters,
        excluded_ids: &HashSet<String>,
    ) -> Result<Ranking, RankError> {
        let mut baseline = LowSignalBaseline::new(self.config.baseline_seed);
        self.rank_detailed_with(current, candidates, filters, excluded_ids, &mut baseline)
            .await
    }

    /// Same as [`Self::rank_detailed`] with a caller-owned low-signal baseline.
    pub async fn rank_detailed_with(
        &self,
        current: Option<&Profile>,
        candidates: &[Profile],
        filters: &MatchFilters,
        excluded_ids: &HashSet<String>,
        baseline: &mut LowSignalBaseline,
    ) -> Result<Ranking, RankError> {
        let run_id = run_id::generate();
        let span = info_span!(
            "rank",
            run_id = %run_id,
            process_id = run_id::process(),
            mode = self.config.mode.as_ref()
        );

        self.run(run_id, current, candidates, filters, excluded_ids, baseline)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        run_id: String,
        current: Option<&Profile>,
        candidates: &[Profile],
        filters: &MatchFilters,
        excluded_ids: &HashSet<String>,
        baseline: &mut LowSignalBaseline,
    ) -> Result<Ranking, RankError> {
        let started = Instant::now();
        let mode = self.config.mode;
        let current = current.ok_or(RankError::MissingCurrentUser)?;
        current.validate()?;

        let mut summary = RankingSummary {
            considered: candidates.len(),
            ..RankingSummary::default()
        };

        let outcome = self
            .filter
            .filter_candidates(current, candidates, filters, excluded_ids);
        for (candidate, reason) in &outcome.excluded {
            debug!(candidate_id = %candidate.id, reason = reason.as_ref(), "candidate excluded");
            telemetry::record_exclusion(*reason);
            *summary.excluded.entry(*reason).or_default() += 1;
        }
        // excluded candidates are never scored and are not validated
        for candidate in &outcome.accepted {
            candidate.validate()?;
        }

        let mut results = self
            .score_candidates(current, &outcome.accepted, filters, baseline, &mut summary)
            .await;

        // sort_by は安定ソートなので同点は入力順のまま
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        summary.ranked = results.len();
        telemetry::record_low_signal_fallbacks(summary.low_signal_fallbacks);
        telemetry::record_rank_call(mode, started.elapsed());

        info!(
            considered = summary.considered,
            excluded = summary.excluded_total(),
            ranked = summary.ranked,
            low_signal_fallbacks = summary.low_signal_fallbacks,
            reasoning_failures = summary.reasoning_failures,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ranking complete"
        );

        Ok(Ranking {
            run_id,
            process_id: run_id::process().to_string(),
            ranked_at: Utc::now(),
            mode,
            results,
            summary,
        })
    }

    async fn score_candidates(
        &self,
        current: &Profile,
        accepted: &[&Profile],
        filters: &MatchFilters,
        baseline: &mut LowSignalBaseline,
        summary: &mut RankingSummary,
    ) -> Vec<MatchResult> {
        let mut profiles = Vec::with_capacity(accepted.len() + 1);
        profiles.push(current);
        profiles.extend(accepted.iter().copied());
        let space = VectorSpace::build(&profiles);

        let current_vector = &space.vectors[0];
        let policy = self.config.field_policy();
        let breakdowns = accepted
            .iter()
            .zip(&space.vectors[1..])
            .map(|(candidate, vector)| {
                ScoreBreakdown::base(&space, current_vector, vector, current, candidate, policy)
            });

        match self.config.mode {
            MatchMode::Basic => {
                let engine = ScoringEngine::basic();
                accepted
                    .iter()
                    .zip(breakdowns)
                    .map(|(candidate, mut breakdown)| {
                        let score = engine.score_basic(&mut breakdown, baseline);
                        if breakdown.low_signal_fallback {
                            summary.low_signal_fallbacks += 1;
                        }
                        MatchResult {
                            candidate: (*candidate).clone(),
                            score,
                            breakdown,
                            analysis: None,
                        }
                    })
                    .collect()
            }
            MatchMode::Enhanced => {
                let breakdowns: Vec<_> = breakdowns.collect();
                let compat = self.compatibility(current, accepted, filters).await;
                let engine = ScoringEngine::enhanced();

                accepted
                    .iter()
                    .zip(breakdowns)
                    .zip(compat)
                    .map(|((candidate, mut breakdown), compat)| {
                        summary.reasoning_failures += compat.failures();
                        let score = engine.score_enhanced(&mut breakdown, &compat.scores);
                        MatchResult {
                            candidate: (*candidate).clone(),
                            score,
                            breakdown,
                            analysis: (!compat.analysis.is_empty()).then_some(compat.analysis),
                        }
                    })
                    .collect()
            }
        }
    }

    async fn compatibility(
        &self,
        current: &Profile,
        accepted: &[&Profile],
        filters: &MatchFilters,
    ) -> Vec<CandidateCompatibility> {
        match &self.analyzer {
            Some(analyzer) => {
                analyzer
                    .analyze_all(current, accepted, CompatibilityQuery::from_filters(filters))
                    .await
            }
            None => {
                debug!("no reasoning service configured; AI signals are neutral");
                vec![CandidateCompatibility::neutral(SignalOutcome::Skipped); accepted.len()]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::mock::StepRng;

    use super::*;
    use crate::{
        compatibility::{NEUTRAL_SCORE, testing::MockReasoningService},
        matching::{
            CandidatePool, FieldPolicy,
            baseline::{LOW_SIGNAL_BASELINE_MAX, LOW_SIGNAL_BASELINE_MIN},
        },
    };

    fn person(id: &str, skills: &[&str]) -> Profile {
        Profile {
            name: Some(format!("Person {id}")),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            ..Profile::new(id)
        }
    }

    fn basic_ranker() -> MatchRanker {
        MatchRanker::new(RankerConfig {
            baseline_seed: Some(42),
            ..RankerConfig::basic()
        })
    }

    fn ids(results: &[MatchResult]) -> Vec<&str> {
        results.iter().map(|r| r.candidate.id.as_str()).collect()
    }

    async fn rank_all(ranker: &MatchRanker, me: &Profile, pool: &[Profile]) -> Ranking {
        ranker
            .rank_detailed(Some(me), pool, &MatchFilters::default(), &HashSet::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn missing_current_user_is_the_only_hard_failure() {
        let ranker = basic_ranker();
        let err = ranker
            .rank(None, &[person("a", &["Rust"])], &MatchFilters::default(), &HashSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RankError::MissingCurrentUser));
    }

    #[tokio::test]
    async fn out_of_range_ratings_are_rejected() {
        let ranker = basic_ranker();
        let me = person("me", &["Rust"]);
        let mut broken = person("broken", &["Rust"]);
        broken.ratings.backend = Some(9);

        let err = ranker
            .rank(Some(&me), &[broken], &MatchFilters::default(), &HashSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RankError::InvalidProfile { ref id, .. } if id == "broken"));
    }

    #[tokio::test]
    async fn excluded_candidates_are_not_validated() {
        let ranker = basic_ranker();
        let me = person("me", &["Rust"]);
        let mut decided = person("decided", &["Rust"]);
        decided.ratings.backend = Some(9);
        let mut myself = me.clone();
        myself.ratings.frontend = Some(0);
        let pool = vec![decided, myself, person("ok", &["Rust"])];
        let seen: HashSet<String> = ["decided".to_string()].into_iter().collect();

        let ranking = ranker
            .rank_detailed(Some(&me), &pool, &MatchFilters::default(), &seen)
            .await
            .unwrap();

        assert_eq!(ids(&ranking.results), vec!["ok"]);
        assert_eq!(ranking.summary.excluded[&ExclusionReason::AlreadyDecided], 1);
        assert_eq!(ranking.summary.excluded[&ExclusionReason::SelfMatch], 1);
    }

    #[tokio::test]
    async fn rankings_carry_run_and_process_ids() {
        let ranker = basic_ranker();
        let me = person("me", &["Rust"]);

        let first = rank_all(&ranker, &me, &[person("a", &["Rust"])]).await;
        let second = rank_all(&ranker, &me, &[person("a", &["Rust"])]).await;

        assert_eq!(first.process_id, run_id::process());
        assert_eq!(first.process_id, second.process_id);
        assert_ne!(first.run_id, second.run_id);
        assert_ne!(first.run_id, first.process_id);
    }

    #[tokio::test]
    async fn empty_pool_is_an_empty_ranking() {
        let ranking = rank_all(&basic_ranker(), &person("me", &["Rust"]), &[]).await;
        assert!(ranking.results.is_empty());
        assert_eq!(ranking.summary, RankingSummary::default());
        assert_eq!(ranking.run_id.len(), 26);
    }

    #[tokio::test]
    async fn shared_skills_order_basic_ranking() {
        let me = person("me", &["React", "Python"]);
        let pool = vec![
            person("a", &["React", "Node"]),
            person("b", &["React", "Python"]),
        ];

        let ranking = rank_all(&basic_ranker(), &me, &pool).await;

        assert_eq!(ids(&ranking.results), vec!["b", "a"]);
        let b = &ranking.results[0];
        let a = &ranking.results[1];
        assert!((b.breakdown.skill_similarity - 1.0).abs() < 1e-12);
        assert!((a.breakdown.skill_similarity - 0.5).abs() < 1e-12);
        assert!((b.score - 0.5).abs() < 1e-12);
        assert!((a.score - 0.25).abs() < 1e-12);
        assert_eq!(a.breakdown.shared_skills, vec!["react"]);
        assert!(b.analysis.is_none());
    }

    #[tokio::test]
    async fn zero_signal_candidates_get_the_fallback_band() {
        let mut me = person("me", &["Rust", "Go"]);
        me.school = Some("MIT".into());
        me.ratings.backend = Some(3);
        let blank = person("blank", &[]);

        let ranking = rank_all(&basic_ranker(), &me, &[blank]).await;

        assert_eq!(ranking.results.len(), 1);
        let result = &ranking.results[0];
        assert!(result.breakdown.low_signal_fallback);
        assert!((LOW_SIGNAL_BASELINE_MIN..=LOW_SIGNAL_BASELINE_MAX).contains(&result.score));
        assert_eq!(ranking.summary.low_signal_fallbacks, 1);
    }

    #[tokio::test]
    async fn injected_baseline_makes_fallback_exact() {
        let ranker = basic_ranker();
        let me = person("me", &["Rust"]);
        let pool = vec![person("x", &["Cobol"])];

        // StepRng(0, 0) always yields the lower bound.
        let mut baseline = LowSignalBaseline::from_rng(StepRng::new(0, 0));
        let ranking = ranker
            .rank_detailed_with(
                Some(&me),
                &pool,
                &MatchFilters::default(),
                &HashSet::new(),
                &mut baseline,
            )
            .await
            .unwrap();

        assert_eq!(ranking.results[0].score, LOW_SIGNAL_BASELINE_MIN);
    }

    #[tokio::test]
    async fn seeded_rankings_are_reproducible() {
        let ranker = basic_ranker();
        let me = person("me", &["Rust"]);
        let pool: Vec<_> = (0..5).map(|i| person(&format!("c{i}"), &["Haskell"])).collect();

        let first = rank_all(&ranker, &me, &pool).await;
        let second = rank_all(&ranker, &me, &pool).await;

        let scores = |r: &Ranking| r.results.iter().map(|m| m.score).collect::<Vec<_>>();
        assert_eq!(scores(&first), scores(&second));
        assert_ne!(first.run_id, second.run_id);
    }

    #[tokio::test]
    async fn equal_scores_keep_input_order() {
        let me = person("me", &["Rust"]);
        let pool = vec![
            person("first", &["Rust"]),
            person("second", &["Rust"]),
            person("third", &["Rust"]),
        ];

        let ranking = rank_all(&basic_ranker(), &me, &pool).await;

        assert_eq!(ids(&ranking.results), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn filters_prune_before_scoring_and_are_counted() {
        let me = person("me", &["Rust"]);
        let mut large = person("large", &["Rust"]);
        large.preferred_team_size = Some(6);
        let mut idle = person("idle", &["Rust"]);
        idle.availability_hours = Some(2);
        let pool = vec![
            me.clone(),
            large,
            idle,
            person("seen", &["Rust"]),
            Profile::new("ghost"),
            person("ok", &["Rust"]),
        ];
        let filters = MatchFilters {
            max_team_size: Some(4),
            min_availability: Some(8),
            ..MatchFilters::default()
        };
        let seen: HashSet<String> = ["seen".to_string()].into_iter().collect();

        let ranking = basic_ranker()
            .rank_detailed(Some(&me), &pool, &filters, &seen)
            .await
            .unwrap();

        assert_eq!(ids(&ranking.results), vec!["ok"]);
        let summary = &ranking.summary;
        assert_eq!(summary.considered, 6);
        assert_eq!(summary.ranked, 1);
        assert_eq!(summary.excluded_total(), 5);
        assert_eq!(summary.excluded[&ExclusionReason::SelfMatch], 1);
        assert_eq!(summary.excluded[&ExclusionReason::TeamSizeTooLarge], 1);
        assert_eq!(summary.excluded[&ExclusionReason::InsufficientAvailability], 1);
        assert_eq!(summary.excluded[&ExclusionReason::AlreadyDecided], 1);
        assert_eq!(summary.excluded[&ExclusionReason::Incomplete], 1);
    }

    #[tokio::test]
    async fn prefiltered_pool_trusts_the_caller() {
        let ranker = MatchRanker::new(RankerConfig {
            candidate_pool: CandidatePool::Prefiltered,
            ..RankerConfig::basic()
        });
        let me = person("me", &["Rust"]);
        let pool = vec![person("seen", &["Rust"])];
        let seen: HashSet<String> = ["seen".to_string()].into_iter().collect();

        let results = ranker
            .rank(Some(&me), &pool, &MatchFilters::default(), &seen)
            .await
            .unwrap();

        assert_eq!(ids(&results), vec!["seen"]);
    }

    #[tokio::test]
    async fn enhanced_mode_combines_all_five_signals() {
        let ranker = MatchRanker::new(RankerConfig::enhanced()).with_reasoning_service(Arc::new(
            MockReasoningService::constant(0.8, 0.6, 0.4),
        ));
        let mut me = person("me", &["Rust"]);
        me.school = Some("MIT".into());
        me.project_idea = Some("carbon tracker".into());
        me.goals = vec![crate::HackathonGoal::ShipProduct];
        let mut other = person("other", &["Rust"]);
        other.school = Some("MIT".into());
        other.project_idea = Some("energy dashboard".into());
        other.goals = vec![crate::HackathonGoal::WinPrizes];

        let ranking = rank_all(&ranker, &me, &[other]).await;
        let result = &ranking.results[0];

        // skill 1.0, field 1.0 under the comparable policy (only school is comparable)
        let expected = 0.25 * 1.0 + 0.20 * 1.0 + 0.25 * 0.8 + 0.20 * 0.6 + 0.10 * 0.4;
        assert!((result.score - expected).abs() < 1e-12);
        assert_eq!(result.breakdown.project_compatibility, Some(0.8));
        assert_eq!(result.breakdown.goal_compatibility, Some(0.6));
        assert_eq!(result.breakdown.team_vibe_match, Some(0.4));
        assert!(!result.breakdown.low_signal_fallback);
        let analysis = result.analysis.as_ref().unwrap();
        assert_eq!(analysis.project.as_ref().unwrap().reasoning, "complementary ideas");
        assert_eq!(ranking.summary.reasoning_failures, 0);
    }

    #[tokio::test]
    async fn failing_service_still_ranks_everyone_with_neutral_scores() {
        let ranker = MatchRanker::new(RankerConfig::enhanced())
            .with_reasoning_service(Arc::new(MockReasoningService::failing()));
        let mut me = person("me", &["Rust"]);
        me.project_idea = Some("idea".into());
        me.goals = vec![crate::HackathonGoal::HaveFun];
        let pool: Vec<_> = ["a", "b"]
            .iter()
            .map(|id| Profile {
                project_idea: Some("idea".into()),
                goals: vec![crate::HackathonGoal::HaveFun],
                ..person(id, &["Rust"])
            })
            .collect();

        let ranking = rank_all(&ranker, &me, &pool).await;

        assert_eq!(ranking.results.len(), 2);
        for result in &ranking.results {
            assert_eq!(result.breakdown.project_compatibility, Some(NEUTRAL_SCORE));
            assert_eq!(result.breakdown.goal_compatibility, Some(NEUTRAL_SCORE));
            assert_eq!(result.breakdown.team_vibe_match, Some(NEUTRAL_SCORE));
            assert!(result.analysis.is_none());
        }
        assert_eq!(ranking.summary.reasoning_failures, 4);
    }

    #[tokio::test]
    async fn enhanced_mode_without_a_service_is_neutral_and_never_falls_back() {
        let ranker = MatchRanker::new(RankerConfig::enhanced());
        let me = person("me", &["Rust"]);
        let pool = vec![person("stranger", &["Cobol"])];

        let ranking = rank_all(&ranker, &me, &pool).await;
        let result = &ranking.results[0];

        assert!(!result.breakdown.low_signal_fallback);
        assert!((result.score - 0.55 * NEUTRAL_SCORE).abs() < 1e-12);
        assert_eq!(ranking.summary.reasoning_failures, 0);
        assert_eq!(ranking.mode, MatchMode::Enhanced);
    }

    #[tokio::test]
    async fn field_policy_follows_the_mode() {
        let mut me = person("me", &[]);
        me.school = Some("MIT".into());
        let mut other = person("other", &[]);
        other.school = Some("MIT".into());

        let basic = rank_all(&basic_ranker(), &me, &[other.clone()]).await;
        assert!((basic.results[0].breakdown.field_similarity - 0.1).abs() < 1e-12);
        assert!((basic.results[0].score - 0.05).abs() < 1e-12);

        let comparable_basic = MatchRanker::new(RankerConfig {
            basic_field_policy: FieldPolicy::Comparable,
            ..RankerConfig::basic()
        });
        let ranking = rank_all(&comparable_basic, &me, &[other]).await;
        assert!((ranking.results[0].breakdown.field_similarity - 1.0).abs() < 1e-12);
    }
}
