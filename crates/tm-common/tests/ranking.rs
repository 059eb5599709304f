use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{Value, json};
use tm_common::{
    HackathonGoal, Profile,
    compatibility::{GoalComparisonRequest, ProjectComparisonRequest, ReasoningService},
    config::{MatchMode, RankerConfig},
    error::{RankError, ReasoningError},
    matching::{
        ExclusionReason, LowSignalBaseline, MatchFilters, MatchRanker, MatchResult,
    },
};

/// Scores projects by looking the candidate's idea up in a fixed table and
/// fails for anything it does not know.
struct TableService {
    calls: AtomicUsize,
}

impl TableService {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ReasoningService for TableService {
    fn name(&self) -> &'static str {
        "table"
    }

    async fn compare_projects(
        &self,
        request: &ProjectComparisonRequest,
    ) -> Result<Value, ReasoningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match request.project_b.as_str() {
            "solar map" => Ok(json!({ "compatibilityScore": 0.9, "reasoning": "same space" })),
            "tax bot" => Ok(json!({ "compatibilityScore": 0.1, "reasoning": "unrelated" })),
            "slow" => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(json!({ "compatibilityScore": 1.0 }))
            }
            _ => Err(ReasoningError::Malformed("unknown project".into())),
        }
    }

    async fn compare_goals(
        &self,
        _request: &GoalComparisonRequest,
    ) -> Result<Value, ReasoningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!("definitely not an object"))
    }
}

fn profile(id: &str, skills: &[&str]) -> Profile {
    Profile {
        name: Some(id.to_string()),
        skills: skills.iter().map(|s| s.to_string()).collect(),
        ..Profile::new(id)
    }
}

fn with_project(mut p: Profile, idea: &str) -> Profile {
    p.project_idea = Some(idea.into());
    p.goals = vec![HackathonGoal::WinPrizes];
    p
}

fn ids(results: &[MatchResult]) -> Vec<String> {
    results.iter().map(|r| r.candidate.id.clone()).collect()
}

fn no_exclusions() -> HashSet<String> {
    HashSet::new()
}

#[tokio::test]
async fn skill_overlap_scenario_ranks_exact_match_first() {
    let ranker = MatchRanker::new(RankerConfig {
        baseline_seed: Some(7),
        ..RankerConfig::basic()
    });
    let me = profile("me", &["React", "Python"]);
    let pool = vec![profile("a", &["React", "Node"]), profile("b", &["React", "Python"])];

    let results = ranker
        .rank(Some(&me), &pool, &MatchFilters::default(), &no_exclusions())
        .await
        .unwrap();

    assert_eq!(ids(&results), vec!["b", "a"]);
    assert!((results[0].breakdown.skill_similarity - 1.0).abs() < 1e-12);
    assert!((results[1].breakdown.skill_similarity - 0.5).abs() < 1e-12);
}

#[tokio::test]
async fn results_are_sorted_descending_and_bounded() {
    let ranker = MatchRanker::new(RankerConfig {
        baseline_seed: Some(11),
        ..RankerConfig::basic()
    });
    let mut me = profile("me", &["Rust", "Go", "SQL"]);
    me.school = Some("Waterloo".into());
    me.year = Some("3".into());
    let mut close = profile("close", &["Rust", "Go", "SQL"]);
    close.school = Some("Waterloo".into());
    close.year = Some("3".into());
    let pool = vec![
        profile("stranger", &["Figma"]),
        profile("partial", &["Rust"]),
        close,
        profile("empty", &[]),
    ];

    let results = ranker
        .rank(Some(&me), &pool, &MatchFilters::default(), &no_exclusions())
        .await
        .unwrap();

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].candidate.id, "close");
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    for result in &results {
        assert!((0.0..=1.0).contains(&result.score), "{}", result.score);
    }
}

#[tokio::test]
async fn oversized_team_preference_is_never_ranked() {
    let ranker = MatchRanker::new(RankerConfig::basic());
    let me = profile("me", &["Rust"]);
    let mut perfect_but_big = profile("big", &["Rust"]);
    perfect_but_big.preferred_team_size = Some(8);
    let pool = vec![perfect_but_big, profile("fine", &["Go"])];
    let filters = MatchFilters {
        max_team_size: Some(4),
        ..MatchFilters::default()
    };

    let ranking = ranker
        .rank_detailed(Some(&me), &pool, &filters, &no_exclusions())
        .await
        .unwrap();

    assert_eq!(ids(&ranking.results), vec!["fine"]);
    assert_eq!(
        ranking.summary.excluded.get(&ExclusionReason::TeamSizeTooLarge),
        Some(&1)
    );
}

#[tokio::test]
async fn already_decided_candidates_are_skipped() {
    let ranker = MatchRanker::new(RankerConfig::basic());
    let me = profile("me", &["Rust"]);
    let pool = vec![profile("liked", &["Rust"]), profile("new", &["Rust"])];
    let decided: HashSet<String> = ["liked".to_string()].into_iter().collect();

    let results = ranker
        .rank(Some(&me), &pool, &MatchFilters::default(), &decided)
        .await
        .unwrap();

    assert_eq!(ids(&results), vec!["new"]);
}

#[tokio::test]
async fn missing_current_user_is_reported() {
    let ranker = MatchRanker::new(RankerConfig::enhanced());
    let result = ranker
        .rank(None, &[profile("a", &[])], &MatchFilters::default(), &no_exclusions())
        .await;

    assert!(matches!(result, Err(RankError::MissingCurrentUser)));
}

#[tokio::test]
async fn empty_result_is_not_an_error() {
    let ranker = MatchRanker::new(RankerConfig::enhanced());
    let me = profile("me", &["Rust"]);
    let decided: HashSet<String> = ["a".to_string()].into_iter().collect();

    let results = ranker
        .rank(Some(&me), &[profile("a", &["Rust"])], &MatchFilters::default(), &decided)
        .await
        .unwrap();

    assert!(results.is_empty());
}

#[tokio::test(start_paused = true)]
async fn unreliable_service_degrades_per_candidate() {
    let service = Arc::new(TableService::new());
    let ranker = MatchRanker::new(RankerConfig {
        analyzer: tm_common::compatibility::AnalyzerConfig {
            timeout: Duration::from_secs(3),
            max_concurrency: 3,
        },
        ..RankerConfig::enhanced()
    })
    .with_reasoning_service(service.clone());

    let me = with_project(profile("me", &["Rust"]), "renewables tracker");
    let pool = vec![
        with_project(profile("tax", &["Rust"]), "tax bot"),
        with_project(profile("slow", &["Rust"]), "slow"),
        with_project(profile("solar", &["Rust"]), "solar map"),
        with_project(profile("odd", &["Rust"]), "something else"),
        profile("quiet", &["Rust"]),
    ];

    let ranking = ranker
        .rank_detailed(Some(&me), &pool, &MatchFilters::default(), &no_exclusions())
        .await
        .unwrap();

    assert_eq!(ranking.mode, MatchMode::Enhanced);
    assert_eq!(ranking.results.len(), 5);
    assert_eq!(ranking.results[0].candidate.id, "solar");
    assert_eq!(ranking.results[4].candidate.id, "tax");

    let by_id = |id: &str| {
        ranking
            .results
            .iter()
            .find(|r| r.candidate.id == id)
            .unwrap()
    };
    assert_eq!(by_id("solar").breakdown.project_compatibility, Some(0.9));
    assert_eq!(by_id("slow").breakdown.project_compatibility, Some(0.5));
    assert_eq!(by_id("odd").breakdown.project_compatibility, Some(0.5));
    assert_eq!(by_id("quiet").breakdown.project_compatibility, Some(0.5));
    for result in &ranking.results {
        // goal answers are malformed for everyone
        assert_eq!(result.breakdown.goal_compatibility, Some(0.5));
        assert_eq!(result.breakdown.team_vibe_match, Some(0.5));
    }
    assert_eq!(
        by_id("solar").analysis.as_ref().unwrap().project.as_ref().unwrap().reasoning,
        "same space"
    );
    assert!(by_id("quiet").analysis.is_none());

    // slow timeout + odd malformed + 4 malformed goal answers
    assert_eq!(ranking.summary.reasoning_failures, 6);
    // quiet has neither project nor goals, so only 4 candidates were asked
    assert_eq!(service.calls.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn project_query_overlays_the_profile_idea() {
    let service = Arc::new(TableService::new());
    let ranker =
        MatchRanker::new(RankerConfig::enhanced()).with_reasoning_service(service.clone());
    let me = profile("me", &["Rust"]);
    let pool = vec![with_project(profile("solar", &["Rust"]), "solar map")];
    let filters = MatchFilters {
        project_idea_query: Some("clean energy".into()),
        ..MatchFilters::default()
    };

    let results = ranker
        .rank(Some(&me), &pool, &filters, &no_exclusions())
        .await
        .unwrap();

    assert_eq!(results[0].breakdown.project_compatibility, Some(0.9));
}

#[tokio::test]
async fn injected_generator_fixes_the_fallback_score() {
    let ranker = MatchRanker::new(RankerConfig::basic());
    let me = profile("me", &["Rust"]);
    let pool = vec![profile("other", &["Elixir"])];

    let rank_once = |seed| {
        let ranker = &ranker;
        let me = &me;
        let pool = &pool;
        async move {
            let mut baseline = LowSignalBaseline::seeded(seed);
            ranker
                .rank_detailed_with(
                    Some(me),
                    pool,
                    &MatchFilters::default(),
                    &HashSet::new(),
                    &mut baseline,
                )
                .await
                .unwrap()
                .results[0]
                .score
        }
    };

    let first = rank_once(99).await;
    let again = rank_once(99).await;
    assert_eq!(first, again);
    assert!((0.1..=0.3).contains(&first));
}
