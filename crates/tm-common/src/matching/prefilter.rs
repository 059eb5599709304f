use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::{HackathonGoal, Profile};

/// Caller-supplied constraints. An absent value means no constraint on that
/// dimension; present values are AND-combined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchFilters {
    pub max_team_size: Option<u32>,
    pub min_availability: Option<u32>,
    /// Compared against candidates' project ideas instead of the current user's own.
    pub project_idea_query: Option<String>,
    /// Compared against candidates' goals instead of the current user's own.
    pub goal_query: Vec<HackathonGoal>,
}

/// Shape of the candidate pool handed to the ranker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CandidatePool {
    /// Full pool; self and already-decided candidates are excluded here.
    Full,
    /// The collaborator already removed self and already-decided candidates.
    Prefiltered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExclusionReason {
    Incomplete,
    SelfMatch,
    AlreadyDecided,
    TeamSizeTooLarge,
    InsufficientAvailability,
}

#[derive(Debug, Default)]
pub struct FilterOutcome<'a> {
    /// Surviving candidates in input order.
    pub accepted: Vec<&'a Profile>,
    pub excluded: Vec<(&'a Profile, ExclusionReason)>,
}

pub struct FilterEngine {
    pool: CandidatePool,
}

impl FilterEngine {
    pub fn new(pool: CandidatePool) -> Self {
        Self { pool }
    }

    /// 除外条件を順に確認し、最初に該当した理由を返す
    pub fn evaluate_candidate(
        &self,
        current: &Profile,
        candidate: &Profile,
        filters: &MatchFilters,
        excluded_ids: &HashSet<String>,
    ) -> Result<(), ExclusionReason> {
        if !candidate.is_complete() {
            return Err(ExclusionReason::Incomplete);
        }

        if self.pool == CandidatePool::Full {
            if candidate.id == current.id {
                return Err(ExclusionReason::SelfMatch);
            }
            if excluded_ids.contains(&candidate.id) {
                return Err(ExclusionReason::AlreadyDecided);
            }
        }

        if let (Some(max), Some(preferred)) = (filters.max_team_size, candidate.preferred_team_size)
        {
            if preferred > max {
                return Err(ExclusionReason::TeamSizeTooLarge);
            }
        }

        if let (Some(min), Some(hours)) = (filters.min_availability, candidate.availability_hours) {
            if hours < min {
                return Err(ExclusionReason::InsufficientAvailability);
            }
        }

        Ok(())
    }

    pub fn filter_candidates<'a>(
        &self,
        current: &Profile,
        candidates: &'a [Profile],
        filters: &MatchFilters,
        excluded_ids: &HashSet<String>,
    ) -> FilterOutcome<'a> {
        let mut outcome = FilterOutcome::default();

        for candidate in candidates {
            match self.evaluate_candidate(current, candidate, filters, excluded_ids) {
                Ok(()) => outcome.accepted.push(candidate),
                Err(reason) => outcome.excluded.push((candidate, reason)),
            }
        }

        outcome
    }
}
