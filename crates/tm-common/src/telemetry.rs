//! Metric names and helpers for the ranking core.
//!
//! Everything goes through the `metrics` facade; which recorder (if any) is
//! installed is up to the binary. Without one these calls are no-ops.

use std::time::Duration;

use metrics::{counter, histogram};

use crate::{compatibility::SignalOutcome, config::MatchMode, matching::ExclusionReason};

pub const RANK_CALLS_TOTAL: &str = "teammatch_rank_calls_total";
pub const RANK_DURATION_SECONDS: &str = "teammatch_rank_duration_seconds";
pub const CANDIDATES_EXCLUDED_TOTAL: &str = "teammatch_candidates_excluded_total";
pub const LOW_SIGNAL_FALLBACK_TOTAL: &str = "teammatch_low_signal_fallback_total";
pub const REASONING_CALLS_TOTAL: &str = "teammatch_reasoning_calls_total";

pub fn record_rank_call(mode: MatchMode, elapsed: Duration) {
    counter!(RANK_CALLS_TOTAL, "mode" => mode.as_ref().to_string()).increment(1);
    histogram!(RANK_DURATION_SECONDS, "mode" => mode.as_ref().to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_exclusion(reason: ExclusionReason) {
    counter!(CANDIDATES_EXCLUDED_TOTAL, "reason" => reason.as_ref().to_string()).increment(1);
}

pub fn record_low_signal_fallbacks(count: usize) {
    if count > 0 {
        counter!(LOW_SIGNAL_FALLBACK_TOTAL).increment(count as u64);
    }
}

pub fn record_reasoning_call(operation: &'static str, outcome: SignalOutcome) {
    counter!(
        REASONING_CALLS_TOTAL,
        "operation" => operation,
        "outcome" => outcome.as_ref().to_string()
    )
    .increment(1);
}
