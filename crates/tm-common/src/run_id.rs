//! Identifiers for ranking runs.
//!
//! The process gets one ULID at first access; every ranking call additionally
//! gets its own ULID so log lines and results from a single call can be tied
//! together.

use once_cell::sync::Lazy;
use ulid::Ulid;

static PROCESS_ID: Lazy<String> = Lazy::new(|| Ulid::new().to_string());

/// Process-level ID, stable for the life of the process.
#[inline]
pub fn process() -> &'static str {
    &PROCESS_ID
}

/// Fresh ID for one ranking call. Time-ordered, 26 characters.
#[inline]
pub fn generate() -> String {
    Ulid::new().to_string()
}
