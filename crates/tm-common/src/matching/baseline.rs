use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};

/// Bounds of the baseline score assigned to candidates with no comparable signal.
pub const LOW_SIGNAL_BASELINE_MIN: f64 = 0.1;
pub const LOW_SIGNAL_BASELINE_MAX: f64 = 0.3;

/// Source of the pseudo-random baseline used when a candidate shares neither
/// skills nor discrete fields with the current user.
///
/// Seed it (or hand it any generator) to make rankings reproducible.
pub struct LowSignalBaseline {
    rng: Box<dyn RngCore + Send>,
}

impl LowSignalBaseline {
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_rng(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_rng(rng: impl RngCore + Send + 'static) -> Self {
        Self { rng: Box::new(rng) }
    }

    pub fn sample(&mut self) -> f64 {
        self.rng
            .gen_range(LOW_SIGNAL_BASELINE_MIN..=LOW_SIGNAL_BASELINE_MAX)
    }
}

impl std::fmt::Debug for LowSignalBaseline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LowSignalBaseline").finish_non_exhaustive()
    }
}

/// True when there is nothing at all to compare.
pub fn is_low_signal(skill_similarity: f64, field_similarity: f64) -> bool {
    skill_similarity == 0.0 && field_similarity == 0.0
}
