pub mod baseline;
pub mod pipeline;
pub mod prefilter;
pub mod scoring;
pub mod similarity;
pub mod vocabulary;
pub mod weights;

pub use baseline::LowSignalBaseline;
pub use pipeline::{MatchRanker, MatchResult, Ranking, RankingSummary};
pub use prefilter::{CandidatePool, ExclusionReason, FilterEngine, MatchFilters};
pub use scoring::ScoreBreakdown;
pub use similarity::{FieldPolicy, ProfileField, cosine_similarity, field_similarity};
pub use vocabulary::{TermVector, VectorSpace, Vocabulary};
pub use weights::{BASIC_WEIGHTS, ENHANCED_WEIGHTS, Weights};
