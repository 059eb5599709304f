use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::{Profile, normalize::non_blank};

/// コサイン類似度（0.0〜1.0）
///
/// Term-frequency vectors are non-negative, so no remapping is applied. A zero
/// norm on either side is the defined zero-information case and yields 0.0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        tracing::warn!(
            a_len = a.len(),
            b_len = b.len(),
            "term vector dimension mismatch; returning zero similarity"
        );
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// How fields that are absent on either side enter the denominator of
/// [`field_similarity`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FieldPolicy {
    /// Denominator is always all ten fields; absent fields count against the score.
    Strict,
    /// Denominator is only the fields present on both sides.
    Comparable,
}

/// The discrete attributes compared by [`field_similarity`], in scoring order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProfileField {
    School,
    Year,
    Major,
    Uiux,
    Pitching,
    Management,
    Hardware,
    Cyber,
    Frontend,
    Backend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldValue<'a> {
    Text(&'a str),
    Rating(u8),
}

impl ProfileField {
    pub const ALL: [ProfileField; 10] = [
        ProfileField::School,
        ProfileField::Year,
        ProfileField::Major,
        ProfileField::Uiux,
        ProfileField::Pitching,
        ProfileField::Management,
        ProfileField::Hardware,
        ProfileField::Cyber,
        ProfileField::Frontend,
        ProfileField::Backend,
    ];

    fn value(self, profile: &Profile) -> Option<FieldValue<'_>> {
        let ratings = &profile.ratings;
        match self {
            ProfileField::School => non_blank(profile.school.as_deref()).map(FieldValue::Text),
            ProfileField::Year => non_blank(profile.year.as_deref()).map(FieldValue::Text),
            ProfileField::Major => non_blank(profile.major.as_deref()).map(FieldValue::Text),
            ProfileField::Uiux => ratings.uiux.map(FieldValue::Rating),
            ProfileField::Pitching => ratings.pitching.map(FieldValue::Rating),
            ProfileField::Management => ratings.management.map(FieldValue::Rating),
            ProfileField::Hardware => ratings.hardware.map(FieldValue::Rating),
            ProfileField::Cyber => ratings.cyber.map(FieldValue::Rating),
            ProfileField::Frontend => ratings.frontend.map(FieldValue::Rating),
            ProfileField::Backend => ratings.backend.map(FieldValue::Rating),
        }
    }
}

/// Per-field agreement counts between two profiles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldAgreement {
    /// Fields present on both sides with equal values.
    pub matched: Vec<ProfileField>,
    /// Number of fields present on both sides.
    pub comparable: usize,
}

impl FieldAgreement {
    pub fn between(a: &Profile, b: &Profile) -> Self {
        let mut agreement = Self::default();
        for field in ProfileField::ALL {
            if let (Some(left), Some(right)) = (field.value(a), field.value(b)) {
                agreement.comparable += 1;
                if left == right {
                    agreement.matched.push(field);
                }
            }
        }
        agreement
    }

    pub fn similarity(&self, policy: FieldPolicy) -> f64 {
        let denominator = match policy {
            FieldPolicy::Strict => ProfileField::ALL.len(),
            FieldPolicy::Comparable => self.comparable,
        };

        if denominator == 0 {
            return 0.0;
        }

        self.matched.len() as f64 / denominator as f64
    }
}

/// Fraction of discrete fields on which both profiles agree, under `policy`.
pub fn field_similarity(a: &Profile, b: &Profile, policy: FieldPolicy) -> f64 {
    FieldAgreement::between(a, b).similarity(policy)
}
