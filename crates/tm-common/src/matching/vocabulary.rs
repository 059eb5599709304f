use std::collections::HashMap;

use crate::{Profile, normalize::normalize_skill_tokens};

/// Distinct skill tokens of one ranking call, in first-seen order.
///
/// Coordinates are only meaningful inside the call that built them; the
/// vocabulary is rebuilt whenever the batch changes.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    terms: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn build<'a, I>(profiles: I) -> Self
    where
        I: IntoIterator<Item = &'a Profile>,
    {
        let mut vocabulary = Self::default();
        for profile in profiles {
            for token in normalize_skill_tokens(&profile.skills) {
                vocabulary.insert(token);
            }
        }
        vocabulary
    }

    fn insert(&mut self, token: String) {
        if self.index.contains_key(&token) {
            return;
        }
        self.index.insert(token.clone(), self.terms.len());
        self.terms.push(token);
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn index_of(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }

    /// Term-frequency vector of `profile` over this vocabulary.
    pub fn vectorize(&self, profile: &Profile) -> TermVector {
        let mut counts = vec![0.0; self.terms.len()];
        for token in normalize_skill_tokens(&profile.skills) {
            if let Some(i) = self.index_of(&token) {
                counts[i] += 1.0;
            }
        }
        TermVector(counts)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermVector(Vec<f64>);

impl TermVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }
}

/// Vocabulary plus one vector per profile, in the order the profiles were given.
/// Read-only once built.
#[derive(Debug, Clone)]
pub struct VectorSpace {
    pub vocabulary: Vocabulary,
    pub vectors: Vec<TermVector>,
}

impl VectorSpace {
    /// `profiles` is the current user followed by the candidates.
    pub fn build(profiles: &[&Profile]) -> Self {
        let vocabulary = Vocabulary::build(profiles.iter().copied());
        let vectors = profiles
            .iter()
            .map(|profile| vocabulary.vectorize(profile))
            .collect();

        Self {
            vocabulary,
            vectors,
        }
    }

    /// Tokens with a nonzero count in both vectors, in vocabulary order.
    pub fn shared_terms(&self, a: &TermVector, b: &TermVector) -> Vec<String> {
        self.vocabulary
            .terms()
            .iter()
            .zip(a.as_slice().iter().zip(b.as_slice()))
            .filter(|(_, (x, y))| **x > 0.0 && **y > 0.0)
            .map(|(term, _)| term.clone())
            .collect()
    }
}
