//! Introspection: which sounds are in this recording?
//!
//! A similarity scorer rates one waveform against many descriptions in a
//! single batched call; the selector turns those scores into the ordered
//! list of descriptions to separate.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vx_ml::introspection::{Introspector, ClapScorer};
//!
//! let introspector = Introspector::new(&scorer);
//! let found = introspector.introspect(&mono, taxonomy.descriptions(), 0.2, 5)?;
//!
//! for description in &found.selected {
//!     println!("{}: {:?}", description, found.scores.get(description));
//! }
//! ```

mod clap;
mod selector;

pub use clap::ClapScorer;
pub use selector::select;

use serde::{Deserialize, Serialize};
use vx_core::{Description, Waveform};

use crate::error::{MlError, MlResult};

/// Audio-text similarity model
pub trait SimilarityScorer: Send + Sync {
    /// Score `waveform` against every description in one batched call
    ///
    /// # Arguments
    /// * `waveform` - Mono audio at [`SimilarityScorer::sample_rate`]
    /// * `descriptions` - Candidate labels
    ///
    /// # Returns
    /// One score per description, same order. Higher = more likely present.
    fn score(&self, waveform: &Waveform, descriptions: &[Description]) -> MlResult<Vec<f32>>;

    /// Rate the scorer was initialised with
    fn sample_rate(&self) -> u32;

    /// Get model name/version
    fn model_name(&self) -> &str;
}

/// One scored description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDescription {
    pub description: Description,
    pub score: f32,
}

/// Scores in scoring order (taxonomy order), one entry per scored label
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreMap {
    entries: Vec<ScoredDescription>,
}

impl ScoreMap {
    /// Pair descriptions with their scores
    pub fn new(descriptions: &[Description], scores: Vec<f32>) -> MlResult<Self> {
        if descriptions.len() != scores.len() {
            return Err(MlError::ScoreCountMismatch {
                expected: descriptions.len(),
                got: scores.len(),
            });
        }

        let entries = descriptions
            .iter()
            .cloned()
            .zip(scores)
            .map(|(description, score)| ScoredDescription { description, score })
            .collect();

        Ok(Self { entries })
    }

    pub fn from_pairs<I, D>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (D, f32)>,
        D: Into<Description>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(d, score)| ScoredDescription {
                    description: d.into(),
                    score,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in scoring order
    pub fn iter(&self) -> impl Iterator<Item = &ScoredDescription> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[ScoredDescription] {
        &self.entries
    }

    /// Score of the first entry matching `description`
    pub fn get(&self, description: &Description) -> Option<f32> {
        self.entries
            .iter()
            .find(|e| &e.description == description)
            .map(|e| e.score)
    }

    /// Entries by descending score; equal scores keep scoring order
    pub fn ranked(&self) -> Vec<&ScoredDescription> {
        let mut ranked: Vec<&ScoredDescription> = self.entries.iter().collect();
        ranked.sort_by(|a, b| selector::compare_desc(a.score, b.score));
        ranked
    }
}

/// Result of one introspection pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Introspection {
    /// Descriptions to separate, in selection order
    pub selected: Vec<Description>,
    /// Every candidate's score
    pub scores: ScoreMap,
}

/// Scorer + selection policy
pub struct Introspector<'a> {
    scorer: &'a dyn SimilarityScorer,
}

impl<'a> Introspector<'a> {
    pub fn new(scorer: &'a dyn SimilarityScorer) -> Self {
        Self { scorer }
    }

    /// Score `waveform` against `candidates` and select what to separate
    pub fn introspect(
        &self,
        waveform: &Waveform,
        candidates: &[Description],
        threshold: f32,
        fallback_k: usize,
    ) -> MlResult<Introspection> {
        if candidates.is_empty() {
            return Ok(Introspection {
                selected: Vec::new(),
                scores: ScoreMap::default(),
            });
        }

        let raw = self.scorer.score(waveform, candidates)?;
        let scores = ScoreMap::new(candidates, raw)?;
        let selected = select(&scores, threshold, fallback_k);

        log::debug!(
            "Introspection with {}: {} candidates, {} selected (threshold {}, fallback {})",
            self.scorer.model_name(),
            candidates.len(),
            selected.len(),
            threshold,
            fallback_k
        );

        Ok(Introspection { selected, scores })
    }
}
