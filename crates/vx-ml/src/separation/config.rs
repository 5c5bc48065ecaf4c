//! Per-call separation parameters

use serde::{Deserialize, Serialize};
use vx_core::Anchor;

/// Parameters handed to the separator with every call
///
/// Anchors, span prediction and the reranking budget are opaque to the
/// engine; only the separator interprets them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeparationParams {
    /// Temporal hints (single-sound requests only)
    pub anchors: Option<Vec<Anchor>>,

    /// Also predict which time spans belong to the target
    pub predict_spans: bool,

    /// Candidate count for the model's internal reranking (0 = disabled)
    pub reranking_candidates: u32,
}

impl SeparationParams {
    /// Single-sound request defaults: no spans, no reranking
    pub fn single() -> Self {
        Self::default()
    }

    pub fn with_anchors(mut self, anchors: Option<Vec<Anchor>>) -> Self {
        self.anchors = anchors;
        self
    }

    pub fn with_predict_spans(mut self, predict_spans: bool) -> Self {
        self.predict_spans = predict_spans;
        self
    }

    pub fn with_reranking(mut self, candidates: u32) -> Self {
        self.reranking_candidates = candidates;
        self
    }
}
