//! Text-conditioned separator over a single ONNX graph
//!
//! Inputs:
//! - `mixture`              `[1, T]`  mono audio
//! - `condition`            `[1, D]`  text embedding of the description
//! - `anchor_mask`          `[1, T]`  +1 include, -1 exclude, 0 elsewhere
//! - `predict_spans`        `[1]`     0.0 / 1.0
//! - `reranking_candidates` `[1]`     candidate count as f32
//!
//! Output: `target [1, T]`. The residual is `mixture - target`.

use std::path::Path;
use std::sync::Arc;

use ndarray::{Array1, Array2};
use vx_core::{Anchor, Description, Waveform};

use super::{SeparationOutput, SeparationParams, Separator};
use crate::embedding::TextEmbedder;
use crate::error::{MlError, MlResult};
use crate::inference::{InferenceConfig, InferenceEngine};

/// ONNX text-queried separator
pub struct OnnxSeparator {
    /// Separation graph
    engine: InferenceEngine,

    /// Conditioning vectors for descriptions
    text: Arc<dyn TextEmbedder>,

    /// Rate the graph was exported at
    sample_rate: u32,

    /// Model name/version
    model_name: String,
}

impl OnnxSeparator {
    /// Load the separation graph
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        text: Arc<dyn TextEmbedder>,
        sample_rate: u32,
        inference: &InferenceConfig,
    ) -> MlResult<Self> {
        let engine = InferenceEngine::new(model_path, inference)?;
        let model_name = engine.model_name();

        log::info!(
            "Separator {} ready at {} Hz (condition dim {})",
            model_name,
            sample_rate,
            text.dimension()
        );

        Ok(Self {
            engine,
            text,
            sample_rate,
            model_name,
        })
    }
}

/// Render anchors onto a per-frame mask; later anchors overwrite earlier ones
pub(crate) fn anchor_mask(anchors: &[Anchor], sample_rate: u32, frames: usize) -> Array2<f32> {
    let mut mask = Array2::<f32>::zeros((1, frames));
    for anchor in anchors {
        let range = anchor.frame_range(sample_rate, frames);
        mask.row_mut(0)
            .slice_mut(ndarray::s![range])
            .fill(anchor.polarity.sign());
    }
    mask
}

impl Separator for OnnxSeparator {
    fn separate(
        &self,
        waveform: &Waveform,
        description: &Description,
        params: &SeparationParams,
    ) -> MlResult<SeparationOutput> {
        crate::ensure_canonical(waveform, self.sample_rate)?;

        let frames = waveform.frames();
        if frames == 0 {
            return Err(MlError::EmptyInput("no audio to separate".into()));
        }

        let mixture = Array2::from_shape_vec((1, frames), waveform.samples().to_vec())
            .map_err(|e| MlError::Internal(e.to_string()))?;

        let condition = Array2::from_shape_vec((1, self.text.dimension()), self.text.embed(description)?)
            .map_err(|e| MlError::InvalidInputShape {
                expected: format!("[1, {}] condition", self.text.dimension()),
                got: e.to_string(),
            })?;

        let mask = anchor_mask(
            params.anchors.as_deref().unwrap_or_default(),
            self.sample_rate,
            frames,
        );
        let spans = Array1::from_elem(1, if params.predict_spans { 1.0f32 } else { 0.0 });
        let rerank = Array1::from_elem(1, params.reranking_candidates as f32);

        log::debug!(
            "Separating '{}' from {} frames (anchors={}, spans={}, rerank={})",
            description,
            frames,
            params.anchors.as_ref().map_or(0, Vec::len),
            params.predict_spans,
            params.reranking_candidates
        );

        let output = self
            .engine
            .run_first_array2(&[
                mixture.into_dyn(),
                condition.into_dyn(),
                mask.into_dyn(),
                spans.into_dyn(),
                rerank.into_dyn(),
            ])
            .map_err(|e| MlError::SeparationFailed(e.to_string()))?;

        if output.shape() != [1, frames] {
            return Err(MlError::InvalidOutputShape {
                expected: format!("[1, {frames}] target"),
                got: format!("{:?}", output.shape()),
            });
        }

        let target = Waveform::mono(output.row(0).to_vec(), self.sample_rate)?;
        let residual = waveform.subtract(&target)?;

        Ok(SeparationOutput { target, residual })
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
