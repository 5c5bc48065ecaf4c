//! CLAP-style contrastive scorer
//!
//! Audio goes through an ONNX audio encoder (`[1, segment] -> [1, D]`),
//! segment embeddings are averaged, and every description's text embedding
//! is compared against that single audio embedding by cosine similarity.

use std::path::Path;
use std::sync::Arc;

use ndarray::Array2;
use vx_core::{Description, Waveform};

use super::SimilarityScorer;
use crate::config::ScorerConfig;
use crate::embedding::{TextEmbedder, cosine_similarity};
use crate::error::{MlError, MlResult};
use crate::inference::{InferenceConfig, InferenceEngine};

/// Audio-text similarity over an ONNX audio encoder
pub struct ClapScorer {
    /// Audio encoder
    encoder: InferenceEngine,

    /// Text side of the contrastive pair
    text: Arc<dyn TextEmbedder>,

    /// Rate the encoder expects
    sample_rate: u32,

    /// Encoder window in samples
    segment_samples: usize,

    /// Multiplier applied to cosine similarity
    logit_scale: f32,

    /// Model name/version
    model_name: String,
}

impl ClapScorer {
    /// Load the audio encoder
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        text: Arc<dyn TextEmbedder>,
        config: &ScorerConfig,
        inference: &InferenceConfig,
    ) -> MlResult<Self> {
        let encoder = InferenceEngine::new(model_path, inference)?;
        let segment_samples = (config.segment_secs * config.sample_rate as f32).round() as usize;
        if segment_samples == 0 {
            return Err(MlError::Configuration(format!(
                "scorer segment of {}s at {} Hz is empty",
                config.segment_secs, config.sample_rate
            )));
        }

        let model_name = encoder.model_name();
        Ok(Self {
            encoder,
            text,
            sample_rate: config.sample_rate,
            segment_samples,
            logit_scale: config.logit_scale,
            model_name,
        })
    }

    /// Mean encoder embedding over fixed-size segments
    fn embed_audio(&self, samples: &[f32]) -> MlResult<Vec<f32>> {
        let outputs = segment_inputs(samples, self.segment_samples)
            .map(|input| self.encoder.run_first_array2(&[input.into_dyn()]))
            .collect::<MlResult<Vec<_>>>()?;

        mean_embedding(&outputs, self.text.dimension())
    }
}

impl SimilarityScorer for ClapScorer {
    fn score(&self, waveform: &Waveform, descriptions: &[Description]) -> MlResult<Vec<f32>> {
        check_input(waveform, self.sample_rate)?;

        // One audio pass shared by every description
        let audio = self.embed_audio(waveform.samples())?;
        let text = self.text.embed_batch(descriptions)?;

        Ok(similarity_scores(&text, &audio, self.logit_scale))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Mono at the encoder rate, with at least one sample
fn check_input(waveform: &Waveform, sample_rate: u32) -> MlResult<()> {
    crate::ensure_canonical(waveform, sample_rate)?;
    if waveform.is_empty() {
        return Err(MlError::EmptyInput("no audio to score".into()));
    }
    Ok(())
}

/// `[1, segment]` encoder inputs; the last one is zero-padded
fn segment_inputs(samples: &[f32], segment: usize) -> impl Iterator<Item = Array2<f32>> + '_ {
    samples.chunks(segment).map(move |chunk| {
        let mut input = Array2::<f32>::zeros((1, segment));
        input
            .row_mut(0)
            .iter_mut()
            .zip(chunk)
            .for_each(|(dst, &src)| *dst = src);
        input
    })
}

/// Average of per-segment `[1, dim]` embeddings
fn mean_embedding(outputs: &[Array2<f32>], dim: usize) -> MlResult<Vec<f32>> {
    if outputs.is_empty() {
        return Err(MlError::EmptyInput("no audio segments to embed".into()));
    }

    let mut sum = vec![0.0f32; dim];
    for output in outputs {
        if output.shape() != [1, dim] {
            return Err(MlError::InvalidOutputShape {
                expected: format!("[1, {dim}] audio embedding"),
                got: format!("{:?}", output.shape()),
            });
        }
        sum.iter_mut()
            .zip(output.row(0))
            .for_each(|(acc, &v)| *acc += v);
    }

    let scale = 1.0 / outputs.len() as f32;
    Ok(sum.into_iter().map(|v| v * scale).collect())
}

/// Scaled cosine similarity of each text row against the audio embedding
fn similarity_scores(text: &Array2<f32>, audio: &[f32], logit_scale: f32) -> Vec<f32> {
    text.rows()
        .into_iter()
        .map(|row| cosine_similarity(&row.to_vec(), audio) * logit_scale)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use std::collections::HashMap;

    use crate::embedding::EmbeddingTable;

    #[test]
    fn test_last_segment_zero_padded() {
        let samples = [1.0, 2.0, 3.0, 4.0, 5.0];
        let inputs: Vec<Array2<f32>> = segment_inputs(&samples, 2).collect();

        assert_eq!(inputs.len(), 3);
        assert!(inputs.iter().all(|i| i.shape() == [1, 2]));
        assert_eq!(inputs[1], array![[3.0f32, 4.0]]);
        assert_eq!(inputs[2], array![[5.0f32, 0.0]]);
    }

    #[test]
    fn test_exact_segments_not_padded() {
        let inputs: Vec<Array2<f32>> = segment_inputs(&[0.5; 6], 3).collect();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[1], array![[0.5f32, 0.5, 0.5]]);
    }

    #[test]
    fn test_segment_embeddings_averaged() {
        let outputs = vec![array![[1.0, 0.0, 2.0]], array![[3.0, 4.0, 0.0]]];
        let mean = mean_embedding(&outputs, 3).unwrap();

        assert_relative_eq!(mean[0], 2.0);
        assert_relative_eq!(mean[1], 2.0);
        assert_relative_eq!(mean[2], 1.0);
    }

    #[test]
    fn test_embedding_shape_checked() {
        let outputs = vec![array![[1.0, 0.0, 2.0]], array![[1.0, 0.0]]];
        assert!(matches!(
            mean_embedding(&outputs, 3),
            Err(MlError::InvalidOutputShape { .. })
        ));

        let batched = vec![array![[1.0, 0.0], [0.0, 1.0]]];
        assert!(matches!(
            mean_embedding(&batched, 2),
            Err(MlError::InvalidOutputShape { .. })
        ));
    }

    #[test]
    fn test_no_segments() {
        assert!(matches!(mean_embedding(&[], 3), Err(MlError::EmptyInput(_))));
    }

    #[test]
    fn test_logit_scale_multiplies_cosine() {
        let text = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let audio = [2.0, 0.0];

        let unscaled = similarity_scores(&text, &audio, 1.0);
        assert_relative_eq!(unscaled[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(unscaled[1], 0.0, epsilon = 1e-6);
        assert_relative_eq!(unscaled[2], std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-6);

        let scaled = similarity_scores(&text, &audio, 100.0);
        assert_relative_eq!(scaled[0], 100.0, epsilon = 1e-4);
        assert_relative_eq!(scaled[2], 100.0 * std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-4);
    }

    #[test]
    fn test_zero_audio_scores_zero() {
        let scores = similarity_scores(&array![[1.0, 0.0]], &[0.0, 0.0], 100.0);
        assert_eq!(scores, vec![0.0]);
    }

    #[test]
    fn test_input_checks() {
        assert!(check_input(&Waveform::mono(vec![0.1; 16], 16000).unwrap(), 16000).is_ok());

        let empty = Waveform::mono(Vec::new(), 16000).unwrap();
        assert!(matches!(check_input(&empty, 16000), Err(MlError::EmptyInput(_))));

        let wrong_rate = Waveform::mono(vec![0.1; 16], 8000).unwrap();
        assert!(matches!(
            check_input(&wrong_rate, 16000),
            Err(MlError::InvalidSampleRate { expected: 16000, got: 8000 })
        ));

        let stereo = Waveform::from_channels(vec![vec![0.1; 4], vec![0.1; 4]], 16000).unwrap();
        assert!(matches!(
            check_input(&stereo, 16000),
            Err(MlError::ChannelMismatch { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn test_missing_encoder() {
        let text = Arc::new(EmbeddingTable::new(2, HashMap::new()).unwrap());
        let result = ClapScorer::new(
            "/nonexistent/clap_audio.onnx",
            text,
            &ScorerConfig::default(),
            &InferenceConfig::default(),
        );
        assert!(matches!(result, Err(MlError::ModelNotFound { .. })));
    }
}
