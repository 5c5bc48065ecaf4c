//! Engine configuration
//!
//! Loaded once at startup from YAML or JSON (chosen by file extension):
//!
//! ```yaml
//! sample_rate: 44100
//! separator:
//!   model_path: models/separator.onnx
//!   embeddings_path: models/separator_text.json
//! scorer:
//!   model_path: models/clap_audio.onnx
//!   embeddings_path: models/clap_text.json
//! disentangle:
//!   threshold: 0.2
//!   top_k_fallback: 5
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vx_core::DEFAULT_SAMPLE_RATE;

use crate::disentangle::IterationOptions;
use crate::error::{MlError, MlResult};
use crate::inference::InferenceConfig;
use crate::taxonomy::is_yaml;

/// Separation model files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeparatorConfig {
    /// ONNX separation graph
    pub model_path: PathBuf,
    /// Text embedding table used for conditioning
    pub embeddings_path: PathBuf,
}

/// Similarity scorer files and analysis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// ONNX audio encoder
    pub model_path: PathBuf,
    /// Text embedding table in the encoder's space
    pub embeddings_path: PathBuf,
    /// Rate the encoder was trained at
    pub sample_rate: u32,
    /// Encoder window length in seconds
    pub segment_secs: f32,
    /// Multiplier on cosine similarity
    pub logit_scale: f32,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::new(),
            embeddings_path: PathBuf::new(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            segment_secs: 10.0,
            logit_scale: 1.0,
        }
    }
}

/// Defaults for iterative disentanglement requests
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisentangleDefaults {
    /// Scores strictly above this are selected
    pub threshold: f32,
    /// Best-k fallback when nothing passes (0 = none)
    pub top_k_fallback: usize,
    pub predict_spans: bool,
    pub reranking_candidates: u32,
}

impl Default for DisentangleDefaults {
    fn default() -> Self {
        Self {
            threshold: 0.2,
            top_k_fallback: 5,
            predict_spans: true,
            reranking_candidates: 8,
        }
    }
}

impl DisentangleDefaults {
    /// Per-request options, request values winning over these defaults
    pub fn iteration_options(
        &self,
        predict_spans: Option<bool>,
        reranking_candidates: Option<u32>,
    ) -> IterationOptions {
        IterationOptions {
            predict_spans: predict_spans.unwrap_or(self.predict_spans),
            reranking_candidates: reranking_candidates.unwrap_or(self.reranking_candidates),
        }
    }
}

/// Defaults for introspection-only requests
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntrospectDefaults {
    pub threshold: f32,
    pub top_k: usize,
}

impl Default for IntrospectDefaults {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            top_k: 20,
        }
    }
}

/// Defaults for single-description requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparateDefaults {
    pub predict_spans: bool,
    pub reranking_candidates: u32,
}

impl Default for SeparateDefaults {
    fn default() -> Self {
        Self {
            predict_spans: false,
            reranking_candidates: 0,
        }
    }
}

impl SeparateDefaults {
    /// Per-request options, request values winning over these defaults
    pub fn iteration_options(
        &self,
        predict_spans: Option<bool>,
        reranking_candidates: Option<u32>,
    ) -> IterationOptions {
        IterationOptions {
            predict_spans: predict_spans.unwrap_or(self.predict_spans),
            reranking_candidates: reranking_candidates.unwrap_or(self.reranking_candidates),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Canonical rate every request is converted to
    pub sample_rate: u32,

    pub inference: InferenceConfig,

    pub separator: SeparatorConfig,

    /// Introspection is unavailable without a scorer
    pub scorer: Option<ScorerConfig>,

    /// Taxonomy file (built-in catalogue when absent)
    pub taxonomy_path: Option<PathBuf>,

    pub disentangle: DisentangleDefaults,

    pub introspect: IntrospectDefaults,

    pub separate: SeparateDefaults,

    /// Batch workers (0 = `inference.num_threads`)
    pub batch_workers: usize,

    /// Per-request deadline for async callers
    pub timeout_secs: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            inference: InferenceConfig::default(),
            separator: SeparatorConfig::default(),
            scorer: None,
            taxonomy_path: None,
            disentangle: DisentangleDefaults::default(),
            introspect: IntrospectDefaults::default(),
            separate: SeparateDefaults::default(),
            batch_workers: 0,
            timeout_secs: None,
        }
    }
}

impl EngineConfig {
    /// Load from a YAML or JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> MlResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;

        let config: EngineConfig = if is_yaml(path) {
            serde_yml::from_str(&text).map_err(|e| MlError::Serialization(e.to_string()))?
        } else {
            serde_json::from_str(&text).map_err(|e| MlError::Serialization(e.to_string()))?
        };

        config.validate()?;
        log::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Set separator model files
    pub fn with_separator(
        mut self,
        model_path: impl Into<PathBuf>,
        embeddings_path: impl Into<PathBuf>,
    ) -> Self {
        self.separator = SeparatorConfig {
            model_path: model_path.into(),
            embeddings_path: embeddings_path.into(),
        };
        self
    }

    /// Enable introspection with the given scorer
    pub fn with_scorer(mut self, scorer: ScorerConfig) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Set batch worker count
    pub fn with_batch_workers(mut self, workers: usize) -> Self {
        self.batch_workers = workers;
        self
    }

    /// Effective batch worker count; falls back to the inference thread count
    pub fn workers(&self) -> usize {
        if self.batch_workers == 0 {
            self.inference.threads()
        } else {
            self.batch_workers
        }
    }

    /// Reject settings no request could succeed with
    pub fn validate(&self) -> MlResult<()> {
        if self.sample_rate == 0 {
            return Err(MlError::Configuration("sample_rate must be positive".into()));
        }
        if self.separator.model_path.as_os_str().is_empty() {
            return Err(MlError::Configuration("separator.model_path is not set".into()));
        }
        if self.separator.embeddings_path.as_os_str().is_empty() {
            return Err(MlError::Configuration("separator.embeddings_path is not set".into()));
        }

        if let Some(scorer) = &self.scorer {
            if scorer.model_path.as_os_str().is_empty() {
                return Err(MlError::Configuration("scorer.model_path is not set".into()));
            }
            if scorer.embeddings_path.as_os_str().is_empty() {
                return Err(MlError::Configuration("scorer.embeddings_path is not set".into()));
            }
            if scorer.sample_rate != self.sample_rate {
                return Err(MlError::Configuration(format!(
                    "scorer runs at {} Hz but the engine is canonical at {} Hz",
                    scorer.sample_rate, self.sample_rate
                )));
            }
            if !scorer.segment_secs.is_finite() || scorer.segment_secs <= 0.0 {
                return Err(MlError::Configuration(format!(
                    "scorer.segment_secs must be positive, got {}",
                    scorer.segment_secs
                )));
            }
        }

        if self.timeout_secs == Some(0) {
            return Err(MlError::Configuration("timeout_secs must be positive".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn minimal() -> EngineConfig {
        EngineConfig::default().with_separator("sep.onnx", "sep.json")
    }

    #[test]
    fn test_request_defaults() {
        let config = EngineConfig::default();

        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.disentangle.threshold, 0.2);
        assert_eq!(config.disentangle.top_k_fallback, 5);
        assert!(config.disentangle.predict_spans);
        assert_eq!(config.disentangle.reranking_candidates, 8);
        assert_eq!(config.introspect.threshold, 0.0);
        assert_eq!(config.introspect.top_k, 20);
        assert!(!config.separate.predict_spans);
        assert_eq!(config.separate.reranking_candidates, 0);
    }

    #[test]
    fn test_request_overrides_win() {
        let config = EngineConfig::default();

        let options = config.disentangle.iteration_options(None, Some(2));
        assert!(options.predict_spans);
        assert_eq!(options.reranking_candidates, 2);

        let options = config.separate.iteration_options(Some(true), None);
        assert!(options.predict_spans);
        assert_eq!(options.reranking_candidates, 0);

        let options = config.separate.iteration_options(None, None);
        assert!(!options.predict_spans);
    }

    #[test]
    fn test_validate_requires_separator() {
        assert!(matches!(
            EngineConfig::default().validate(),
            Err(MlError::Configuration(_))
        ));
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn test_validate_scorer_rate() {
        let config = minimal().with_scorer(ScorerConfig {
            model_path: "clap.onnx".into(),
            embeddings_path: "clap.json".into(),
            sample_rate: 48000,
            ..Default::default()
        });
        assert!(matches!(config.validate(), Err(MlError::Configuration(_))));
    }

    #[test]
    fn test_validate_zero_rate() {
        let mut config = minimal();
        config.sample_rate = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_yaml_partial() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "separator:\n  model_path: sep.onnx\n  embeddings_path: sep.json\ndisentangle:\n  threshold: 0.35\nbatch_workers: 2"
        )
        .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.disentangle.threshold, 0.35);
        assert_eq!(config.disentangle.top_k_fallback, 5);
        assert_eq!(config.workers(), 2);
        assert!(config.scorer.is_none());
    }

    #[test]
    fn test_load_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"separator": {{"model_path": "a.onnx", "embeddings_path": "a.json"}},
                "scorer": {{"model_path": "c.onnx", "embeddings_path": "c.json", "logit_scale": 100.0}},
                "timeout_secs": 30}}"#
        )
        .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        let scorer = config.scorer.unwrap();
        assert_eq!(scorer.logit_scale, 100.0);
        assert_eq!(scorer.sample_rate, 44100);
        assert_eq!(config.timeout_secs, Some(30));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            EngineConfig::load(file.path()),
            Err(MlError::Serialization(_))
        ));
    }
}
