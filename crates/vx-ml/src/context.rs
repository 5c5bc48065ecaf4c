//! Engine context: models and catalogue loaded once, shared by every request

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::embedding::EmbeddingTable;
use crate::error::{MlError, MlResult};
use crate::introspection::{ClapScorer, SimilarityScorer};
use crate::separation::{OnnxSeparator, Separator};
use crate::taxonomy::SoundTaxonomy;

/// Loaded-model report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Separator model name
    pub separator_model: String,
    /// Scorer model name, `None` when introspection is unavailable
    pub scorer_model: Option<String>,
    pub sample_rate: u32,
    pub taxonomy_version: String,
    pub taxonomy_size: usize,
}

/// Model handles plus configuration
///
/// Cheap to clone; clones share the same model handles.
#[derive(Clone)]
pub struct EngineContext {
    config: Arc<EngineConfig>,
    separator: Arc<dyn Separator>,
    scorer: Option<Arc<dyn SimilarityScorer>>,
    taxonomy: Arc<SoundTaxonomy>,
}

impl EngineContext {
    /// Assemble a context from already-built adapters
    pub fn new(
        config: EngineConfig,
        separator: Arc<dyn Separator>,
        scorer: Option<Arc<dyn SimilarityScorer>>,
        taxonomy: SoundTaxonomy,
    ) -> MlResult<Self> {
        if config.sample_rate == 0 {
            return Err(MlError::Configuration("sample_rate must be positive".into()));
        }
        if separator.sample_rate() != config.sample_rate {
            return Err(MlError::Configuration(format!(
                "separator {} runs at {} Hz, engine at {} Hz",
                separator.model_name(),
                separator.sample_rate(),
                config.sample_rate
            )));
        }
        if let Some(scorer) = &scorer {
            if scorer.sample_rate() != config.sample_rate {
                return Err(MlError::Configuration(format!(
                    "scorer {} runs at {} Hz, engine at {} Hz",
                    scorer.model_name(),
                    scorer.sample_rate(),
                    config.sample_rate
                )));
            }
        }

        Ok(Self {
            config: Arc::new(config),
            separator,
            scorer,
            taxonomy: Arc::new(taxonomy),
        })
    }

    /// Load every model named in `config`; fails fast on anything missing
    pub fn bootstrap(config: &EngineConfig) -> MlResult<Self> {
        config.validate()?;

        let separator_text = EmbeddingTable::load(&config.separator.embeddings_path)
            .map_err(|e| startup_error("separator embeddings", e))?;
        let separator = OnnxSeparator::new(
            &config.separator.model_path,
            Arc::new(separator_text),
            config.sample_rate,
            &config.inference,
        )
        .map_err(|e| startup_error("separator model", e))?;

        let scorer: Option<Arc<dyn SimilarityScorer>> = match &config.scorer {
            Some(scorer_config) => {
                let scorer_text = EmbeddingTable::load(&scorer_config.embeddings_path)
                    .map_err(|e| startup_error("scorer embeddings", e))?;
                let scorer = ClapScorer::new(
                    &scorer_config.model_path,
                    Arc::new(scorer_text),
                    scorer_config,
                    &config.inference,
                )
                .map_err(|e| startup_error("scorer model", e))?;
                Some(Arc::new(scorer))
            }
            None => {
                log::warn!("No scorer configured; introspection is unavailable");
                None
            }
        };

        let taxonomy = match &config.taxonomy_path {
            Some(path) => SoundTaxonomy::load(path).map_err(|e| startup_error("taxonomy", e))?,
            None => SoundTaxonomy::builtin().clone(),
        };

        let context = Self::new(config.clone(), Arc::new(separator), scorer, taxonomy)?;
        log::info!(
            "Engine ready: separator={}, scorer={}, taxonomy={} ({} labels)",
            context.separator.model_name(),
            context.scorer.as_ref().map_or("none", |s| s.model_name()),
            context.taxonomy.version,
            context.taxonomy.len()
        );
        Ok(context)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Canonical rate
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn separator(&self) -> &dyn Separator {
        self.separator.as_ref()
    }

    /// Scorer, or `ScorerUnavailable` when none was configured
    pub fn scorer(&self) -> MlResult<&dyn SimilarityScorer> {
        self.scorer
            .as_deref()
            .ok_or_else(|| MlError::ScorerUnavailable("no scorer configured".into()))
    }

    pub fn taxonomy(&self) -> &SoundTaxonomy {
        &self.taxonomy
    }

    /// What is loaded
    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            separator_model: self.separator.model_name().to_string(),
            scorer_model: self.scorer.as_ref().map(|s| s.model_name().to_string()),
            sample_rate: self.config.sample_rate,
            taxonomy_version: self.taxonomy.version.clone(),
            taxonomy_size: self.taxonomy.len(),
        }
    }
}

/// Loading errors become configuration errors naming the component
fn startup_error(component: &str, error: MlError) -> MlError {
    match error {
        MlError::ModelNotFound { path } => {
            MlError::Configuration(format!("{component}: file not found: {path}"))
        }
        MlError::IoError(e) => MlError::Configuration(format!("{component}: {e}")),
        other @ MlError::Configuration(_) => other,
        other => MlError::Configuration(format!("{component}: {other}")),
    }
}
