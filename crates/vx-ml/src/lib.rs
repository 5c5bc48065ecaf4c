//! # VocalX Disentanglement Engine
//!
//! Text-queried source separation, one sound at a time:
//! - Introspection (audio-text similarity over a sound taxonomy)
//! - Separation (text-conditioned ONNX separator)
//! - Iterative disentanglement (residual chaining)
//!
//! ## Architecture
//!
//! Both models run on the pure Rust `tract` backend. Adapters sit behind the
//! [`Separator`] and [`SimilarityScorer`] traits; the orchestrator only sees
//! the traits, so test doubles drop in anywhere a model would.
//!
//! ## Request flow
//!
//! ```text
//! audio ─> mono + canonical rate ─> introspect (optional) ─> disentangle ─> tracks + residual
//! ```
//!
//! Model handles are loaded once into an [`EngineContext`] and shared by
//! every request.

pub mod disentangle;
pub mod introspection;
pub mod separation;
pub mod service;
pub mod taxonomy;

mod config;
mod context;
mod embedding;
mod error;
mod inference;

pub use config::{
    DisentangleDefaults, EngineConfig, IntrospectDefaults, ScorerConfig, SeparateDefaults,
    SeparatorConfig,
};
pub use context::{EngineContext, HealthStatus};
pub use disentangle::{DisentangleResult, IterationOptions, Orchestrator, Track};
pub use embedding::{EmbeddingTable, TextEmbedder, cosine_similarity};
pub use error::{FailureClass, MlError, MlResult, RequestFailure};
pub use inference::{InferenceConfig, InferenceEngine};
pub use introspection::{Introspection, Introspector, ScoreMap, SimilarityScorer};
pub use separation::{SeparationOutput, SeparationParams, Separator};
pub use taxonomy::SoundTaxonomy;

use vx_core::Waveform;

/// Default model locations
pub mod models {
    /// Text-conditioned separator
    pub const SEPARATOR: &str = "models/separator.onnx";

    /// Separator conditioning table
    pub const SEPARATOR_EMBEDDINGS: &str = "models/separator_text.json";

    /// CLAP audio encoder
    pub const CLAP_AUDIO: &str = "models/clap_audio.onnx";

    /// CLAP text table
    pub const CLAP_EMBEDDINGS: &str = "models/clap_text.json";
}

/// Adapters accept mono at their own rate only
pub(crate) fn ensure_canonical(waveform: &Waveform, expected_rate: u32) -> MlResult<()> {
    if !waveform.is_mono() {
        return Err(MlError::ChannelMismatch {
            expected: 1,
            got: waveform.num_channels(),
        });
    }
    if waveform.sample_rate() != expected_rate {
        return Err(MlError::InvalidSampleRate {
            expected: expected_rate,
            got: waveform.sample_rate(),
        });
    }
    Ok(())
}
