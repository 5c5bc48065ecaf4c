//! Text-queried source separation
//!
//! A separator extracts the sound matching one description from a mono
//! mixture and returns it together with everything else (the residual).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vx_ml::separation::{OnnxSeparator, SeparationParams, Separator};
//!
//! let separator = OnnxSeparator::new("models/separator.onnx", embeddings, 44100, &inference)?;
//! let out = separator.separate(&mono, &"lead vocals".into(), &SeparationParams::single())?;
//!
//! let vocals = out.target;
//! let backing = out.residual;
//! ```

mod config;
mod onnx;

pub use config::SeparationParams;
pub use onnx::OnnxSeparator;

use vx_core::{Description, Waveform};

use crate::error::MlResult;

/// Target estimate plus what remains
#[derive(Debug, Clone, PartialEq)]
pub struct SeparationOutput {
    /// Isolated sound matching the description
    pub target: Waveform,
    /// Input minus target; same rate and length as the input
    pub residual: Waveform,
}

/// Common trait for text-queried separators
pub trait Separator: Send + Sync {
    /// Extract `description` from `waveform`
    ///
    /// # Arguments
    /// * `waveform` - Mono audio at [`Separator::sample_rate`]
    /// * `description` - Sound to extract
    /// * `params` - Anchors and search-budget knobs, passed through to the model
    fn separate(
        &self,
        waveform: &Waveform,
        description: &Description,
        params: &SeparationParams,
    ) -> MlResult<SeparationOutput>;

    /// Rate the model was loaded at
    fn sample_rate(&self) -> u32;

    /// Get model name/version
    fn model_name(&self) -> &str;
}
