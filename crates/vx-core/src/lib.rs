//! vx-core: Shared types for VocalX
//!
//! Waveforms, sound descriptions and temporal anchors used by the
//! disentanglement engine and its front ends.

mod anchor;
mod description;
mod error;
mod waveform;

pub use anchor::*;
pub use description::*;
pub use error::*;
pub use waveform::*;

/// Sample rate the separation model is loaded at unless configured otherwise
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
