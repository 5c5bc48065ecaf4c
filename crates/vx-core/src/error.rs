//! Error types for VocalX

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum VxError {
    #[error("Invalid waveform: {0}")]
    InvalidWaveform(String),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Channel length mismatch: channel {channel} has {got} frames, expected {expected}")]
    ChannelLengthMismatch {
        channel: usize,
        expected: usize,
        got: usize,
    },

    #[error("Invalid anchor: {0}")]
    InvalidAnchor(String),

    #[error("Resampling failed: {0}")]
    Resample(String),
}

/// Result type alias
pub type VxResult<T> = Result<T, VxError>;
