//! Error types for the disentanglement engine

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vx_core::VxError;

/// Engine error types
#[derive(Error, Debug)]
pub enum MlError {
    /// Missing or inconsistent startup configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Model file not found
    #[error("Model not found: {path}")]
    ModelNotFound { path: String },

    /// Model loading failed
    #[error("Failed to load model: {reason}")]
    ModelLoadFailed { reason: String },

    /// Similarity scorer was never initialised
    #[error("Similarity scorer unavailable: {0}")]
    ScorerUnavailable(String),

    /// Inference failed
    #[error("Inference failed: {reason}")]
    InferenceFailed { reason: String },

    /// Invalid input shape
    #[error("Invalid input shape: expected {expected}, got {got}")]
    InvalidInputShape { expected: String, got: String },

    /// Invalid output shape
    #[error("Invalid output shape: expected {expected}, got {got}")]
    InvalidOutputShape { expected: String, got: String },

    /// Invalid sample rate
    #[error("Invalid sample rate: expected {expected}, got {got}")]
    InvalidSampleRate { expected: u32, got: u32 },

    /// Channel count mismatch
    #[error("Channel count mismatch: expected {expected}, got {got}")]
    ChannelMismatch { expected: usize, got: usize },

    /// Nothing to work on
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Description has no text embedding
    #[error("Unknown description: '{0}'")]
    UnknownDescription(String),

    /// Scorer returned the wrong number of scores
    #[error("Scorer returned {got} scores for {expected} descriptions")]
    ScoreCountMismatch { expected: usize, got: usize },

    /// Separation model raised
    #[error("Separation failed: {0}")]
    SeparationFailed(String),

    /// Adapter output breaks its contract (length, rate, channels)
    #[error("Adapter contract violated: {0}")]
    AdapterContract(String),

    /// One disentanglement iteration failed; the whole run is discarded
    #[error("Iteration {iteration} ('{description}') failed: {source}")]
    IterationFailed {
        iteration: usize,
        description: String,
        #[source]
        source: Box<MlError>,
    },

    /// Processing timeout
    #[error("Processing timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Tract error
    #[error("Tract error: {0}")]
    TractError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Config or table (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Waveform / anchor error from vx-core
    #[error(transparent)]
    Core(#[from] VxError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for engine operations
pub type MlResult<T> = Result<T, MlError>;

/// Coarse failure classes reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Startup condition; not recoverable per request
    Configuration,
    /// No audio, or nothing to separate and nothing to scan
    EmptyInput,
    /// Malformed request content (rate, channels, anchors, unknown labels)
    InvalidRequest,
    /// Scorer or separator raised
    Adapter,
    /// Caller deadline exceeded
    Timeout,
}

impl MlError {
    /// Classify this error for the per-request boundary
    pub fn class(&self) -> FailureClass {
        match self {
            MlError::Configuration(_)
            | MlError::ModelNotFound { .. }
            | MlError::ModelLoadFailed { .. }
            | MlError::ScorerUnavailable(_) => FailureClass::Configuration,
            MlError::EmptyInput(_) => FailureClass::EmptyInput,
            MlError::InvalidSampleRate { .. }
            | MlError::ChannelMismatch { .. }
            | MlError::UnknownDescription(_)
            | MlError::Core(_) => FailureClass::InvalidRequest,
            MlError::Timeout { .. } => FailureClass::Timeout,
            MlError::IterationFailed { source, .. } => source.class(),
            _ => FailureClass::Adapter,
        }
    }

    /// Iteration index for loop failures
    pub fn iteration(&self) -> Option<usize> {
        match self {
            MlError::IterationFailed { iteration, .. } => Some(*iteration),
            _ => None,
        }
    }
}

/// Structured per-request failure, safe to serialize back to a caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFailure {
    pub class: FailureClass,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<usize>,
}

impl From<&MlError> for RequestFailure {
    fn from(error: &MlError) -> Self {
        Self {
            class: error.class(),
            message: error.to_string(),
            iteration: error.iteration(),
        }
    }
}

impl From<MlError> for RequestFailure {
    fn from(error: MlError) -> Self {
        Self::from(&error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_failure_class_follows_source() {
        let err = MlError::IterationFailed {
            iteration: 2,
            description: "snare drum".into(),
            source: Box::new(MlError::SeparationFailed("out of memory".into())),
        };

        let failure = RequestFailure::from(&err);
        assert_eq!(failure.class, FailureClass::Adapter);
        assert_eq!(failure.iteration, Some(2));
        assert!(failure.message.contains("snare drum"));
        assert!(failure.message.contains("out of memory"));
    }

    #[test]
    fn test_classes() {
        assert_eq!(
            MlError::Configuration("missing model".into()).class(),
            FailureClass::Configuration
        );
        assert_eq!(MlError::EmptyInput("no audio".into()).class(), FailureClass::EmptyInput);
        assert_eq!(
            MlError::Core(VxError::InvalidAnchor("bad".into())).class(),
            FailureClass::InvalidRequest
        );
        assert_eq!(MlError::Timeout { timeout_ms: 10 }.class(), FailureClass::Timeout);
    }

    #[test]
    fn test_failure_serialization() {
        let failure = RequestFailure::from(MlError::EmptyInput("empty file".into()));
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["class"], "empty_input");
        assert!(json.get("iteration").is_none());
    }
}
