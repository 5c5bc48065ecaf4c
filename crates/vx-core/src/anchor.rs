//! Temporal anchors for separation requests
//!
//! An anchor biases the separator toward (`+`) or away from (`-`) a time
//! region. On the wire anchors arrive as JSON triples:
//!
//! ```text
//! [["+", 6.3, 7.0], ["-", 0.0, 1.0]]
//! ```
//!
//! Parsing and validation happen here, at the boundary. The engine passes
//! anchors through to the separator untouched.

use serde::{Deserialize, Serialize};

use crate::error::{VxError, VxResult};

/// Anchor polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnchorPolarity {
    /// Region contains the target sound
    Include,
    /// Region does not contain the target sound
    Exclude,
}

impl AnchorPolarity {
    /// Wire token (`+` / `-`)
    pub fn token(&self) -> &'static str {
        match self {
            AnchorPolarity::Include => "+",
            AnchorPolarity::Exclude => "-",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "+" => Some(AnchorPolarity::Include),
            "-" => Some(AnchorPolarity::Exclude),
            _ => None,
        }
    }

    /// Signed weight used when rendering anchor masks
    pub fn sign(&self) -> f32 {
        match self {
            AnchorPolarity::Include => 1.0,
            AnchorPolarity::Exclude => -1.0,
        }
    }
}

/// Time-region hint `[start, end)` in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "(String, f64, f64)", into = "(String, f64, f64)")]
pub struct Anchor {
    pub polarity: AnchorPolarity,
    pub start: f64,
    pub end: f64,
}

impl Anchor {
    /// Create a validated anchor
    pub fn new(polarity: AnchorPolarity, start: f64, end: f64) -> VxResult<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(VxError::InvalidAnchor(format!(
                "bounds must be finite, got [{start}, {end})"
            )));
        }
        if start < 0.0 {
            return Err(VxError::InvalidAnchor(format!("start {start} is negative")));
        }
        if end <= start {
            return Err(VxError::InvalidAnchor(format!(
                "end {end} must be greater than start {start}"
            )));
        }
        Ok(Self {
            polarity,
            start,
            end,
        })
    }

    pub fn include(start: f64, end: f64) -> VxResult<Self> {
        Self::new(AnchorPolarity::Include, start, end)
    }

    pub fn exclude(start: f64, end: f64) -> VxResult<Self> {
        Self::new(AnchorPolarity::Exclude, start, end)
    }

    /// Sample range covered at `sample_rate`, clamped to `frames`
    pub fn frame_range(&self, sample_rate: u32, frames: usize) -> std::ops::Range<usize> {
        let to_frame = |secs: f64| ((secs * sample_rate as f64).round() as usize).min(frames);
        to_frame(self.start)..to_frame(self.end)
    }

    /// Parse the JSON anchor list form; blank input means no anchors
    pub fn parse_list(json: &str) -> VxResult<Option<Vec<Anchor>>> {
        if json.trim().is_empty() {
            return Ok(None);
        }
        let anchors: Vec<Anchor> =
            serde_json::from_str(json).map_err(|e| VxError::InvalidAnchor(e.to_string()))?;
        Ok(Some(anchors))
    }
}

impl TryFrom<(String, f64, f64)> for Anchor {
    type Error = VxError;

    fn try_from((token, start, end): (String, f64, f64)) -> VxResult<Self> {
        let polarity = AnchorPolarity::from_token(&token).ok_or_else(|| {
            VxError::InvalidAnchor(format!("unknown polarity '{token}', expected '+' or '-'"))
        })?;
        Anchor::new(polarity, start, end)
    }
}

impl From<Anchor> for (String, f64, f64) {
    fn from(anchor: Anchor) -> Self {
        (anchor.polarity.token().to_string(), anchor.start, anchor.end)
    }
}
