//! Sound descriptions

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Immutable text label naming a target sound ("electric guitar riff")
///
/// Cloning is cheap; labels are shared between taxonomy, score maps and tracks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Description(Arc<str>);

impl Description {
    pub fn new(label: impl AsRef<str>) -> Self {
        Self(Arc::from(label.as_ref()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-friendly form ("808 bass" -> "808_bass")
    pub fn slug(&self) -> String {
        let slug: String = self
            .0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        let trimmed = slug.trim_matches('_');
        if trimmed.is_empty() { "sound".to_string() } else { trimmed.to_string() }
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Description {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Description {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for Description {
    fn from(label: String) -> Self {
        Self(Arc::from(label))
    }
}
