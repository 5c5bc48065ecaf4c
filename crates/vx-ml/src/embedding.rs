//! Text embeddings for descriptions
//!
//! Both ONNX adapters are conditioned on text. The text encoder runs
//! offline; its vectors ship as a JSON table:
//!
//! ```json
//! { "dimension": 512, "embeddings": { "drum kit": [0.01, ...], ... } }
//! ```

use std::collections::HashMap;
use std::path::Path;

use ndarray::Array2;
use serde::Deserialize;
use vx_core::Description;

use crate::error::{MlError, MlResult};

/// Maps descriptions to fixed-size vectors
pub trait TextEmbedder: Send + Sync {
    /// Embedding width
    fn dimension(&self) -> usize;

    /// Embed one description
    fn embed(&self, description: &Description) -> MlResult<Vec<f32>>;

    /// Embed a batch as rows of a `[n, dimension]` matrix
    fn embed_batch(&self, descriptions: &[Description]) -> MlResult<Array2<f32>> {
        let dim = self.dimension();
        let mut matrix = Array2::<f32>::zeros((descriptions.len(), dim));
        for (row, description) in descriptions.iter().enumerate() {
            let vector = self.embed(description)?;
            matrix
                .row_mut(row)
                .iter_mut()
                .zip(vector)
                .for_each(|(dst, src)| *dst = src);
        }
        Ok(matrix)
    }
}

#[derive(Deserialize)]
struct EmbeddingFile {
    dimension: usize,
    embeddings: HashMap<String, Vec<f32>>,
}

/// Precomputed description -> vector table
#[derive(Debug, Clone)]
pub struct EmbeddingTable {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl EmbeddingTable {
    /// Build a table, checking every vector has `dimension` entries
    pub fn new(dimension: usize, vectors: HashMap<String, Vec<f32>>) -> MlResult<Self> {
        if dimension == 0 {
            return Err(MlError::Configuration("embedding dimension must be positive".into()));
        }
        if let Some((label, vector)) = vectors.iter().find(|(_, v)| v.len() != dimension) {
            return Err(MlError::InvalidInputShape {
                expected: format!("{dimension}-d embedding for '{label}'"),
                got: format!("{}-d", vector.len()),
            });
        }
        Ok(Self { dimension, vectors })
    }

    /// Load from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> MlResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let file: EmbeddingFile =
            serde_json::from_str(&text).map_err(|e| MlError::Serialization(e.to_string()))?;

        let table = Self::new(file.dimension, file.embeddings)?;
        log::info!(
            "Loaded {} text embeddings ({}-d) from {}",
            table.len(),
            table.dimension,
            path.display()
        );
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn contains(&self, description: &Description) -> bool {
        self.vectors.contains_key(description.as_str())
    }
}

impl TextEmbedder for EmbeddingTable {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, description: &Description) -> MlResult<Vec<f32>> {
        self.vectors
            .get(description.as_str())
            .cloned()
            .ok_or_else(|| MlError::UnknownDescription(description.to_string()))
    }
}

/// Cosine similarity; zero when either vector has no energy
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a < 1e-10 || norm_b < 1e-10 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
