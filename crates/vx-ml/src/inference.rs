//! ONNX inference engine abstraction
//!
//! Uses tract (pure Rust) as the backend. Each engine owns one runnable plan
//! behind a mutex, so concurrent requests sharing a model are serialized at
//! the model boundary rather than in the orchestrator.

use std::path::{Path, PathBuf};

use ndarray::ArrayD;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{MlError, MlResult};

/// Configuration for inference engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Worker threads for batch processing (0 = one per CPU)
    pub num_threads: usize,
    /// Run tract's graph optimizer after loading
    pub optimize_graph: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            num_threads: 0,
            optimize_graph: true,
        }
    }
}

impl InferenceConfig {
    /// Effective thread count
    pub fn threads(&self) -> usize {
        if self.num_threads == 0 {
            num_cpus::get()
        } else {
            self.num_threads
        }
    }
}

/// Tract model wrapper
struct TractModel {
    model: tract_onnx::prelude::SimplePlan<
        tract_onnx::prelude::TypedFact,
        Box<dyn tract_onnx::prelude::TypedOp>,
        tract_onnx::prelude::Graph<
            tract_onnx::prelude::TypedFact,
            Box<dyn tract_onnx::prelude::TypedOp>,
        >,
    >,
}

/// Unified inference engine
pub struct InferenceEngine {
    /// Runnable plan, one inference at a time
    tract_model: Mutex<TractModel>,
    /// Source path, for logs and health reports
    path: PathBuf,
}

impl InferenceEngine {
    /// Create new inference engine with model
    pub fn new<P: AsRef<Path>>(model_path: P, config: &InferenceConfig) -> MlResult<Self> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(MlError::ModelNotFound {
                path: path.display().to_string(),
            });
        }

        log::info!(
            "Loading ONNX model {} (optimize_graph={})",
            path.display(),
            config.optimize_graph
        );

        let model = Self::load_tract_model(path, config.optimize_graph)?;

        Ok(Self {
            tract_model: Mutex::new(model),
            path: path.to_path_buf(),
        })
    }

    /// Load tract model
    fn load_tract_model(path: &Path, optimize: bool) -> MlResult<TractModel> {
        use tract_onnx::prelude::*;

        let inference_model = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| MlError::ModelLoadFailed {
                reason: format!("{}: {}", path.display(), e),
            })?;

        let typed = if optimize {
            inference_model.into_optimized()
        } else {
            inference_model.into_typed()
        }
        .map_err(|e| MlError::TractError(e.to_string()))?;

        let model = typed
            .into_runnable()
            .map_err(|e| MlError::TractError(e.to_string()))?;

        Ok(TractModel { model })
    }

    /// Model name derived from the file stem
    pub fn model_name(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model")
            .to_string()
    }

    /// Run inference with f32 input/output
    pub fn run_f32(&self, inputs: &[ArrayD<f32>]) -> MlResult<Vec<ArrayD<f32>>> {
        use tract_onnx::prelude::*;

        // Convert inputs to tract tensors
        let tract_inputs: TVec<TValue> = inputs
            .iter()
            .map(|arr| {
                let tensor: Tensor = arr.clone().into();
                tensor.into()
            })
            .collect();

        let outputs = {
            let tract = self.tract_model.lock();
            tract
                .model
                .run(tract_inputs)
                .map_err(|e| MlError::InferenceFailed {
                    reason: e.to_string(),
                })?
        };

        // Convert outputs back to ndarray
        let mut result = Vec::with_capacity(outputs.len());
        for output in outputs.iter() {
            let tensor = output
                .to_array_view::<f32>()
                .map_err(|e| MlError::TractError(e.to_string()))?;
            result.push(tensor.to_owned().into_dyn());
        }

        Ok(result)
    }

    /// Run inference and return the first output as a 2D array
    pub fn run_first_array2(&self, inputs: &[ArrayD<f32>]) -> MlResult<ndarray::Array2<f32>> {
        let outputs = self.run_f32(inputs)?;

        let Some(output) = outputs.into_iter().next() else {
            return Err(MlError::InferenceFailed {
                reason: "No output from model".into(),
            });
        };

        let shape = output.shape().to_vec();
        output
            .into_dimensionality::<ndarray::Ix2>()
            .map_err(|_| MlError::InvalidOutputShape {
                expected: "2D tensor".into(),
                got: format!("{}D tensor {:?}", shape.len(), shape),
            })
    }
}
