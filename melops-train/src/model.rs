//! Contract between the training loop and a model backend.

use crate::batch::Batch;
use crate::error::{BoxError, ConfigError, Result};
use serde::{Deserialize, Serialize};

/// Model and optimizer driven by the training loop.
///
/// The loop owns the model exclusively: `train_step` gets `&mut self`, while
/// evaluation and export only ever see `&self` between steps.
pub trait AcousticModel {
    /// Run one optimizer update on `batch` and return its training cost.
    ///
    /// A non-finite cost is not an error; the loop reports it and continues.
    fn train_step(&mut self, batch: &Batch) -> std::result::Result<f32, BoxError>;

    /// Cost of `batch` without updating parameters.
    fn evaluate(&self, batch: &Batch) -> std::result::Result<f32, BoxError>;

    /// Snapshot of the current parameters.
    fn export_parameters(&self) -> std::result::Result<Vec<Parameter>, BoxError>;
}

/// Named dense parameter tensor.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub shape: Vec<usize>,
    /// Row-major values
    pub values: Vec<f32>,
}

/// Process-wide backend settings.
///
/// Built once at startup and passed by reference, so nothing about devices or
/// workers lives in global state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrainingContext {
    pub use_gpu: bool,
    /// Parallel workers the backend may use for gradient averaging
    pub trainer_count: usize,
}

impl TrainingContext {
    pub fn new(use_gpu: bool, trainer_count: usize) -> Result<Self> {
        if trainer_count == 0 {
            return Err(ConfigError::InvalidTrainerCount(trainer_count).into());
        }

        tracing::info!(use_gpu, trainer_count, "training context initialized");

        Ok(Self {
            use_gpu,
            trainer_count,
        })
    }
}

/// Network shape handed to a backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Feature channels per input frame
    pub feature_channels: usize,
    /// Output labels, excluding any blank a backend adds
    pub vocab_size: usize,
    pub num_conv_layers: usize,
    pub num_rnn_layers: usize,
    pub rnn_layer_size: usize,
}

/// Optimizer hyperparameters handed to a backend.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub learning_rate: f32,
    /// Gradients with a larger L2 norm are rescaled to this norm
    pub gradient_clipping_threshold: f32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            learning_rate: 5e-4,
            gradient_clipping_threshold: 400.0,
        }
    }
}
