//! Label-prior reference backend.
//!
//! Learns a unigram distribution over labels by gradient descent on the
//! cross-entropy of the batch labels. It ignores the audio entirely, which
//! makes it a useful floor to compare real backends against and a cheap way
//! to exercise the whole training loop.

use crate::batch::Batch;
use crate::error::BoxError;
use crate::model::{AcousticModel, NetworkConfig, OptimizerConfig, Parameter, TrainingContext};
use ndarray::Array1;

pub struct LabelPrior {
    network: NetworkConfig,
    optimizer: OptimizerConfig,
    logits: Array1<f32>,
}

impl LabelPrior {
    pub const PARAMETER_NAME: &str = "label_prior.logits";

    /// Start from the uniform distribution.
    pub fn new(
        context: &TrainingContext,
        network: NetworkConfig,
        optimizer: OptimizerConfig,
    ) -> Self {
        if context.use_gpu {
            tracing::warn!("label prior backend runs on cpu");
        }
        tracing::info!(
            vocab_size = network.vocab_size,
            learning_rate = optimizer.learning_rate,
            "label prior backend ready"
        );

        let logits = Array1::zeros(network.vocab_size);
        Self {
            network,
            optimizer,
            logits,
        }
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Current label distribution.
    pub fn probabilities(&self) -> Array1<f32> {
        let max = self.logits.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let exp = self.logits.mapv(|x| (x - max).exp());
        let sum = exp.sum();
        exp / sum
    }

    /// Label counts of a batch and their total.
    fn histogram(&self, batch: &Batch) -> Result<(Array1<f32>, f32), BoxError> {
        let vocab_size = self.network.vocab_size;
        let mut counts = Array1::<f32>::zeros(vocab_size);

        for i in 0..batch.len() {
            for token in batch.label(i) {
                let index = usize::try_from(token)
                    .ok()
                    .filter(|&index| index < vocab_size)
                    .ok_or_else(|| format!("label {token} outside vocabulary of {vocab_size}"))?;
                counts[index] += 1.0;
            }
        }

        let total = counts.sum();
        if total == 0.0 {
            return Err("batch has no labels".into());
        }

        Ok((counts, total))
    }

    fn cost(probabilities: &Array1<f32>, counts: &Array1<f32>, total: f32) -> f32 {
        let log_likelihood: f32 = counts
            .iter()
            .zip(probabilities)
            .filter(|(count, _)| **count > 0.0)
            .map(|(count, p)| count * p.ln())
            .sum();
        -log_likelihood / total
    }
}

impl AcousticModel for LabelPrior {
    fn train_step(&mut self, batch: &Batch) -> Result<f32, BoxError> {
        let (counts, total) = self.histogram(batch)?;
        let probabilities = self.probabilities();
        let cost = Self::cost(&probabilities, &counts, total);

        // d(cost)/d(logits) for softmax cross-entropy
        let mut gradient = probabilities - counts / total;

        let norm = gradient.dot(&gradient).sqrt();
        let threshold = self.optimizer.gradient_clipping_threshold;
        if norm > threshold {
            gradient *= threshold / norm;
        }

        self.logits.scaled_add(-self.optimizer.learning_rate, &gradient);

        Ok(cost)
    }

    fn evaluate(&self, batch: &Batch) -> Result<f32, BoxError> {
        let (counts, total) = self.histogram(batch)?;
        Ok(Self::cost(&self.probabilities(), &counts, total))
    }

    fn export_parameters(&self) -> Result<Vec<Parameter>, BoxError> {
        Ok(vec![Parameter {
            name: Self::PARAMETER_NAME.to_string(),
            shape: vec![self.logits.len()],
            values: self.logits.to_vec(),
        }])
    }
}
