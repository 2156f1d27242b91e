//! Resolved training configuration.
//!
//! Args structs (for CLI parsing) remain in cli.rs.

use crate::cli::Cli;
use eyre::{Result, ensure};
use melops_train::model::OptimizerConfig;
use std::path::PathBuf;

/// Layer counts and widths; channel and vocabulary sizes come from the data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerConfig {
    pub num_conv_layers: usize,
    pub num_rnn_layers: usize,
    pub rnn_layer_size: usize,
}

/// Resolved configuration for a training run.
///
/// Converted from Cli via TryFrom.
#[derive(Debug)]
pub struct Config {
    pub train_manifest: PathBuf,
    pub dev_manifest: PathBuf,
    pub vocab: Option<PathBuf>,
    pub checkpoint: PathBuf,
    pub max_frames: usize,
    /// Examples per batch for a single trainer
    pub batch_size: usize,
    pub trainer_count: usize,
    pub num_passes: usize,
    pub use_gpu: bool,
    pub use_sortagrad: bool,
    pub seed: u64,
    pub log_interval: usize,
    pub layers: LayerConfig,
    pub optimizer: OptimizerConfig,
}

impl TryFrom<Cli> for Config {
    type Error = eyre::Error;

    fn try_from(cli: Cli) -> Result<Self> {
        let Cli {
            data,
            network,
            training,
        } = cli;

        ensure!(training.batch_size > 0, "batch size must be at least 1");
        ensure!(training.trainer > 0, "trainer must be at least 1");
        ensure!(training.trainer_count > 0, "trainer count must be at least 1");
        ensure!(training.num_passes > 0, "number of passes must be at least 1");
        ensure!(data.max_frames > 0, "max frames must be at least 1");
        ensure!(
            training.learning_rate.is_finite() && training.learning_rate > 0.0,
            "learning rate must be positive, got {}",
            training.learning_rate
        );
        ensure!(
            training.gradient_clipping.is_finite() && training.gradient_clipping > 0.0,
            "gradient clipping threshold must be positive, got {}",
            training.gradient_clipping
        );

        let batch_size = training.batch_size / training.trainer;
        ensure!(
            batch_size > 0,
            "batch size {} cannot be split across {} trainers",
            training.batch_size,
            training.trainer
        );
        if training.batch_size % training.trainer != 0 {
            tracing::warn!(
                batch_size = training.batch_size,
                trainer = training.trainer,
                per_trainer = batch_size,
                "batch size not divisible by trainer, remainder dropped"
            );
        }

        Ok(Self {
            train_manifest: data.train_manifest,
            dev_manifest: data.dev_manifest,
            vocab: data.vocab,
            checkpoint: data.checkpoint,
            max_frames: data.max_frames,
            batch_size,
            trainer_count: training.trainer_count,
            num_passes: training.num_passes,
            use_gpu: training.use_gpu,
            use_sortagrad: training.use_sortagrad,
            seed: training.seed,
            log_interval: training.log_interval,
            layers: LayerConfig {
                num_conv_layers: network.num_conv_layers,
                num_rnn_layers: network.num_rnn_layers,
                rnn_layer_size: network.rnn_layer_size,
            },
            optimizer: OptimizerConfig {
                learning_rate: training.learning_rate,
                gradient_clipping_threshold: training.gradient_clipping,
            },
        })
    }
}
