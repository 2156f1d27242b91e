//! CLI argument definitions using clap.

use clap::{ArgAction, Parser};
use eyre::Result;
use melops_train::batch::DEFAULT_MAX_FRAMES;
use melops_train::source::ExampleSource;
use melops_train::trainer::StopSignal;
use std::path::PathBuf;

pub const DEFAULT_BATCH_SIZE: usize = 512;
pub const DEFAULT_TRAINER_COUNT: usize = 8;
pub const DEFAULT_NUM_PASSES: usize = 20;
pub const DEFAULT_LOG_INTERVAL: usize = 10;

#[derive(Debug, Parser)]
#[command(name = "mel-train")]
#[command(about = "Train a speech model on spectrogram batches with an optional SortaGrad first pass")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub network: NetworkArgs,

    #[command(flatten)]
    pub training: TrainingArgs,
}

/// Corpus and artifact locations.
#[derive(clap::Args, Debug)]
pub struct DataArgs {
    /// Training manifest (JSON lines)
    #[arg(long, default_value = "./libri.manifest.train")]
    pub train_manifest: PathBuf,

    /// Held-out manifest evaluated after every pass
    #[arg(long, default_value = "./libri.manifest.dev")]
    pub dev_manifest: PathBuf,

    /// Vocabulary file, one token per line, or a tokenizer.json
    /// (default: lowercase English letters, space and apostrophe)
    #[arg(long)]
    pub vocab: Option<PathBuf>,

    /// Checkpoint archive, overwritten after every pass
    #[arg(long, default_value = "params.tar.gz")]
    pub checkpoint: PathBuf,

    /// Padding ceiling in spectrogram frames
    #[arg(long, default_value_t = DEFAULT_MAX_FRAMES)]
    pub max_frames: usize,
}

/// Network shape.
#[derive(clap::Args, Debug)]
pub struct NetworkArgs {
    /// Convolution layers
    #[arg(long, default_value_t = 3)]
    pub num_conv_layers: usize,

    /// Recurrent layers
    #[arg(long, default_value_t = 5)]
    pub num_rnn_layers: usize,

    /// Recurrent layer width
    #[arg(long, default_value_t = 256)]
    pub rnn_layer_size: usize,
}

/// Optimization schedule and runtime.
#[derive(clap::Args, Debug)]
pub struct TrainingArgs {
    /// Minibatch size across all trainers
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Trainers the minibatch is split across
    #[arg(long, default_value_t = 1)]
    pub trainer: usize,

    /// Worker threads for the backend
    #[arg(long, default_value_t = DEFAULT_TRAINER_COUNT)]
    pub trainer_count: usize,

    /// Training passes
    #[arg(long, default_value_t = DEFAULT_NUM_PASSES)]
    pub num_passes: usize,

    /// Use the GPU backend if available
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub use_gpu: bool,

    /// Visit the corpus shortest-first on the first pass
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub use_sortagrad: bool,

    /// Seed for shuffled passes
    #[arg(long, default_value_t = ExampleSource::DEFAULT_SEED)]
    pub seed: u64,

    /// Print a cost line every N batches
    #[arg(long, default_value_t = DEFAULT_LOG_INTERVAL)]
    pub log_interval: usize,

    #[arg(long, default_value_t = 5e-4)]
    pub learning_rate: f32,

    /// Gradient L2 norm clipping threshold
    #[arg(long, default_value_t = 400.0)]
    pub gradient_clipping: f32,
}

/// Execute CLI command - separated for testing.
pub fn run(cli: Cli, stop: StopSignal) -> Result<()> {
    tracing::debug!(?cli, "parsed arguments");

    crate::train::execute(cli.try_into()?, stop)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults() {
        let cli = Cli::parse_from(["mel-train"]);

        assert_eq!(cli.data.train_manifest.to_str(), Some("./libri.manifest.train"));
        assert_eq!(cli.data.dev_manifest.to_str(), Some("./libri.manifest.dev"));
        assert_eq!(cli.data.checkpoint.to_str(), Some("params.tar.gz"));
        assert!(cli.data.vocab.is_none());
        assert_eq!(cli.data.max_frames, 1000);

        assert_eq!(cli.network.num_conv_layers, 3);
        assert_eq!(cli.network.num_rnn_layers, 5);
        assert_eq!(cli.network.rnn_layer_size, 256);

        assert_eq!(cli.training.batch_size, 512);
        assert_eq!(cli.training.trainer, 1);
        assert_eq!(cli.training.trainer_count, 8);
        assert_eq!(cli.training.num_passes, 20);
        assert!(cli.training.use_gpu);
        assert!(!cli.training.use_sortagrad);
        assert_eq!(cli.training.seed, 42);
        assert_eq!(cli.training.log_interval, 10);
        assert!((cli.training.learning_rate - 5e-4).abs() < 1e-9);
        assert!((cli.training.gradient_clipping - 400.0).abs() < 1e-3);
    }

    #[test]
    fn parses_explicit_booleans() {
        let cli = Cli::parse_from([
            "mel-train",
            "--use-gpu",
            "false",
            "--use-sortagrad",
            "true",
        ]);

        assert!(!cli.training.use_gpu);
        assert!(cli.training.use_sortagrad);
    }

    #[test]
    fn parses_paths_and_sizes() {
        let cli = Cli::parse_from([
            "mel-train",
            "--train-manifest",
            "data/train.jsonl",
            "--vocab",
            "vocab.txt",
            "--batch-size",
            "64",
            "--trainer",
            "4",
            "--num-passes",
            "3",
        ]);

        assert_eq!(cli.data.train_manifest.to_str(), Some("data/train.jsonl"));
        assert!(cli.data.vocab.as_deref().is_some_and(|p| p == "vocab.txt"));
        assert_eq!(cli.training.batch_size, 64);
        assert_eq!(cli.training.trainer, 4);
        assert_eq!(cli.training.num_passes, 3);
    }

    #[test]
    fn rejects_bare_boolean_flag() {
        assert!(Cli::try_parse_from(["mel-train", "--use-gpu"]).is_err());
    }
}
