//! Training run: load corpora, build the plan, drive the trainer.

use crate::config::Config;
use color_eyre::Section;
use eyre::{Context, Result};
use melops_train::audio::Spectrogram;
use melops_train::baseline::LabelPrior;
use melops_train::batch::Batcher;
use melops_train::checkpoint::ArchiveCheckpoint;
use melops_train::curriculum::CurriculumPlan;
use melops_train::model::{NetworkConfig, TrainingContext};
use melops_train::progress::ConsoleReporter;
use melops_train::source::ExampleSource;
use melops_train::trainer::{StopSignal, Trainer};
use melops_train::vocabulary::{self, CharVocabulary, Vocabulary};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

pub fn execute(config: Config, stop: StopSignal) -> Result<()> {
    let context = TrainingContext::new(config.use_gpu, config.trainer_count)?;

    let vocabulary: Arc<dyn Vocabulary> = match &config.vocab {
        Some(path) => vocabulary::from_path(path)
            .wrap_err_with(|| format!("failed to load vocabulary: {:?}", path.display()))?,
        None => Arc::new(CharVocabulary::english()),
    };

    let spectrogram = Spectrogram::default();
    let train = open_source(&config.train_manifest, vocabulary.as_ref(), spectrogram)?
        .with_seed(config.seed);
    let dev = open_source(&config.dev_manifest, vocabulary.as_ref(), spectrogram)?;

    let batcher = Batcher::new(config.batch_size, train.channels(), config.max_frames)?;
    let plan = CurriculumPlan::new(config.use_sortagrad, config.num_passes)?;

    let network = NetworkConfig {
        feature_channels: train.channels(),
        vocab_size: vocabulary.size(),
        num_conv_layers: config.layers.num_conv_layers,
        num_rnn_layers: config.layers.num_rnn_layers,
        rnn_layer_size: config.layers.rnn_layer_size,
    };
    let model = LabelPrior::new(&context, network, config.optimizer);

    let mut reporter = ConsoleReporter::stdout(config.log_interval);
    let mut sink = ArchiveCheckpoint::new(&config.checkpoint);
    let mut trainer = Trainer::new(&context, model, batcher, train, dev).with_stop_signal(stop);

    let s = Instant::now();

    let summary = trainer
        .run(&plan, &mut reporter, &mut sink)
        .wrap_err("training failed")?;

    let d = s.elapsed();
    tracing::info!(
        duration = %format_secs(d.as_secs_f32()),
        passes = summary.passes,
        steps = summary.steps,
        test_cost = ?summary.last_test_cost,
        checkpoint = ?config.checkpoint.display(),
        "training completed"
    );

    if summary.interrupted {
        tracing::warn!(
            passes = summary.passes,
            planned = plan.total_passes(),
            "training interrupted"
        );
    }

    Ok(())
}

fn open_source(
    path: &Path,
    vocabulary: &dyn Vocabulary,
    spectrogram: Spectrogram,
) -> Result<ExampleSource> {
    ExampleSource::open(path, vocabulary, spectrogram)
        .wrap_err_with(|| format!("failed to open manifest: {:?}", path.display()))
        .with_suggestion(|| {
            "pass --train-manifest and --dev-manifest to point at JSON-lines manifests"
        })
}

/// Format seconds as a string with two decimal places.
fn format_secs(secs: f32) -> String {
    format!("{:.2}s", secs)
}
