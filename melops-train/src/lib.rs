//! melops-train: curriculum-ordered batch pipeline and training loop for
//! spectrogram-based speech models.
//!
//! Utterances listed in a JSON-lines manifest are turned into log-power
//! spectrograms, grouped into fixed-shape padded batches, and fed to a model
//! backend pass by pass. The first pass can visit the corpus shortest-first
//! (SortaGrad) before switching to shuffled passes.
//!
//! # Architecture
//!
//! - [`source::ExampleSource`]: Restartable passes over a manifest in a chosen order
//! - [`batch::Batcher`]: Groups examples into padded [`batch::Batch`]es
//! - [`curriculum::CurriculumPlan`]: Which order each pass uses
//! - [`trainer::Trainer`]: Runs the plan against a [`model::AcousticModel`]
//!
//! Checkpoints go through [`checkpoint::CheckpointSink`] and progress through
//! [`progress::ProgressReporter`].
//!
//! # Quick Start
//!
//! ```ignore
//! use melops_train::audio::Spectrogram;
//! use melops_train::baseline::LabelPrior;
//! use melops_train::batch::{Batcher, DEFAULT_MAX_FRAMES};
//! use melops_train::checkpoint::ArchiveCheckpoint;
//! use melops_train::curriculum::CurriculumPlan;
//! use melops_train::model::{NetworkConfig, OptimizerConfig, TrainingContext};
//! use melops_train::progress::ConsoleReporter;
//! use melops_train::source::ExampleSource;
//! use melops_train::trainer::Trainer;
//! use melops_train::vocabulary::{CharVocabulary, Vocabulary};
//!
//! let context = TrainingContext::new(false, 1)?;
//! let vocabulary = CharVocabulary::english();
//! let train = ExampleSource::open("libri.manifest.train", &vocabulary, Spectrogram::default())?;
//! let dev = ExampleSource::open("libri.manifest.dev", &vocabulary, Spectrogram::default())?;
//! let batcher = Batcher::new(32, train.channels(), DEFAULT_MAX_FRAMES)?;
//!
//! let network = NetworkConfig {
//!     feature_channels: train.channels(),
//!     vocab_size: vocabulary.size(),
//!     num_conv_layers: 2,
//!     num_rnn_layers: 3,
//!     rnn_layer_size: 512,
//! };
//! let model = LabelPrior::new(&context, network, OptimizerConfig::default());
//!
//! let mut trainer = Trainer::new(&context, model, batcher, train, dev);
//! let summary = trainer.run(
//!     &CurriculumPlan::new(true, 10)?,
//!     &mut ConsoleReporter::stdout(10),
//!     &mut ArchiveCheckpoint::new("params.tar.gz"),
//! )?;
//! ```

pub mod audio;
pub mod baseline;
pub mod batch;
pub mod checkpoint;
pub mod curriculum;
pub mod error;
pub mod manifest;
pub mod model;
pub mod progress;
pub mod source;
pub mod trainer;
pub mod vocabulary;

#[cfg(test)]
mod testing;
