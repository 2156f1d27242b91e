//! Example source: one corpus pass at a time, in a chosen order.

use crate::audio::{Spectrogram, read_audio_mono};
use crate::error::{Error, Result};
use crate::manifest::{Manifest, Utterance};
use crate::vocabulary::Vocabulary;
use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};

/// Order in which a pass visits the corpus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassOrder {
    /// Shortest first; ties keep manifest order
    DurationSorted,
    /// Fresh random permutation on every pass
    Shuffled,
    /// Manifest order
    Manifest,
}

/// Single training example.
#[derive(Clone, Debug, PartialEq)]
pub struct Example {
    /// Features shaped (channels, frames)
    pub features: Array2<f32>,
    /// Label indices
    pub label: Vec<u32>,
    /// Duration in seconds from the manifest
    pub duration: f32,
    pub audio_path: PathBuf,
}

impl Example {
    pub fn channels(&self) -> usize {
        self.features.nrows()
    }

    pub fn frames(&self) -> usize {
        self.features.ncols()
    }
}

/// Restartable source of examples over one manifest.
pub struct ExampleSource {
    manifest: Manifest,
    spectrogram: Spectrogram,
    rng: StdRng,
}

impl ExampleSource {
    /// Seed used when none is given.
    pub const DEFAULT_SEED: u64 = 42;

    /// Load a manifest and prepare a source over it.
    pub fn open(
        path: impl AsRef<Path>,
        vocabulary: &dyn Vocabulary,
        spectrogram: Spectrogram,
    ) -> Result<Self> {
        let manifest = Manifest::load(path, vocabulary)?;
        Ok(Self::new(manifest, spectrogram))
    }

    pub fn new(manifest: Manifest, spectrogram: Spectrogram) -> Self {
        Self {
            manifest,
            spectrogram,
            rng: StdRng::seed_from_u64(Self::DEFAULT_SEED),
        }
    }

    /// Reseed the shuffle generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Feature channels every example of this source has.
    pub fn channels(&self) -> usize {
        self.spectrogram.channels()
    }

    /// Manifest indices for a fresh pass.
    ///
    /// Each shuffled call draws a new permutation from the source's generator.
    pub fn order(&mut self, order: PassOrder) -> Vec<usize> {
        let utterances = self.manifest.utterances();
        let mut indices: Vec<usize> = (0..utterances.len()).collect();

        match order {
            PassOrder::DurationSorted => {
                indices.sort_by(|&a, &b| utterances[a].duration.total_cmp(&utterances[b].duration));
            }
            PassOrder::Shuffled => indices.shuffle(&mut self.rng),
            PassOrder::Manifest => {}
        }

        indices
    }

    /// Start a lazy pass over the corpus.
    pub fn pass(&mut self, order: PassOrder) -> Pass<'_> {
        let indices = self.order(order);
        tracing::debug!(manifest = ?self.manifest.path().display(), ?order, "starting pass");

        Pass {
            manifest: &self.manifest,
            spectrogram: &self.spectrogram,
            indices: indices.into_iter(),
            emitted: 0,
            skipped: 0,
            finished: false,
        }
    }
}

/// Lazy iterator over one corpus pass.
///
/// Utterances whose audio cannot be decoded are logged and skipped. A pass
/// that emits nothing ends with a single [`Error::EmptyCorpus`].
pub struct Pass<'a> {
    manifest: &'a Manifest,
    spectrogram: &'a Spectrogram,
    indices: std::vec::IntoIter<usize>,
    emitted: usize,
    skipped: usize,
    finished: bool,
}

impl Pass<'_> {
    /// Utterances skipped so far in this pass.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn read(&self, utterance: &Utterance) -> Result<Example> {
        let audio = read_audio_mono(&utterance.audio_path)?;

        Ok(Example {
            features: self.spectrogram.apply(&audio),
            label: utterance.label.clone(),
            duration: utterance.duration,
            audio_path: utterance.audio_path.clone(),
        })
    }
}

impl Iterator for Pass<'_> {
    type Item = Result<Example>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let manifest = self.manifest;

        while let Some(index) = self.indices.next() {
            let utterance = &manifest.utterances()[index];

            match self.read(utterance) {
                Ok(example) => {
                    self.emitted += 1;
                    return Some(Ok(example));
                }
                Err(error) => {
                    tracing::warn!(
                        audio = ?utterance.audio_path.display(),
                        line = utterance.line,
                        %error,
                        "skipping unreadable audio"
                    );
                    self.skipped += 1;
                }
            }
        }

        self.finished = true;

        (self.emitted == 0).then(|| {
            Err(Error::EmptyCorpus {
                path: self.manifest.path().to_path_buf(),
            })
        })
    }
}
