//! Padded minibatch assembly.
//!
//! Every batch of a run has the same feature shape
//! `[batch_size, channels, max_frames]`: rows are right-padded to the fixed
//! ceiling rather than to the longest example in the batch. Labels are padded
//! to the longest label in the batch and their true lengths are kept.

use crate::error::{ConfigError, Result, ShapeError};
use crate::source::Example;
use ndarray::{Array2, Array3, s};

/// Feature padding value. Below `ln(POWER_FLOOR)`, so never produced by the
/// spectrogram.
pub const FEATURE_PAD_VALUE: f32 = -1.0e4;

/// Label padding value. Never a vocabulary index.
pub const LABEL_PAD_VALUE: i32 = -1;

/// Default padding ceiling in frames (10s at a 10ms stride).
pub const DEFAULT_MAX_FRAMES: usize = 1000;

/// What to do with a final group smaller than the batch size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrailingBatch {
    /// Emit it as a short batch
    #[default]
    Emit,
    /// Drop it
    Drop,
}

/// Dense padded batch.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    /// Features shaped (batch, channels, max_frames)
    pub features: Array3<f32>,
    /// Unpadded frame count per example
    pub feature_lengths: Vec<usize>,
    /// Labels shaped (batch, longest label), padded with [`LABEL_PAD_VALUE`]
    pub labels: Array2<i32>,
    /// Unpadded label length per example
    pub label_lengths: Vec<usize>,
    /// Manifest duration per example
    pub durations: Vec<f32>,
}

impl Batch {
    /// Number of examples.
    pub fn len(&self) -> usize {
        self.feature_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_lengths.is_empty()
    }

    /// Labels of example `index` without padding.
    pub fn label(&self, index: usize) -> impl Iterator<Item = i32> + '_ {
        self.labels
            .row(index)
            .into_iter()
            .take(self.label_lengths[index])
            .copied()
    }
}

/// Groups examples into fixed-shape padded batches.
#[derive(Clone, Copy, Debug)]
pub struct Batcher {
    batch_size: usize,
    channels: usize,
    max_frames: usize,
    pad_value: f32,
    trailing: TrailingBatch,
}

impl Batcher {
    /// Create a batcher for `channels`-channel features padded to `max_frames`.
    pub fn new(batch_size: usize, channels: usize, max_frames: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(batch_size).into());
        }
        if max_frames == 0 {
            return Err(ConfigError::InvalidMaxFrames(max_frames).into());
        }

        Ok(Self {
            batch_size,
            channels,
            max_frames,
            pad_value: FEATURE_PAD_VALUE,
            trailing: TrailingBatch::default(),
        })
    }

    pub fn with_pad_value(mut self, pad_value: f32) -> Self {
        self.pad_value = pad_value;
        self
    }

    pub fn with_trailing(mut self, trailing: TrailingBatch) -> Self {
        self.trailing = trailing;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Group a lazy example stream into batches.
    ///
    /// The first error ends the stream.
    pub fn batches<I>(&self, examples: I) -> Batches<I::IntoIter>
    where
        I: IntoIterator<Item = Result<Example>>,
    {
        Batches {
            batcher: *self,
            examples: examples.into_iter(),
            done: false,
        }
    }

    /// Pad one group of examples into a batch.
    ///
    /// # Errors
    ///
    /// - [`ShapeError::Overflow`] if an example is longer than the ceiling
    /// - [`ShapeError::ChannelMismatch`] if an example has other channels
    pub fn assemble(&self, examples: &[Example]) -> Result<Batch> {
        for example in examples {
            if example.channels() != self.channels {
                return Err(ShapeError::ChannelMismatch {
                    audio_path: example.audio_path.clone(),
                    expected: self.channels,
                    got: example.channels(),
                }
                .into());
            }
            if example.frames() > self.max_frames {
                return Err(ShapeError::Overflow {
                    audio_path: example.audio_path.clone(),
                    frames: example.frames(),
                    ceiling: self.max_frames,
                }
                .into());
            }
        }

        let n = examples.len();
        let mut features = Array3::from_elem((n, self.channels, self.max_frames), self.pad_value);

        for (i, example) in examples.iter().enumerate() {
            features
                .slice_mut(s![i, .., ..example.frames()])
                .assign(&example.features);
        }

        let longest_label = examples.iter().map(|e| e.label.len()).max().unwrap_or(0);
        let mut labels = Array2::from_elem((n, longest_label), LABEL_PAD_VALUE);

        for (i, example) in examples.iter().enumerate() {
            for (j, &token) in example.label.iter().enumerate() {
                labels[[i, j]] = token as i32;
            }
        }

        Ok(Batch {
            features,
            feature_lengths: examples.iter().map(Example::frames).collect(),
            labels,
            label_lengths: examples.iter().map(|e| e.label.len()).collect(),
            durations: examples.iter().map(|e| e.duration).collect(),
        })
    }
}

/// Lazy iterator of batches over an example stream.
pub struct Batches<I> {
    batcher: Batcher,
    examples: I,
    done: bool,
}

impl<I> Iterator for Batches<I>
where
    I: Iterator<Item = Result<Example>>,
{
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut group = Vec::with_capacity(self.batcher.batch_size);

        while group.len() < self.batcher.batch_size {
            match self.examples.next() {
                Some(Ok(example)) => group.push(example),
                Some(Err(error)) => {
                    self.done = true;
                    return Some(Err(error));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }

        if group.is_empty() {
            return None;
        }

        if group.len() < self.batcher.batch_size && self.batcher.trailing == TrailingBatch::Drop {
            tracing::debug!(examples = group.len(), "dropping trailing batch");
            return None;
        }

        let batch = self.batcher.assemble(&group);
        if batch.is_err() {
            self.done = true;
        }
        Some(batch)
    }
}
