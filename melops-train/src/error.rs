//! Error types for melops-train organized by pipeline stage.

use std::path::PathBuf;
use thiserror::Error;

/// Opaque error produced by a model backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Training pipeline error variants organized by stage.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration stage error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Manifest could not be read
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// No usable example remained in a corpus
    #[error("corpus has no valid examples: {}", path.display())]
    EmptyCorpus { path: PathBuf },

    /// Audio loading stage error
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// Batch assembly error
    #[error(transparent)]
    Shape(#[from] ShapeError),

    /// Checkpoint persistence error
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// Model backend error
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Tokenizer error
    #[error(transparent)]
    Tokenizers(tokenizers::Error),
}

/// Configuration errors (batch sizes, pass counts, vocabulary files).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Batch size must be positive
    #[error("invalid batch size: {0} (must be at least 1)")]
    InvalidBatchSize(usize),

    /// Padding ceiling must be positive
    #[error("invalid padding ceiling: {0} frames (must be at least 1)")]
    InvalidMaxFrames(usize),

    /// Number of passes must be positive
    #[error("invalid number of passes: {0} (must be at least 1)")]
    InvalidPassCount(usize),

    /// Worker count must be positive
    #[error("invalid trainer count: {0} (must be at least 1)")]
    InvalidTrainerCount(usize),

    /// Vocabulary file could not be used
    #[error("invalid vocabulary {}: {reason}", path.display())]
    InvalidVocabulary { path: PathBuf, reason: String },
}

/// Manifest read errors.
///
/// File-level variants are fatal. Entry-level variants are reported and the
/// entry is skipped.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Manifest file could not be opened or read
    #[error("failed to read manifest {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Entry is not a valid JSON record
    #[error("line {line}: malformed entry")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Entry has no duration field
    #[error("line {line}: missing duration")]
    MissingDuration { line: usize },

    /// Entry duration is negative or not finite
    #[error("line {line}: invalid duration {duration}")]
    InvalidDuration { line: usize, duration: f64 },

    /// Entry references audio that does not exist
    #[error("line {line}: audio not found: {}", path.display())]
    AudioNotFound { line: usize, path: PathBuf },

    /// Entry has an empty transcript
    #[error("line {line}: empty transcript")]
    EmptyTranscript { line: usize },

    /// Transcript contains text the vocabulary cannot encode
    #[error("line {line}: transcript not encodable: {reason}")]
    Unencodable { line: usize, reason: String },
}

/// Audio loading and validation errors.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Sample rate validation failed
    #[error("invalid sample rate: expected {expected}Hz, got {got}Hz")]
    InvalidSampleRate { expected: u32, got: u32 },

    /// Channel count validation failed
    #[error("invalid channel count: expected mono or stereo, got {0} channels")]
    InvalidChannels(u16),

    /// IO error during audio loading
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// WAV file format error
    #[error(transparent)]
    Hound(#[from] hound::Error),
}

/// Batch shape errors. All are fatal configuration mismatches.
#[derive(Debug, Error)]
pub enum ShapeError {
    /// Example is longer than the fixed padding ceiling
    #[error("example {} has {frames} frames, exceeding the padding ceiling of {ceiling}", audio_path.display())]
    Overflow {
        audio_path: PathBuf,
        frames: usize,
        ceiling: usize,
    },

    /// Example feature channels do not match the batch layout
    #[error("example {} has {got} feature channels, expected {expected}", audio_path.display())]
    ChannelMismatch {
        audio_path: PathBuf,
        expected: usize,
        got: usize,
    },

    /// ndarray shape error
    #[error(transparent)]
    Ndarray(#[from] ndarray::ShapeError),
}

/// Checkpoint persistence errors.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Archive could not be written
    #[error("failed to write checkpoint {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Archive could not be read
    #[error("failed to read checkpoint {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Archive is missing entries or has inconsistent sizes
    #[error("corrupt checkpoint {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Parameter name collides with another entry of the archive
    #[error("invalid checkpoint parameter name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// Parameter metadata could not be (de)serialized
    #[error("invalid checkpoint metadata")]
    Metadata(#[from] serde_json::Error),
}

/// Errors surfaced by the model backend.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Optimizer step failed
    #[error("optimizer step failed at pass {pass}, batch {batch}")]
    Step {
        pass: usize,
        batch: usize,
        #[source]
        source: BoxError,
    },

    /// Held-out evaluation failed
    #[error("evaluation failed at pass {pass}")]
    Evaluation {
        pass: usize,
        #[source]
        source: BoxError,
    },

    /// Parameter snapshot failed
    #[error("parameter export failed at pass {pass}")]
    Export {
        pass: usize,
        #[source]
        source: BoxError,
    },
}

/// Result type alias for melops-train operations.
pub type Result<T> = std::result::Result<T, Error>;

// Nested From implementations for automatic error conversion chains

// hound::Error → AudioError → Error
impl From<hound::Error> for Error {
    fn from(e: hound::Error) -> Self {
        Error::Audio(AudioError::Hound(e))
    }
}

// ndarray::ShapeError → ShapeError → Error
impl From<ndarray::ShapeError> for Error {
    fn from(e: ndarray::ShapeError) -> Self {
        Error::Shape(ShapeError::Ndarray(e))
    }
}
