//! Corpus fixtures shared by unit tests.

use crate::audio::SAMPLE_RATE;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// Write a 16kHz mono WAV of `duration` seconds.
pub fn write_wav(path: &Path, duration: f32) {
    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let samples = (duration * SAMPLE_RATE as f32).round() as usize;

    let mut writer = WavWriter::create(path, spec).unwrap();
    for i in 0..samples {
        let t = i as f32 / SAMPLE_RATE as f32;
        let sample = 0.25 * (2.0 * std::f32::consts::PI * 440.0 * t).sin();
        writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// Write `{i}.wav` per duration plus a `manifest.jsonl` listing them in order.
///
/// Transcripts are `clip a`, `clip b`, ...
pub fn write_corpus(durations: &[f32]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let mut manifest = String::new();

    for (i, &duration) in durations.iter().enumerate() {
        write_wav(&dir.path().join(format!("{i}.wav")), duration);
        let letter = char::from(b'a' + (i % 26) as u8);
        writeln!(
            manifest,
            r#"{{"audio_path": "{i}.wav", "transcript": "clip {letter}", "duration": {duration}}}"#
        )
        .unwrap();
    }

    let path = dir.path().join("manifest.jsonl");
    std::fs::write(&path, manifest).unwrap();
    (dir, path)
}

/// Shared in-memory log sink.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` and return its output with every warning it logged.
pub fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_max_level(Level::WARN)
        .with_ansi(false)
        .finish();

    let output = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
    (output, logs)
}
