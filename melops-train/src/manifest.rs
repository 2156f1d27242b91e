//! Corpus manifest parsing.
//!
//! A manifest is a JSON-lines file with one utterance per line:
//!
//! ```text
//! {"audio_path": "clips/0001.wav", "transcript": "hello world", "duration": 1.42}
//! ```
//!
//! The `audio_filepath` and `text` field names are accepted as aliases.
//! Relative audio paths resolve against the manifest's directory.

use crate::error::{Error, ManifestError, Result};
use crate::vocabulary::Vocabulary;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One raw manifest record.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ManifestEntry {
    #[serde(alias = "audio_filepath")]
    pub audio_path: PathBuf,
    #[serde(alias = "text")]
    pub transcript: String,
    /// Duration in seconds
    pub duration: Option<f64>,
}

/// Validated manifest entry with its encoded label.
#[derive(Clone, Debug)]
pub struct Utterance {
    /// 1-based manifest line
    pub line: usize,
    pub audio_path: PathBuf,
    pub transcript: String,
    pub duration: f32,
    pub label: Vec<u32>,
}

/// Validated corpus manifest.
#[derive(Clone, Debug)]
pub struct Manifest {
    path: PathBuf,
    utterances: Vec<Utterance>,
    skipped: usize,
}

impl Manifest {
    /// Read and validate a manifest.
    ///
    /// Malformed entries are logged and skipped.
    ///
    /// # Errors
    ///
    /// - [`ManifestError::Read`] if the file cannot be read
    /// - [`Error::EmptyCorpus`] if no entry is valid
    pub fn load(path: impl AsRef<Path>, vocabulary: &dyn Vocabulary) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let base_dir = path.parent().unwrap_or(Path::new(""));

        let mut utterances = Vec::new();
        let mut skipped = 0;

        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            match parse_entry(i + 1, line, base_dir, vocabulary) {
                Ok(utterance) => utterances.push(utterance),
                Err(error) => {
                    tracing::warn!(manifest = ?path.display(), %error, "skipping manifest entry");
                    skipped += 1;
                }
            }
        }

        if utterances.is_empty() {
            return Err(Error::EmptyCorpus {
                path: path.to_path_buf(),
            });
        }

        tracing::info!(
            manifest = ?path.display(),
            entries = utterances.len(),
            skipped,
            "manifest loaded"
        );

        Ok(Self {
            path: path.to_path_buf(),
            utterances,
            skipped,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Valid entries in manifest order.
    pub fn utterances(&self) -> &[Utterance] {
        &self.utterances
    }

    pub fn len(&self) -> usize {
        self.utterances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utterances.is_empty()
    }

    /// Number of entries rejected at load time, one warning each.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

fn parse_entry(
    line: usize,
    text: &str,
    base_dir: &Path,
    vocabulary: &dyn Vocabulary,
) -> std::result::Result<Utterance, ManifestError> {
    let entry: ManifestEntry =
        serde_json::from_str(text).map_err(|source| ManifestError::Malformed { line, source })?;

    let duration = entry
        .duration
        .ok_or(ManifestError::MissingDuration { line })?;

    if !duration.is_finite() || duration < 0.0 {
        return Err(ManifestError::InvalidDuration { line, duration });
    }

    let audio_path = base_dir.join(&entry.audio_path);
    if !audio_path.is_file() {
        return Err(ManifestError::AudioNotFound {
            line,
            path: audio_path,
        });
    }

    if entry.transcript.trim().is_empty() {
        return Err(ManifestError::EmptyTranscript { line });
    }

    let label = vocabulary
        .encode(&entry.transcript)
        .map_err(|e| ManifestError::Unencodable {
            line,
            reason: e.to_string(),
        })?;

    Ok(Utterance {
        line,
        audio_path,
        transcript: entry.transcript,
        duration: duration as f32,
        label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::capture_warnings;
    use crate::vocabulary::CharVocabulary;
    use std::fs;
    use tempfile::TempDir;

    fn corpus(lines: &[String]) -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..lines.len() {
            fs::write(dir.path().join(format!("{i}.wav")), b"").unwrap();
        }
        let path = dir.path().join("manifest.jsonl");
        fs::write(&path, lines.join("\n")).unwrap();
        (dir, path)
    }

    fn entry(i: usize, duration: f64) -> String {
        format!(r#"{{"audio_path": "{i}.wav", "transcript": "utterance", "duration": {duration}}}"#)
    }

    #[test]
    fn loads_valid_entries_in_order() {
        let lines: Vec<_> = (0..3).map(|i| entry(i, i as f64 + 0.5)).collect();
        let (dir, path) = corpus(&lines);

        let manifest = Manifest::load(&path, &CharVocabulary::english()).unwrap();

        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest.skipped(), 0);
        assert_eq!(manifest.utterances()[2].duration, 2.5);
        assert_eq!(manifest.utterances()[0].audio_path, dir.path().join("0.wav"));
        assert_eq!(manifest.utterances()[0].label.len(), "utterance".len());
    }

    #[test]
    fn accepts_provider_aliases() {
        let lines =
            vec![r#"{"audio_filepath": "0.wav", "text": "hello", "duration": 1.0}"#.to_string()];
        let (_dir, path) = corpus(&lines);

        let manifest = Manifest::load(&path, &CharVocabulary::english()).unwrap();

        assert_eq!(manifest.utterances()[0].transcript, "hello");
    }

    #[test]
    fn skips_one_malformed_entry_among_ten() {
        let mut lines: Vec<_> = (0..10).map(|i| entry(i, 1.0)).collect();
        lines[4] = "{not json".to_string();
        let (_dir, path) = corpus(&lines);

        let (manifest, logs) =
            capture_warnings(|| Manifest::load(&path, &CharVocabulary::english()));
        let manifest = manifest.unwrap();

        assert_eq!(manifest.len(), 9);
        assert_eq!(manifest.skipped(), 1);
        assert!(manifest.utterances().iter().all(|u| u.line != 5));
        assert_eq!(logs.matches("skipping manifest entry").count(), 1);
        assert!(logs.contains("line 5: malformed entry"));
    }

    #[test]
    fn rejects_entry_errors() {
        let vocabulary = CharVocabulary::english();
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.wav"), b"").unwrap();

        let cases = [
            (r#"{"audio_path": "a.wav", "transcript": "hi"}"#, "missing duration"),
            (
                r#"{"audio_path": "a.wav", "transcript": "hi", "duration": -1.0}"#,
                "invalid duration",
            ),
            (r#"{"audio_path": "b.wav", "transcript": "hi", "duration": 1.0}"#, "audio not found"),
            (r#"{"audio_path": "a.wav", "transcript": " ", "duration": 1.0}"#, "empty transcript"),
            (r#"{"audio_path": "a.wav", "transcript": "h1", "duration": 1.0}"#, "not encodable"),
        ];

        for (text, expected) in cases {
            let error = parse_entry(7, text, dir.path(), &vocabulary).unwrap_err();
            let message = error.to_string();
            assert!(message.starts_with("line 7"), "{message}");
            assert!(message.contains(expected), "{message}");
        }
    }

    #[test]
    fn missing_manifest_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();

        let result = Manifest::load(dir.path().join("absent.jsonl"), &CharVocabulary::english());

        assert!(matches!(
            result,
            Err(Error::Manifest(ManifestError::Read { .. }))
        ));
    }

    #[test]
    fn all_invalid_is_an_empty_corpus() {
        let (_dir, path) = corpus(&["garbage".to_string(), "{}".to_string()]);

        let result = Manifest::load(&path, &CharVocabulary::english());

        assert!(matches!(result, Err(Error::EmptyCorpus { .. })));
    }
}
