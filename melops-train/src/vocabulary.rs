//! Vocabulary providers mapping transcripts to label indices.

use crate::error::{BoxError, ConfigError, Error, Result};
use std::collections::HashMap;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;

/// Token-to-index mapping used to shape the label space.
pub trait Vocabulary: Send + Sync {
    /// Number of distinct labels.
    fn size(&self) -> usize;

    /// Encode a transcript into label indices, each below [`Vocabulary::size`].
    fn encode(&self, text: &str) -> std::result::Result<Vec<u32>, BoxError>;
}

/// Character-level vocabulary.
#[derive(Clone, Debug)]
pub struct CharVocabulary {
    tokens: Vec<char>,
    index: HashMap<char, u32>,
}

impl CharVocabulary {
    /// Apostrophe, space and the lowercase latin alphabet.
    pub const ENGLISH: &str = "' abcdefghijklmnopqrstuvwxyz";

    pub fn english() -> Self {
        Self::from_tokens(Self::ENGLISH.chars())
    }

    /// Build from tokens in index order. Repeated tokens keep their first index.
    pub fn from_tokens(tokens: impl IntoIterator<Item = char>) -> Self {
        let mut vocabulary = Self {
            tokens: Vec::new(),
            index: HashMap::new(),
        };

        for token in tokens {
            if !vocabulary.index.contains_key(&token) {
                vocabulary
                    .index
                    .insert(token, vocabulary.tokens.len() as u32);
                vocabulary.tokens.push(token);
            }
        }

        vocabulary
    }

    /// Load from a `vocab.txt` holding one single-character token per line.
    ///
    /// Lines are not trimmed, so a line holding one space is the space token.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let invalid = |reason: String| ConfigError::InvalidVocabulary {
            path: path.to_path_buf(),
            reason,
        };

        let text = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;

        let mut tokens = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                continue;
            }

            let mut chars = line.chars();
            match (chars.next(), chars.next()) {
                (Some(token), None) => tokens.push(token),
                _ => return Err(invalid(format!("line {}: expected one character", i + 1)).into()),
            }
        }

        if tokens.is_empty() {
            return Err(invalid("no tokens".to_string()).into());
        }

        Ok(Self::from_tokens(tokens))
    }

    /// Token at `index`.
    pub fn token(&self, index: u32) -> Option<char> {
        self.tokens.get(index as usize).copied()
    }
}

impl Vocabulary for CharVocabulary {
    fn size(&self) -> usize {
        self.tokens.len()
    }

    fn encode(&self, text: &str) -> std::result::Result<Vec<u32>, BoxError> {
        text.chars()
            .map(|ch| {
                self.index
                    .get(&ch)
                    .or_else(|| ch.to_lowercase().next().and_then(|lower| self.index.get(&lower)))
                    .copied()
                    .ok_or_else(|| BoxError::from(format!("unknown token {ch:?}")))
            })
            .collect()
    }
}

impl Vocabulary for Tokenizer {
    fn size(&self) -> usize {
        self.get_vocab_size(true)
    }

    fn encode(&self, text: &str) -> std::result::Result<Vec<u32>, BoxError> {
        // Inherent encode lives on the deref target
        let encoding = Deref::deref(self).encode(text, false)?;
        Ok(encoding.get_ids().to_vec())
    }
}

/// Load a vocabulary from `tokenizer.json` or a character `vocab.txt`.
pub fn from_path(path: impl AsRef<Path>) -> Result<Arc<dyn Vocabulary>> {
    let path = path.as_ref();

    if path.extension().is_some_and(|ext| ext == "json") {
        let tokenizer = Tokenizer::from_file(path).map_err(Error::Tokenizers)?;
        Ok(Arc::new(tokenizer))
    } else {
        Ok(Arc::new(CharVocabulary::from_file(path)?))
    }
}
