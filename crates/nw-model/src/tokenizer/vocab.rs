use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Padding id. Never maps to a token.
pub const PAD_ID: u32 = 0;
/// Id every unknown word encodes to.
pub const OOV_ID: u32 = 1;
/// Token string stored at `OOV_ID`.
pub const OOV_TOKEN: &str = "<OOV>";

/// Word-level vocabulary index.
///
/// Ids are dense: `0` is the padding sentinel, `1` is `<OOV>`, and words
/// follow in descending corpus frequency. For every id in `1..len()` the
/// forward and inverse mappings are exact inverses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "VocabularyRecord", into = "VocabularyRecord")]
pub struct Vocabulary {
    /// Token strings indexed by id. Slot 0 holds an empty placeholder.
    tokens: Vec<String>,
    token_to_id: HashMap<String, u32>,
}

/// On-disk form: the ordered word list after `<OOV>`.
#[derive(Serialize, Deserialize)]
struct VocabularyRecord {
    words: Vec<String>,
}

impl Vocabulary {
    /// Fit a vocabulary on whitespace-separated `text`.
    ///
    /// Keeps at most `max_size` ids, padding and `<OOV>` included. Ties in
    /// frequency are broken by first occurrence.
    pub fn fit(text: &str, max_size: usize) -> Result<Vocabulary> {
        if max_size < 2 {
            return Err(ModelError::Vocabulary(format!(
                "max_size must leave room for padding and {}, got {}",
                OOV_TOKEN, max_size
            )));
        }

        // word -> (count, first position)
        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
        for (pos, word) in text.split_whitespace().enumerate() {
            counts.entry(word).or_insert((0, pos)).0 += 1;
        }

        let mut ranked: Vec<(&str, usize, usize)> = counts
            .into_iter()
            .filter(|(w, _)| *w != OOV_TOKEN)
            .map(|(w, (count, first))| (w, count, first))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        ranked.truncate(max_size - 2);

        Vocabulary::from_words(ranked.into_iter().map(|(w, _, _)| w.to_string()))
    }

    /// Build a vocabulary from words already in id order (first word gets id 2).
    pub fn from_words<I>(words: I) -> Result<Vocabulary>
    where
        I: IntoIterator<Item = String>,
    {
        let mut tokens = vec![String::new(), OOV_TOKEN.to_string()];
        let mut token_to_id = HashMap::new();
        token_to_id.insert(OOV_TOKEN.to_string(), OOV_ID);

        for word in words {
            if word.is_empty() || word.chars().any(char::is_whitespace) {
                return Err(ModelError::Vocabulary(format!(
                    "invalid token {:?}",
                    word
                )));
            }
            let id = tokens.len() as u32;
            if token_to_id.insert(word.clone(), id).is_some() {
                return Err(ModelError::Vocabulary(format!(
                    "duplicate token {:?}",
                    word
                )));
            }
            tokens.push(word);
        }

        Ok(Vocabulary {
            tokens,
            token_to_id,
        })
    }

    /// Number of ids, padding included. This is the model's output width.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True when the vocabulary holds no words beyond padding and `<OOV>`.
    pub fn is_empty(&self) -> bool {
        self.tokens.len() <= 2
    }

    /// Id of `token`, if present.
    pub fn id(&self, token: &str) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }

    /// Token for `id`. Returns `None` for the padding id and out-of-range ids.
    pub fn token(&self, id: u32) -> Option<&str> {
        if id == PAD_ID {
            return None;
        }
        self.tokens.get(id as usize).map(String::as_str)
    }

    /// Encode whitespace-separated text. Unknown words map to `OOV_ID`.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        text.split_whitespace()
            .map(|w| self.id(w).unwrap_or(OOV_ID))
            .collect()
    }

    /// Iterate `(id, token)` pairs over `1..len()`.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.tokens
            .iter()
            .enumerate()
            .skip(1)
            .map(|(id, t)| (id as u32, t.as_str()))
    }
}

impl TryFrom<VocabularyRecord> for Vocabulary {
    type Error = ModelError;

    fn try_from(record: VocabularyRecord) -> Result<Self> {
        Vocabulary::from_words(record.words)
    }
}

impl From<Vocabulary> for VocabularyRecord {
    fn from(vocab: Vocabulary) -> Self {
        VocabularyRecord {
            words: vocab.tokens.into_iter().skip(2).collect(),
        }
    }
}
