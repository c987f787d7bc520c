use crate::core::{NerError, Result};
use std::collections::HashMap;
use std::path::Path;

pub const PAD_TOKEN: &str = "<PAD>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharId(pub u32);

/// Character to id mapping fixed at training time. Characters outside the
/// alphabet resolve to the `<PAD>` id.
#[derive(Debug, Clone)]
pub struct CharVocabulary {
    ids: HashMap<char, CharId>,
    pad: CharId,
    size: usize,
    max_id: u32,
}

impl CharVocabulary {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| NerError::load(path, e))?;
        Self::from_json(&content).map_err(|e| NerError::load(path, e))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: HashMap<String, u32> = serde_json::from_str(content)
            .map_err(|e| NerError::Vocabulary(format!("malformed char2idx JSON: {}", e)))?;
        Self::from_map(raw)
    }

    pub fn from_map(raw: HashMap<String, u32>) -> Result<Self> {
        let pad = raw
            .get(PAD_TOKEN)
            .copied()
            .map(CharId)
            .ok_or_else(|| NerError::Vocabulary(format!("missing {} entry", PAD_TOKEN)))?;

        let size = raw.len();
        let mut ids = HashMap::with_capacity(size);
        let mut max_id = pad.0;
        for (key, id) in raw {
            max_id = max_id.max(id);
            if key == PAD_TOKEN {
                continue;
            }
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => {
                    ids.insert(c, CharId(id));
                }
                // Multi-character specials such as <UNK> are never produced by
                // a per-character lookup, so they only count towards max_id.
                _ => continue,
            }
        }

        Ok(Self {
            ids,
            pad,
            size,
            max_id,
        })
    }

    pub fn pad_id(&self) -> CharId {
        self.pad
    }

    pub fn id(&self, c: char) -> CharId {
        self.ids.get(&c).copied().unwrap_or(self.pad)
    }

    pub fn contains(&self, c: char) -> bool {
        self.ids.contains_key(&c)
    }

    /// Ids for every character of `word`. An empty word encodes as a single
    /// pad id so the encoder always sees at least one step.
    pub fn encode(&self, word: &str) -> Vec<CharId> {
        let ids: Vec<CharId> = word.chars().map(|c| self.id(c)).collect();
        if ids.is_empty() {
            vec![self.pad]
        } else {
            ids
        }
    }

    /// Number of entries in the mapping, specials included.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn max_id(&self) -> u32 {
        self.max_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> CharVocabulary {
        CharVocabulary::from_json(r#"{"<PAD>": 0, "ក": 1, "ខ": 2, "ា": 3}"#).unwrap()
    }

    #[test]
    fn test_known_characters() {
        let v = vocab();
        assert_eq!(v.id('ក'), CharId(1));
        assert_eq!(v.encode("កា"), vec![CharId(1), CharId(3)]);
        assert_eq!(v.len(), 4);
        assert_eq!(v.max_id(), 3);
    }

    #[test]
    fn test_unknown_character_maps_to_pad() {
        let v = vocab();
        assert!(!v.contains('Z'));
        assert_eq!(v.id('Z'), v.pad_id());
        assert_eq!(v.encode("កZ"), vec![CharId(1), CharId(0)]);
    }

    #[test]
    fn test_empty_word_is_single_pad() {
        let v = vocab();
        assert_eq!(v.encode(""), vec![v.pad_id()]);
    }

    #[test]
    fn test_missing_pad_is_rejected() {
        let err = CharVocabulary::from_json(r#"{"ក": 1}"#).unwrap_err();
        assert!(matches!(err, NerError::Vocabulary(_)));
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(CharVocabulary::from_json("[1, 2]").is_err());
    }
}
