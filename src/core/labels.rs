use crate::core::{NerError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LABELS: [&str; 5] = ["B-LOC", "B-PER", "I-LOC", "I-PER", "O"];

/// Ordered tag strings. Index order must match the order the tagger was
/// trained with; nothing in the weight files records it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(NerError::Labels("label set is empty".to_string()));
        }
        for (i, label) in labels.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(NerError::Labels(format!("label {} is blank", i)));
            }
            if labels[..i].contains(label) {
                return Err(NerError::Labels(format!("duplicate label {}", label)));
            }
        }
        Ok(Self { labels })
    }

    /// Parses a comma separated list such as `B-LOC,B-PER,O`.
    pub fn parse(spec: &str) -> Result<Self> {
        Self::new(spec.split(',').map(str::trim).filter(|s| !s.is_empty()))
    }

    pub fn get(&self, id: usize) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    pub fn decode(&self, id: usize) -> Result<&str> {
        self.get(id).ok_or_else(|| {
            NerError::Inference(format!(
                "label id {} outside label set of {}",
                id,
                self.labels.len()
            ))
        })
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self {
            labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A token paired with its predicted label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedToken {
    pub word: String,
    pub label: String,
}

impl TaggedToken {
    pub fn new(word: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            label: label.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order() {
        let labels = LabelSet::default();
        assert_eq!(labels.len(), 5);
        assert_eq!(labels.get(0), Some("B-LOC"));
        assert_eq!(labels.get(4), Some("O"));
        assert_eq!(labels.position("I-PER"), Some(3));
    }

    #[test]
    fn test_parse() {
        let labels = LabelSet::parse(" O , B-PER,I-PER ").unwrap();
        assert_eq!(labels.iter().collect::<Vec<_>>(), vec!["O", "B-PER", "I-PER"]);
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        assert!(LabelSet::parse("O,O").is_err());
        assert!(LabelSet::parse(" , ").is_err());
    }

    #[test]
    fn test_decode_out_of_range() {
        let labels = LabelSet::default();
        assert_eq!(labels.decode(1).unwrap(), "B-PER");
        assert!(matches!(labels.decode(9), Err(NerError::Inference(_))));
    }
}
