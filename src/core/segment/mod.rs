pub mod cluster;
pub mod command;
pub mod dictionary;

pub use cluster::ClusterSegmenter;
pub use command::CommandSegmenter;
pub use dictionary::DictionarySegmenter;

use crate::core::{NerError, Result};
use std::sync::Arc;

/// A word segmentation capability for unsegmented text.
pub trait Segment: Send + Sync {
    fn segment(&self, text: &str) -> Result<Vec<String>>;

    fn name(&self) -> &str;
}

/// Chooses a segmentation capability from its textual description:
/// `cluster`, `dictionary:<path>` or `command:<program> [args..]`.
pub fn from_spec(spec: &str) -> Result<Arc<dyn Segment>> {
    let spec = spec.trim();
    let (kind, arg) = match spec.split_once(':') {
        Some((kind, arg)) => (kind.trim(), Some(arg.trim())),
        None => (spec, None),
    };

    match (kind, arg) {
        ("cluster", None) | ("", None) => Ok(Arc::new(ClusterSegmenter::new())),
        ("dictionary", Some(path)) if !path.is_empty() => {
            Ok(Arc::new(DictionarySegmenter::load(path)?))
        }
        ("command", Some(cmdline)) if !cmdline.is_empty() => {
            Ok(Arc::new(CommandSegmenter::parse(cmdline)?))
        }
        _ => Err(NerError::Config(format!("unknown segmenter '{}'", spec))),
    }
}

/// Splits raw text into word tokens. Text that already contains whitespace
/// is taken as pre-segmented; everything else goes through the configured
/// capability. This never fails: a failing capability degrades to the whole
/// text as one token.
#[derive(Clone)]
pub struct WordSegmenter {
    inner: Arc<dyn Segment>,
}

impl WordSegmenter {
    pub fn new(inner: Arc<dyn Segment>) -> Self {
        Self { inner }
    }

    pub fn capability(&self) -> &str {
        self.inner.name()
    }

    pub fn segment(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        if is_presegmented(text) {
            return normalize(text.split_whitespace());
        }

        match self.inner.segment(text) {
            Ok(tokens) => {
                let tokens = normalize(tokens.iter().flat_map(|t| t.split_whitespace()));
                if tokens.is_empty() {
                    tracing::warn!(
                        segmenter = self.inner.name(),
                        "word segmentation returned no tokens, using the whole text"
                    );
                    vec![text.to_string()]
                } else {
                    tokens
                }
            }
            Err(e) => {
                tracing::warn!(
                    segmenter = self.inner.name(),
                    error = %e,
                    "word segmentation failed, using the whole text"
                );
                vec![text.to_string()]
            }
        }
    }
}

impl Default for WordSegmenter {
    fn default() -> Self {
        Self::new(Arc::new(ClusterSegmenter::new()))
    }
}

fn is_presegmented(text: &str) -> bool {
    text.chars().any(char::is_whitespace)
}

fn normalize<'a, I>(pieces: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    pieces
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
    }

    impl Segment for Counting {
        fn segment(&self, text: &str) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(text.chars().map(|c| c.to_string()).collect())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    struct Failing;

    impl Segment for Failing {
        fn segment(&self, _text: &str) -> Result<Vec<String>> {
            Err(NerError::Segmentation("dictionary unavailable".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct Blank;

    impl Segment for Blank {
        fn segment(&self, _text: &str) -> Result<Vec<String>> {
            Ok(vec![" ".to_string(), String::new()])
        }

        fn name(&self) -> &str {
            "blank"
        }
    }

    #[test]
    fn test_presegmented_skips_capability() {
        let counting = Arc::new(Counting { calls: AtomicUsize::new(0) });
        let segmenter = WordSegmenter::new(counting.clone());

        let tokens = segmenter.segment("សួស្តី\u{200b} ប្រាក់");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1], "ប្រាក់");
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_collapses_repeated_separators() {
        let segmenter = WordSegmenter::default();
        let tokens = segmenter.segment("  ក   ខ\t\nគ  ");
        assert_eq!(tokens, vec!["ក", "ខ", "គ"]);
    }

    #[test]
    fn test_unsegmented_goes_to_capability() {
        let counting = Arc::new(Counting { calls: AtomicUsize::new(0) });
        let segmenter = WordSegmenter::new(counting.clone());

        let text = "កខគឃងចឆជឈញ";
        assert_eq!(text.chars().count(), 10);
        let tokens = segmenter.segment(text);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
        assert!(tokens.len() <= 10);
    }

    #[test]
    fn test_failure_falls_back_to_single_token() {
        let segmenter = WordSegmenter::new(Arc::new(Failing));
        assert_eq!(segmenter.segment("ភ្នំពេញ"), vec!["ភ្នំពេញ"]);
    }

    #[test]
    fn test_blank_capability_output_falls_back() {
        let segmenter = WordSegmenter::new(Arc::new(Blank));
        assert_eq!(segmenter.segment("ភ្នំពេញ"), vec!["ភ្នំពេញ"]);
    }

    #[test]
    fn test_empty_input() {
        let segmenter = WordSegmenter::default();
        assert!(segmenter.segment("").is_empty());
        assert!(segmenter.segment("   ").is_empty());
    }

    #[test]
    fn test_from_spec() {
        assert_eq!(from_spec("cluster").unwrap().name(), "cluster");
        assert_eq!(from_spec("command:khmercut --stdin").unwrap().name(), "command");
        assert!(from_spec("dictionary:").is_err());
        assert!(from_spec("neural").is_err());
    }
}
