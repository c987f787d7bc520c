use super::cluster::ClusterSegmenter;
use super::Segment;
use crate::core::{NerError, Result};
use std::collections::HashSet;
use std::path::Path;

/// Dictionary driven segmentation over orthographic clusters.
///
/// Picks the split that leaves the fewest clusters uncovered by dictionary
/// words, breaking ties by using fewer tokens. Uncovered clusters are emitted
/// as tokens of their own.
#[derive(Debug, Clone)]
pub struct DictionarySegmenter {
    words: HashSet<String>,
    max_clusters: usize,
    clusters: ClusterSegmenter,
}

impl DictionarySegmenter {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let clusters = ClusterSegmenter::new();
        let words: HashSet<String> = words
            .into_iter()
            .map(Into::into)
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        let max_clusters = words
            .iter()
            .map(|w| clusters.clusters(w).len())
            .max()
            .unwrap_or(1)
            .max(1);

        Self {
            words,
            max_clusters,
            clusters,
        }
    }

    /// Reads a newline delimited word list. Lines starting with `#` are
    /// comments.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            NerError::Config(format!("cannot read word list {}: {}", path.display(), e))
        })?;
        let segmenter = Self::new(
            content
                .lines()
                .filter(|line| !line.trim_start().starts_with('#')),
        );
        tracing::info!(
            path = %path.display(),
            words = segmenter.len(),
            "loaded segmentation dictionary"
        );
        Ok(segmenter)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let clusters = self.clusters.clusters(text);
        let n = clusters.len();
        if n == 0 {
            return Vec::new();
        }

        // best[i]: (uncovered clusters, tokens, start of last token) for clusters[..i]
        let mut best: Vec<Option<(usize, usize, usize)>> = vec![None; n + 1];
        best[0] = Some((0, 0, 0));

        for end in 1..=n {
            let lowest = end.saturating_sub(self.max_clusters);
            for start in lowest..end {
                let Some((uncovered, tokens, _)) = best[start] else {
                    continue;
                };
                let span = end - start;
                let candidate = clusters[start..end].concat();
                let cost = if self.words.contains(&candidate) {
                    (uncovered, tokens + 1, start)
                } else if span == 1 {
                    (uncovered + 1, tokens + 1, start)
                } else {
                    continue;
                };
                let better = match best[end] {
                    None => true,
                    Some((u, t, _)) => (cost.0, cost.1) < (u, t),
                };
                if better {
                    best[end] = Some(cost);
                }
            }
        }

        let mut out = Vec::new();
        let mut end = n;
        while end > 0 {
            // Every prefix is reachable through single-cluster steps.
            let start = best[end].map(|(_, _, s)| s).unwrap_or(end - 1);
            out.push(clusters[start..end].concat());
            end = start;
        }
        out.reverse();
        out
    }
}

impl Segment for DictionarySegmenter {
    fn segment(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.split(text))
    }

    fn name(&self) -> &str {
        "dictionary"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_words_win() {
        let seg = DictionarySegmenter::new(["សួស្តី", "ភ្នំពេញ", "ភ្នំ"]);
        assert_eq!(seg.split("សួស្តីភ្នំពេញ"), vec!["សួស្តី", "ភ្នំពេញ"]);
    }

    #[test]
    fn test_unknown_clusters_emitted_alone() {
        let seg = DictionarySegmenter::new(["ភ្នំពេញ"]);
        assert_eq!(seg.split("កខភ្នំពេញ"), vec!["ក", "ខ", "ភ្នំពេញ"]);
    }

    #[test]
    fn test_prefers_full_coverage() {
        // "ខគឃ" cannot match, so the covering split is "កខ" + "គ".
        let seg = DictionarySegmenter::new(["កខ", "ខគឃ", "គ"]);
        assert_eq!(seg.split("កខគ"), vec!["កខ", "គ"]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.txt");
        std::fs::write(&path, "# khmer words\nសួស្តី\n\nប្រាក់\n").unwrap();

        let seg = DictionarySegmenter::load(&path).unwrap();
        assert_eq!(seg.len(), 2);
        assert_eq!(seg.split("សួស្តីប្រាក់"), vec!["សួស្តី", "ប្រាក់"]);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = DictionarySegmenter::load("/nonexistent/words.txt").unwrap_err();
        assert!(matches!(err, NerError::Config(_)));
    }
}
