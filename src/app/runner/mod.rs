use crate::core::model::ModelBundle;
use crate::core::{NerError, Result, TaggedToken, WordSegmenter};
use candle_core::Tensor;
use rayon::prelude::*;
use std::sync::Arc;

/// Segment, embed, tag and label raw text against a shared model bundle.
#[derive(Clone)]
pub struct NerPipeline {
    bundle: Arc<ModelBundle>,
    segmenter: WordSegmenter,
}

impl NerPipeline {
    pub fn new(bundle: Arc<ModelBundle>) -> Self {
        Self {
            bundle,
            segmenter: WordSegmenter::default(),
        }
    }

    pub fn segmenter(mut self, segmenter: WordSegmenter) -> Self {
        self.segmenter = segmenter;
        self
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    pub fn segment(&self, text: &str) -> Vec<String> {
        self.segmenter.segment(text)
    }

    /// Labels every token of `text`, in token order. Any model failure is
    /// reported as a single inference error and nothing is returned.
    pub fn predict(&self, text: &str) -> Result<Vec<TaggedToken>> {
        let tokens = self.segmenter.segment(text);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let label_ids = self.tag_tokens(&tokens).map_err(NerError::into_inference)?;
        if label_ids.len() != tokens.len() {
            return Err(NerError::Inference(format!(
                "tagger returned {} labels for {} tokens",
                label_ids.len(),
                tokens.len()
            )));
        }

        let labels = self.bundle.labels();
        let tagged = tokens
            .into_iter()
            .zip(label_ids)
            .map(|(word, id)| Ok(TaggedToken::new(word, labels.decode(id)?)))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(tokens = tagged.len(), "tagged sentence");
        Ok(tagged)
    }

    fn tag_tokens(&self, tokens: &[String]) -> Result<Vec<usize>> {
        let embedder = self.bundle.embedder();
        let dim = embedder.output_dim();

        let embeddings = tokens
            .par_iter()
            .map(|token| {
                let embedding = embedder.embed(token)?;
                if embedding.dims() != [dim] {
                    return Err(NerError::Inference(format!(
                        "embedding for '{}' has shape {:?}, expected [{}]",
                        token,
                        embedding.dims(),
                        dim
                    )));
                }
                Ok(embedding)
            })
            .collect::<Result<Vec<Tensor>>>()?;

        let sentence = Tensor::stack(&embeddings, 0)?.unsqueeze(0)?;
        let mask = vec![true; tokens.len()];
        self.bundle.tagger().tag(&sentence, &mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{SequenceTagger, WordEmbedder};
    use crate::core::tensor::{DeviceSpec, ModelMode};
    use crate::core::vocab::CharVocabulary;
    use crate::core::LabelSet;
    use candle_core::Device;

    /// Embeds a word as its character count repeated.
    struct LengthEmbedder;

    impl WordEmbedder for LengthEmbedder {
        fn embed(&self, word: &str) -> Result<Tensor> {
            let n = word.chars().count() as f32;
            Ok(Tensor::full(n, 2, &Device::Cpu)?)
        }
        fn output_dim(&self) -> usize {
            2
        }
        fn mode(&self) -> ModelMode {
            ModelMode::Inference
        }
    }

    /// Long words are persons, everything else is outside.
    struct LengthTagger;

    impl SequenceTagger for LengthTagger {
        fn tag(&self, embeddings: &Tensor, mask: &[bool]) -> Result<Vec<usize>> {
            let rows = embeddings.squeeze(0)?.to_vec2::<f32>()?;
            assert_eq!(rows.len(), mask.len());
            Ok(rows.iter().map(|r| if r[0] > 3.0 { 1 } else { 4 }).collect())
        }
        fn input_dim(&self) -> usize {
            2
        }
        fn num_labels(&self) -> usize {
            5
        }
        fn mode(&self) -> ModelMode {
            ModelMode::Inference
        }
    }

    struct BrokenTagger;

    impl SequenceTagger for BrokenTagger {
        fn tag(&self, _embeddings: &Tensor, _mask: &[bool]) -> Result<Vec<usize>> {
            Ok(vec![0])
        }
        fn input_dim(&self) -> usize {
            2
        }
        fn num_labels(&self) -> usize {
            5
        }
        fn mode(&self) -> ModelMode {
            ModelMode::Inference
        }
    }

    fn pipeline(tagger: Box<dyn SequenceTagger>) -> NerPipeline {
        let vocab = CharVocabulary::from_json(r#"{"<PAD>": 0}"#).unwrap();
        let bundle = ModelBundle::new(
            Box::new(LengthEmbedder),
            tagger,
            Arc::new(vocab),
            LabelSet::default(),
            Device::Cpu,
            DeviceSpec::Cpu,
        )
        .unwrap();
        NerPipeline::new(Arc::new(bundle))
    }

    #[test]
    fn test_tokens_zip_with_labels_in_order() {
        let pipeline = pipeline(Box::new(LengthTagger));
        let out = pipeline.predict("លោក សុខា នៅ ភ្នំពេញ").unwrap();
        let words: Vec<&str> = out.iter().map(|t| t.word.as_str()).collect();
        assert_eq!(words, vec!["លោក", "សុខា", "នៅ", "ភ្នំពេញ"]);
        assert_eq!(out[0].label, "O");
        assert_eq!(out[3].label, "B-PER");
    }

    #[test]
    fn test_empty_text_is_empty_result() {
        let pipeline = pipeline(Box::new(LengthTagger));
        assert!(pipeline.predict("").unwrap().is_empty());
        assert!(pipeline.predict("  \n ").unwrap().is_empty());
    }

    #[test]
    fn test_length_mismatch_is_inference_error() {
        let pipeline = pipeline(Box::new(BrokenTagger));
        let err = pipeline.predict("ក ខ").unwrap_err();
        assert!(matches!(err, NerError::Inference(_)));
    }

    #[test]
    fn test_stacked_sentence_shape() {
        let pipeline = pipeline(Box::new(LengthTagger));
        let ids = pipeline.tag_tokens(&["ក".to_string(), "ខគ".to_string()]).unwrap();
        assert_eq!(ids, vec![4, 4]);
    }
}
