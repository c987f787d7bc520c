//! Deterministic synthetic model bundles.
//!
//! The weights are random but laid out exactly like a trained checkpoint, so
//! everything downstream of loading can be exercised without real models.

use crate::core::labels::LabelSet;
use crate::core::model::{BiLstmCrf, BundlePaths, CharAutoencoder, ModelBundle};
use crate::core::tensor::DeviceSpec;
use crate::core::vocab::{CharVocabulary, PAD_TOKEN};
use crate::core::{NerError, Result};
use crate::infra::weights::WeightMap;
use crate::rng::SeededRng;
use candle_core::{Device, Tensor};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FixtureSpec {
    pub seed: u64,
    pub char_dim: usize,
    /// Autoencoder hidden size, which is also the word embedding width.
    pub embedding_dim: usize,
    pub encoder_layers: usize,
    /// Per-direction LSTM hidden size.
    pub tagger_hidden: usize,
    pub labels: LabelSet,
    /// Overrides the tagger's input width. Anything other than
    /// `embedding_dim` produces a bundle that must fail to load.
    pub tagger_input_dim: Option<usize>,
}

impl Default for FixtureSpec {
    fn default() -> Self {
        Self {
            seed: 42,
            char_dim: 8,
            embedding_dim: 16,
            encoder_layers: 2,
            tagger_hidden: 8,
            labels: LabelSet::default(),
            tagger_input_dim: None,
        }
    }
}

/// Generated vocabulary and weight tensors, held on the CPU.
pub struct Fixture {
    pub vocabulary: BTreeMap<String, u32>,
    pub autoencoder: HashMap<String, Tensor>,
    pub tagger: HashMap<String, Tensor>,
    pub labels: LabelSet,
}

impl FixtureSpec {
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn tagger_input_dim(mut self, dim: usize) -> Self {
        self.tagger_input_dim = Some(dim);
        self
    }

    pub fn build(&self) -> Result<Fixture> {
        let mut rng = SeededRng::new(self.seed);
        let dev = Device::Cpu;

        let vocabulary = khmer_vocabulary();
        let vocab_size = vocabulary.len();
        let h = self.embedding_dim;

        let mut autoencoder = HashMap::new();
        autoencoder.insert(
            "embedding.weight".to_string(),
            random(&mut rng, (vocab_size, self.char_dim), 1.0, &dev)?,
        );
        for prefix in ["encoder_gru", "decoder_gru"] {
            for layer in 0..self.encoder_layers {
                let input = if layer == 0 { self.char_dim } else { h };
                insert_rnn_layer(&mut autoencoder, &mut rng, prefix, layer, "", 3 * h, input, h, &dev)?;
            }
        }
        let bound = 1.0 / (h as f32).sqrt();
        autoencoder.insert("output_fc.weight".to_string(), random(&mut rng, (vocab_size, h), bound, &dev)?);
        autoencoder.insert("output_fc.bias".to_string(), random(&mut rng, vocab_size, bound, &dev)?);

        let input_dim = self.tagger_input_dim.unwrap_or(h);
        let th = self.tagger_hidden;
        let n = self.labels.len();
        let mut tagger = HashMap::new();
        for suffix in ["", "_reverse"] {
            insert_rnn_layer(&mut tagger, &mut rng, "lstm", 0, suffix, 4 * th, input_dim, th, &dev)?;
        }
        let bound = 1.0 / ((2 * th) as f32).sqrt();
        tagger.insert("hidden2tag.weight".to_string(), random(&mut rng, (n, 2 * th), bound, &dev)?);
        tagger.insert("hidden2tag.bias".to_string(), random(&mut rng, n, bound, &dev)?);
        tagger.insert("crf.start_transitions".to_string(), random(&mut rng, n, 0.1, &dev)?);
        tagger.insert("crf.end_transitions".to_string(), random(&mut rng, n, 0.1, &dev)?);
        tagger.insert("crf.transitions".to_string(), random(&mut rng, (n, n), 0.1, &dev)?);

        Ok(Fixture {
            vocabulary,
            autoencoder,
            tagger,
            labels: self.labels.clone(),
        })
    }

    /// Writes `char2idx.json` and both weight files into `dir`.
    pub fn write_to<P: AsRef<Path>>(&self, dir: P) -> Result<BundlePaths> {
        self.build()?.write_to(dir)
    }
}

impl Fixture {
    pub fn write_to<P: AsRef<Path>>(&self, dir: P) -> Result<BundlePaths> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let paths = BundlePaths::in_dir(dir);

        std::fs::write(&paths.vocabulary, serde_json::to_string_pretty(&self.vocabulary)?)?;
        candle_core::safetensors::save(&self.autoencoder, &paths.autoencoder)?;
        candle_core::safetensors::save(&self.tagger, &paths.tagger)?;

        tracing::info!(dir = %dir.display(), "wrote synthetic model bundle");
        Ok(paths)
    }

    /// Builds a CPU bundle straight from memory.
    pub fn bundle(&self) -> Result<ModelBundle> {
        let dev = Device::Cpu;
        let raw = self.vocabulary.iter().map(|(k, v)| (k.clone(), *v)).collect();
        let vocabulary = Arc::new(CharVocabulary::from_map(raw)?);

        let autoencoder = WeightMap::from_tensors("<fixture autoencoder>", self.autoencoder.clone(), &dev);
        let tagger = WeightMap::from_tensors("<fixture tagger>", self.tagger.clone(), &dev);

        let embedder = CharAutoencoder::load(&autoencoder, Arc::clone(&vocabulary))?;
        let tagger = BiLstmCrf::load(&tagger)?;

        ModelBundle::new(
            Box::new(embedder),
            Box::new(tagger),
            vocabulary,
            self.labels.clone(),
            dev,
            DeviceSpec::Cpu,
        )
    }
}

/// `<PAD>` at 0 followed by the Khmer letters, signs and digits.
pub fn khmer_vocabulary() -> BTreeMap<String, u32> {
    let mut vocab = BTreeMap::new();
    vocab.insert(PAD_TOKEN.to_string(), 0);
    let chars = (0x1780u32..=0x17DD)
        .chain(0x17E0..=0x17E9)
        .filter_map(char::from_u32);
    for (i, c) in chars.enumerate() {
        vocab.insert(c.to_string(), i as u32 + 1);
    }
    vocab
}

fn random<S: Into<candle_core::Shape>>(rng: &mut SeededRng, shape: S, bound: f32, dev: &Device) -> Result<Tensor> {
    let shape = shape.into();
    let values = rng.fill(shape.elem_count(), bound);
    Tensor::from_vec(values, shape, dev).map_err(NerError::from)
}

#[allow(clippy::too_many_arguments)]
fn insert_rnn_layer(
    map: &mut HashMap<String, Tensor>,
    rng: &mut SeededRng,
    prefix: &str,
    layer: usize,
    suffix: &str,
    gates: usize,
    input: usize,
    hidden: usize,
    dev: &Device,
) -> Result<()> {
    let bound = 1.0 / (hidden as f32).sqrt();
    let name = |kind: &str| format!("{}.{}_l{}{}", prefix, kind, layer, suffix);
    map.insert(name("weight_ih"), random(rng, (gates, input), bound, dev)?);
    map.insert(name("weight_hh"), random(rng, (gates, hidden), bound, dev)?);
    map.insert(name("bias_ih"), random(rng, gates, bound, dev)?);
    map.insert(name("bias_hh"), random(rng, gates, bound, dev)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_starts_with_pad() {
        let vocab = khmer_vocabulary();
        assert_eq!(vocab[PAD_TOKEN], 0);
        assert_eq!(vocab["ក"], 1);
        assert!(vocab.contains_key("៩"));
    }

    #[test]
    fn test_same_seed_same_weights() {
        let a = FixtureSpec::default().build().unwrap();
        let b = FixtureSpec::default().build().unwrap();
        let wa = a.tagger["crf.transitions"].to_vec2::<f32>().unwrap();
        let wb = b.tagger["crf.transitions"].to_vec2::<f32>().unwrap();
        assert_eq!(wa, wb);
    }

    #[test]
    fn test_in_memory_bundle_fits_together() {
        let bundle = FixtureSpec::default().build().unwrap().bundle().unwrap();
        assert_eq!(bundle.embedder().output_dim(), 16);
        assert_eq!(bundle.tagger().num_labels(), 5);
    }

    #[test]
    fn test_mismatched_tagger_is_rejected() {
        let fixture = FixtureSpec::default().tagger_input_dim(12).build().unwrap();
        let err = fixture.bundle().unwrap_err();
        assert!(err.is_load_error(), "{}", err);
    }

    #[test]
    fn test_empty_word_embeds_as_pad() {
        let bundle = FixtureSpec::default().build().unwrap().bundle().unwrap();
        let embedder = bundle.embedder();

        let empty = embedder.embed("").unwrap();
        assert_eq!(empty.dims(), &[16]);

        // An unknown character also encodes to the single pad id.
        let unknown = embedder.embed("🙂").unwrap();
        assert_eq!(empty.to_vec1::<f32>().unwrap(), unknown.to_vec1::<f32>().unwrap());

        let known = embedder.embed("ក").unwrap();
        assert_ne!(empty.to_vec1::<f32>().unwrap(), known.to_vec1::<f32>().unwrap());
    }
}
