use super::gru::Gru;
use super::traits::WordEmbedder;
use crate::core::tensor::ModelMode;
use crate::core::vocab::CharVocabulary;
use crate::core::{NerError, Result};
use crate::infra::weights::WeightMap;
use candle_core::{Device, Module, Tensor};
use candle_nn::Embedding;
use std::sync::Arc;

/// Dropout between the encoder's stacked GRU layers during training.
pub const ENCODER_DROPOUT: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoencoderConfig {
    pub vocab_size: usize,
    pub char_dim: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
}

impl AutoencoderConfig {
    /// Reads the architecture from tensor shapes.
    pub fn infer(weights: &WeightMap) -> Result<Self> {
        let (vocab_size, char_dim) = weights.dims2("embedding.weight")?;
        let num_layers = weights.count_indexed("encoder_gru.weight_ih_l");
        if num_layers == 0 {
            return Err(NerError::load(weights.path(), "no encoder_gru layers found"));
        }
        let (gates, hidden_size) = weights.dims2("encoder_gru.weight_hh_l0")?;
        if gates != 3 * hidden_size {
            return Err(NerError::mismatch("encoder_gru gate rows", 3 * hidden_size, gates));
        }
        Ok(Self {
            vocab_size,
            char_dim,
            hidden_size,
            num_layers,
        })
    }
}

/// Encoder half of the character GRU autoencoder. A word embedding is the
/// final hidden state of the top encoder layer; the decoder weights are
/// never read.
pub struct CharAutoencoder {
    vocab: Arc<CharVocabulary>,
    embedding: Embedding,
    encoder: Gru,
    config: AutoencoderConfig,
    device: Device,
}

impl CharAutoencoder {
    pub fn load(weights: &WeightMap, vocab: Arc<CharVocabulary>) -> Result<Self> {
        let config = AutoencoderConfig::infer(weights)?;

        if vocab.max_id() as usize >= config.vocab_size {
            return Err(NerError::mismatch(
                "vocabulary ids vs embedding rows",
                config.vocab_size,
                vocab.max_id() as usize + 1,
            ));
        }

        let vb = weights.var_builder();
        let embedding = candle_nn::embedding(config.vocab_size, config.char_dim, vb.pp("embedding"))
            .map_err(|e| weights.load_error(e))?;
        let encoder = Gru::load(
            vb.pp("encoder_gru"),
            config.char_dim,
            config.hidden_size,
            config.num_layers,
            ENCODER_DROPOUT,
        )
        .map_err(|e| weights.load_error(e))?;

        tracing::info!(
            vocab_size = config.vocab_size,
            char_dim = config.char_dim,
            hidden_size = config.hidden_size,
            layers = config.num_layers,
            "loaded character autoencoder"
        );

        Ok(Self {
            vocab,
            embedding,
            encoder,
            config,
            device: weights.device().clone(),
        })
    }

    pub fn config(&self) -> &AutoencoderConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> &CharVocabulary {
        &self.vocab
    }
}

impl WordEmbedder for CharAutoencoder {
    fn embed(&self, word: &str) -> Result<Tensor> {
        let ids: Vec<u32> = self.vocab.encode(word).into_iter().map(|id| id.0).collect();
        let ids = Tensor::new(ids.as_slice(), &self.device)?;
        let chars = self.embedding.forward(&ids)?;
        let hidden = self.encoder.last_hidden(&chars)?;
        Ok(hidden.squeeze(0)?)
    }

    fn output_dim(&self) -> usize {
        self.config.hidden_size
    }

    fn mode(&self) -> ModelMode {
        self.encoder.mode()
    }
}
