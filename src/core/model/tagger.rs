use super::crf::Crf;
use super::lstm::BiLstm;
use super::traits::SequenceTagger;
use crate::core::tensor::ModelMode;
use crate::core::{NerError, Result};
use crate::infra::weights::WeightMap;
use candle_core::{Module, Tensor};
use candle_nn::Linear;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggerConfig {
    pub input_dim: usize,
    /// Hidden size of each LSTM direction.
    pub hidden_size: usize,
    pub num_labels: usize,
}

impl TaggerConfig {
    pub fn infer(weights: &WeightMap) -> Result<Self> {
        let (gates, input_dim) = weights.dims2("lstm.weight_ih_l0")?;
        if gates % 4 != 0 {
            return Err(NerError::load(
                weights.path(),
                format!("lstm.weight_ih_l0 has {} rows, not a multiple of 4", gates),
            ));
        }
        let hidden_size = gates / 4;
        let (num_labels, projected) = weights.dims2("hidden2tag.weight")?;
        if projected != 2 * hidden_size {
            return Err(NerError::mismatch("hidden2tag input", 2 * hidden_size, projected));
        }
        Ok(Self {
            input_dim,
            hidden_size,
            num_labels,
        })
    }
}

/// Bidirectional LSTM emitting per-label scores, decoded by a linear-chain
/// CRF.
pub struct BiLstmCrf {
    lstm: BiLstm,
    hidden2tag: Linear,
    crf: Crf,
    config: TaggerConfig,
    mode: ModelMode,
}

impl BiLstmCrf {
    pub fn load(weights: &WeightMap) -> Result<Self> {
        let config = TaggerConfig::infer(weights)?;
        let vb = weights.var_builder();

        let lstm = BiLstm::load(vb.pp("lstm"), config.input_dim, config.hidden_size)
            .map_err(|e| weights.load_error(e))?;
        let hidden2tag = candle_nn::linear(2 * config.hidden_size, config.num_labels, vb.pp("hidden2tag"))
            .map_err(|e| weights.load_error(e))?;
        let crf = Crf::load(vb.pp("crf"), config.num_labels).map_err(|e| weights.load_error(e))?;

        tracing::info!(
            input_dim = config.input_dim,
            hidden_size = config.hidden_size,
            labels = config.num_labels,
            "loaded BiLSTM-CRF tagger"
        );

        Ok(Self {
            lstm,
            hidden2tag,
            crf,
            config,
            mode: ModelMode::Inference,
        })
    }

    pub fn config(&self) -> &TaggerConfig {
        &self.config
    }

    pub fn crf(&self) -> &Crf {
        &self.crf
    }

    /// Per-position label scores, shape `(steps, labels)`.
    pub fn emissions(&self, sentence: &Tensor) -> Result<Tensor> {
        let hidden = self.lstm.forward(sentence)?;
        Ok(self.hidden2tag.forward(&hidden)?)
    }
}

impl SequenceTagger for BiLstmCrf {
    fn tag(&self, embeddings: &Tensor, mask: &[bool]) -> Result<Vec<usize>> {
        let (batch, steps, width) = embeddings.dims3()?;
        if batch != 1 {
            return Err(NerError::Inference(format!(
                "expected a batch of one sentence, got {}",
                batch
            )));
        }
        if width != self.config.input_dim {
            return Err(NerError::mismatch("tagger input", self.config.input_dim, width));
        }
        if steps == 0 {
            return Ok(Vec::new());
        }

        let emissions = self.emissions(&embeddings.squeeze(0)?)?;
        self.crf.decode(&emissions.to_vec2::<f32>()?, mask)
    }

    fn input_dim(&self) -> usize {
        self.config.input_dim
    }

    fn num_labels(&self) -> usize {
        self.config.num_labels
    }

    fn mode(&self) -> ModelMode {
        self.mode
    }
}
