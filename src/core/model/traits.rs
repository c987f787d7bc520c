use crate::core::tensor::ModelMode;
use crate::core::Result;
use candle_core::Tensor;

/// Maps a single word to a fixed-length vector.
pub trait WordEmbedder: Send + Sync {
    /// Embedding of `word`, shape `(output_dim,)`.
    fn embed(&self, word: &str) -> Result<Tensor>;

    fn output_dim(&self) -> usize;

    fn mode(&self) -> ModelMode;
}

/// Assigns one label id per position of an embedded sentence.
pub trait SequenceTagger: Send + Sync {
    /// `embeddings` is a batch of one sentence, shape `(1, steps, input_dim)`;
    /// `mask` marks the valid steps. Returns one label id per valid step.
    fn tag(&self, embeddings: &Tensor, mask: &[bool]) -> Result<Vec<usize>>;

    fn input_dim(&self) -> usize;

    fn num_labels(&self) -> usize;

    fn mode(&self) -> ModelMode;
}
