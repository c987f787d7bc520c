pub mod autoencoder;
pub mod bundle;
pub mod crf;
pub mod gru;
pub mod lstm;
pub mod registry;
pub mod tagger;
pub mod traits;

pub use autoencoder::{AutoencoderConfig, CharAutoencoder};
pub use bundle::{BundleInfo, BundlePaths, ModelBundle};
pub use crf::Crf;
pub use registry::{Health, ModelRegistry};
pub use tagger::{BiLstmCrf, TaggerConfig};
pub use traits::{SequenceTagger, WordEmbedder};
