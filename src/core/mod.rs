pub mod error;
pub mod labels;
pub mod model;
pub mod segment;
pub mod tensor;
pub mod vocab;

pub use error::NerError;
pub use labels::{LabelSet, TaggedToken};
pub use model::{BundlePaths, ModelBundle, ModelRegistry, SequenceTagger, WordEmbedder};
pub use segment::{Segment, WordSegmenter};
pub use tensor::{DeviceSpec, ModelMode};
pub use vocab::{CharId, CharVocabulary};

pub type Result<T> = std::result::Result<T, NerError>;
