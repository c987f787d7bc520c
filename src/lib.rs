pub mod app;
pub mod core;
pub mod envconfig;
pub mod fixtures;
pub mod infra;
pub mod middleware;
pub mod rng;

pub mod model {
    pub use crate::core::model::*;
}

pub use rng::SeededRng;

pub use core::{
    BundlePaths, CharId, CharVocabulary, DeviceSpec, LabelSet, ModelBundle, ModelMode,
    ModelRegistry, NerError, Result, Segment, SequenceTagger, TaggedToken, WordEmbedder,
    WordSegmenter,
};

pub use infra::{AuditPolicy, JsonlPredictionStore, MemoryPredictionStore, PredictionStore, WeightMap};

pub use app::{AppState, NerPipeline, Server};
pub use envconfig::Settings;
