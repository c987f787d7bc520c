pub mod storage;
pub mod weights;

pub use storage::{
    AuditPolicy, JsonlPredictionStore, MemoryPredictionStore, NewPrediction, PredictionRecord,
    PredictionStore,
};
pub use weights::WeightMap;
