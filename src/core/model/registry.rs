use super::bundle::{BundlePaths, ModelBundle};
use crate::core::labels::LabelSet;
use crate::core::tensor::DeviceSpec;
use crate::core::{NerError, Result};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Owns the process's model bundle. The first `initialize` call loads it;
/// every later call, concurrent or not, observes that single outcome. A
/// failed load is kept and reported, never retried.
#[derive(Default)]
pub struct ModelRegistry {
    state: OnceCell<std::result::Result<Arc<ModelBundle>, String>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            state: OnceCell::new(),
        }
    }

    /// A registry that already holds `bundle`.
    pub fn with_bundle(bundle: ModelBundle) -> Self {
        let registry = Self::new();
        let _ = registry.state.set(Ok(Arc::new(bundle)));
        registry
    }

    pub fn initialize(
        &self,
        paths: &BundlePaths,
        labels: LabelSet,
        device: DeviceSpec,
    ) -> Result<Arc<ModelBundle>> {
        self.initialize_with(|| ModelBundle::load(paths, labels, device))
    }

    pub fn initialize_with<F>(&self, load: F) -> Result<Arc<ModelBundle>>
    where
        F: FnOnce() -> Result<ModelBundle>,
    {
        let state = self.state.get_or_init(|| match load() {
            Ok(bundle) => Ok(Arc::new(bundle)),
            Err(e) => {
                tracing::error!(error = %e, "model bundle failed to load");
                Err(e.to_string())
            }
        });
        Self::to_result(state)
    }

    pub fn get_bundle(&self) -> Result<Arc<ModelBundle>> {
        match self.state.get() {
            Some(state) => Self::to_result(state),
            None => Err(NerError::NotLoaded("models are not initialized".to_string())),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state.get().is_some()
    }

    pub fn health(&self) -> Health {
        match self.state.get() {
            Some(Ok(bundle)) => Health {
                loaded: true,
                device: Some(bundle.device_spec().to_string()),
                error: None,
            },
            Some(Err(message)) => Health {
                loaded: false,
                device: None,
                error: Some(message.clone()),
            },
            None => Health {
                loaded: false,
                device: None,
                error: Some("models are not initialized".to_string()),
            },
        }
    }

    fn to_result(state: &std::result::Result<Arc<ModelBundle>, String>) -> Result<Arc<ModelBundle>> {
        match state {
            Ok(bundle) => Ok(Arc::clone(bundle)),
            Err(message) => Err(NerError::NotLoaded(message.clone())),
        }
    }
}
