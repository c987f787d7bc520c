use super::autoencoder::CharAutoencoder;
use super::tagger::BiLstmCrf;
use super::traits::{SequenceTagger, WordEmbedder};
use crate::core::labels::LabelSet;
use crate::core::tensor::{DeviceSpec, ModelMode};
use crate::core::vocab::CharVocabulary;
use crate::core::{NerError, Result};
use crate::infra::weights::WeightMap;
use candle_core::Device;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlePaths {
    pub autoencoder: PathBuf,
    pub tagger: PathBuf,
    pub vocabulary: PathBuf,
}

impl BundlePaths {
    /// Default file names inside a model directory.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            autoencoder: dir.join("char_autoencoder.safetensors"),
            tagger: dir.join("bilstm_crf.safetensors"),
            vocabulary: dir.join("char2idx.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BundleInfo {
    pub device: String,
    pub embedding_dim: usize,
    pub vocab_size: usize,
    pub labels: Vec<String>,
    pub digest: String,
}

/// Everything inference needs, loaded once and shared read-only.
pub struct ModelBundle {
    embedder: Box<dyn WordEmbedder>,
    tagger: Box<dyn SequenceTagger>,
    vocabulary: Arc<CharVocabulary>,
    labels: LabelSet,
    device: Device,
    device_spec: DeviceSpec,
    digest: String,
}

impl std::fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBundle")
            .field("device", &self.device_spec)
            .field("embedding_dim", &self.embedder.output_dim())
            .field("labels", &self.labels)
            .field("digest", &self.digest)
            .finish()
    }
}

impl ModelBundle {
    /// Assembles a bundle from already constructed parts, checking that the
    /// parts fit together.
    pub fn new(
        embedder: Box<dyn WordEmbedder>,
        tagger: Box<dyn SequenceTagger>,
        vocabulary: Arc<CharVocabulary>,
        labels: LabelSet,
        device: Device,
        device_spec: DeviceSpec,
    ) -> Result<Self> {
        if embedder.output_dim() != tagger.input_dim() {
            return Err(NerError::mismatch(
                "tagger input vs embedder output",
                embedder.output_dim(),
                tagger.input_dim(),
            ));
        }
        if tagger.num_labels() != labels.len() {
            return Err(NerError::mismatch(
                "tagger labels vs label set",
                labels.len(),
                tagger.num_labels(),
            ));
        }
        if embedder.mode() != ModelMode::Inference || tagger.mode() != ModelMode::Inference {
            return Err(NerError::Incompatible(
                "bundle models must be in inference mode".to_string(),
            ));
        }

        Ok(Self {
            embedder,
            tagger,
            vocabulary,
            labels,
            device,
            device_spec,
            digest: String::new(),
        })
    }

    /// Loads vocabulary and both models from disk onto the requested device.
    pub fn load(paths: &BundlePaths, labels: LabelSet, device: DeviceSpec) -> Result<Self> {
        let (dev, device_spec) = device
            .resolve()
            .map_err(|e| NerError::Config(format!("cannot open device {}: {}", device, e)))?;

        let vocabulary = Arc::new(CharVocabulary::load(&paths.vocabulary)?);
        let autoencoder_weights = WeightMap::load(&paths.autoencoder, &dev)?;
        let tagger_weights = WeightMap::load(&paths.tagger, &dev)?;

        let embedder = CharAutoencoder::load(&autoencoder_weights, Arc::clone(&vocabulary))?;
        let tagger = BiLstmCrf::load(&tagger_weights)?;

        let mut hasher = Sha256::new();
        hasher.update(autoencoder_weights.digest().as_bytes());
        hasher.update(tagger_weights.digest().as_bytes());
        hasher.update(std::fs::read(&paths.vocabulary).map_err(|e| NerError::load(&paths.vocabulary, e))?);
        for label in labels.iter() {
            hasher.update(label.as_bytes());
            hasher.update(b"\n");
        }
        let digest = format!("{:x}", hasher.finalize());

        let bundle = Self::new(
            Box::new(embedder),
            Box::new(tagger),
            vocabulary,
            labels,
            dev,
            device_spec,
        )?
        .with_digest(digest);

        tracing::info!(
            device = %bundle.device_spec,
            embedding_dim = bundle.embedder.output_dim(),
            labels = bundle.labels.len(),
            digest = %bundle.digest,
            "model bundle ready"
        );
        Ok(bundle)
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = digest.into();
        self
    }

    pub fn embedder(&self) -> &dyn WordEmbedder {
        self.embedder.as_ref()
    }

    pub fn tagger(&self) -> &dyn SequenceTagger {
        self.tagger.as_ref()
    }

    pub fn vocabulary(&self) -> &CharVocabulary {
        &self.vocabulary
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn device_spec(&self) -> DeviceSpec {
        self.device_spec
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn info(&self) -> BundleInfo {
        BundleInfo {
            device: self.device_spec.to_string(),
            embedding_dim: self.embedder.output_dim(),
            vocab_size: self.vocabulary.len(),
            labels: self.labels.iter().map(String::from).collect(),
            digest: self.digest.clone(),
        }
    }
}
