use crate::core::model::BundlePaths;
use crate::core::{DeviceSpec, LabelSet, NerError, Result};
use crate::infra::storage::AuditPolicy;
use std::env;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub host: String,
    pub port: u16,
}

impl Host {
    pub fn parse(value: &str) -> Result<Self> {
        match value.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| NerError::Config(format!("KHMER_NER_HOST: invalid port '{}'", port)))?;
                Ok(Self {
                    host: host.to_string(),
                    port,
                })
            }
            None => Ok(Self {
                host: value.to_string(),
                port: DEFAULT_PORT,
            }),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: Host,
    pub models_dir: PathBuf,
    pub autoencoder_path: PathBuf,
    pub tagger_path: PathBuf,
    pub char2idx_path: PathBuf,
    pub labels: LabelSet,
    pub device: DeviceSpec,
    pub segmenter: String,
    pub history_path: PathBuf,
    pub audit: AuditPolicy,
    pub max_text_chars: usize,
    pub log_level: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from any key lookup, so tests need not touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let models_dir = expand_home(
            &var("KHMER_NER_MODELS").unwrap_or_else(|| "~/.khmer-ner/models".to_string()),
        );
        let defaults = BundlePaths::in_dir(&models_dir);

        let labels = match var("KHMER_NER_LABELS") {
            Some(spec) => LabelSet::parse(&spec)
                .map_err(|e| NerError::Config(format!("KHMER_NER_LABELS: {}", e)))?,
            None => LabelSet::default(),
        };

        let device = var("KHMER_NER_DEVICE")
            .map(|d| d.parse::<DeviceSpec>())
            .transpose()?
            .unwrap_or_default();

        let audit = var("KHMER_NER_AUDIT")
            .map(|a| a.parse::<AuditPolicy>())
            .transpose()?
            .unwrap_or_default();

        let max_text_chars = match var("KHMER_NER_MAX_TEXT_CHARS") {
            Some(v) => v.trim().parse().map_err(|_| {
                NerError::Config(format!("KHMER_NER_MAX_TEXT_CHARS must be a number, got '{}'", v))
            })?,
            None => 5000,
        };

        let history_default = models_dir
            .parent()
            .map(|p| p.join("prediction_logs.jsonl"))
            .unwrap_or_else(|| PathBuf::from("prediction_logs.jsonl"));

        Ok(Self {
            host: Host::parse(&var("KHMER_NER_HOST").unwrap_or_else(|| format!("0.0.0.0:{}", DEFAULT_PORT)))?,
            autoencoder_path: var("KHMER_NER_AUTOENCODER_PATH")
                .map(|p| expand_home(&p))
                .unwrap_or(defaults.autoencoder),
            tagger_path: var("KHMER_NER_TAGGER_PATH")
                .map(|p| expand_home(&p))
                .unwrap_or(defaults.tagger),
            char2idx_path: var("KHMER_NER_CHAR2IDX_PATH")
                .map(|p| expand_home(&p))
                .unwrap_or(defaults.vocabulary),
            history_path: var("KHMER_NER_HISTORY_PATH")
                .map(|p| expand_home(&p))
                .unwrap_or(history_default),
            models_dir: models_dir.clone(),
            labels,
            device,
            segmenter: var("KHMER_NER_SEGMENTER").unwrap_or_else(|| "cluster".to_string()),
            audit,
            max_text_chars,
            log_level: var("KHMER_NER_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn bundle_paths(&self) -> BundlePaths {
        BundlePaths {
            autoencoder: self.autoencoder_path.clone(),
            tagger: self.tagger_path.clone(),
            vocabulary: self.char2idx_path.clone(),
        }
    }
}

pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
