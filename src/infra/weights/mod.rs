use crate::core::{NerError, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use safetensors::{Dtype, SafeTensors};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const MAX_WEIGHT_FILE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Named parameter tensors read from a safetensors file, converted to F32
/// and placed on the target device.
pub struct WeightMap {
    path: PathBuf,
    tensors: HashMap<String, Tensor>,
    device: Device,
    digest: String,
}

impl WeightMap {
    pub fn load<P: AsRef<Path>>(path: P, device: &Device) -> Result<Self> {
        let path = path.as_ref();
        let size = std::fs::metadata(path).map_err(|e| NerError::load(path, e))?.len();
        if size > MAX_WEIGHT_FILE_BYTES {
            return Err(NerError::load(path, format!("weight file too large: {} bytes", size)));
        }

        let bytes = std::fs::read(path).map_err(|e| NerError::load(path, e))?;
        let digest = format!("{:x}", Sha256::digest(&bytes));
        let st = SafeTensors::deserialize(&bytes)
            .map_err(|e| NerError::load(path, format!("not a safetensors file: {}", e)))?;

        let mut tensors = HashMap::with_capacity(st.len());
        for (name, view) in st.tensors() {
            let dtype = match view.dtype() {
                Dtype::F32 => DType::F32,
                Dtype::F16 => DType::F16,
                Dtype::BF16 => DType::BF16,
                Dtype::F64 => DType::F64,
                other => {
                    return Err(NerError::load(
                        path,
                        format!("tensor {} has unsupported dtype {:?}", name, other),
                    ))
                }
            };
            let tensor = Tensor::from_raw_buffer(view.data(), dtype, view.shape(), &Device::Cpu)
                .and_then(|t| t.to_dtype(DType::F32))
                .and_then(|t| t.to_device(device))
                .map_err(|e| NerError::load(path, format!("tensor {}: {}", name, e)))?;
            tensors.insert(name, tensor);
        }

        tracing::debug!(
            path = %path.display(),
            tensors = tensors.len(),
            "read weight file"
        );

        Ok(Self {
            path: path.to_path_buf(),
            tensors,
            device: device.clone(),
            digest,
        })
    }

    /// Builds a map from tensors already in memory.
    pub fn from_tensors(
        label: impl Into<PathBuf>,
        tensors: HashMap<String, Tensor>,
        device: &Device,
    ) -> Self {
        Self {
            path: label.into(),
            tensors,
            device: device.clone(),
            digest: String::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hex SHA-256 of the file contents; empty for in-memory maps.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tensors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn dims(&self, name: &str) -> Result<&[usize]> {
        self.tensors
            .get(name)
            .map(|t| t.dims())
            .ok_or_else(|| NerError::load(&self.path, format!("missing tensor {}", name)))
    }

    /// Shape of a rank-2 tensor as `(rows, cols)`.
    pub fn dims2(&self, name: &str) -> Result<(usize, usize)> {
        match self.dims(name)? {
            [rows, cols] => Ok((*rows, *cols)),
            other => Err(NerError::load(
                &self.path,
                format!("tensor {} should be 2-dimensional, found {:?}", name, other),
            )),
        }
    }

    /// Number of `{prefix}{i}` tensors present for consecutive `i` from 0.
    pub fn count_indexed(&self, prefix: &str) -> usize {
        (0..)
            .take_while(|i| self.contains(&format!("{}{}", prefix, i)))
            .count()
    }

    pub fn var_builder(&self) -> VarBuilder<'static> {
        VarBuilder::from_tensors(self.tensors.clone(), DType::F32, &self.device)
    }

    /// Maps a shape or lookup failure raised while wiring a model to a load
    /// error naming this file.
    pub fn load_error(&self, e: candle_core::Error) -> NerError {
        NerError::load(&self.path, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HashMap<String, Tensor> {
        let mut tensors = HashMap::new();
        tensors.insert(
            "encoder_gru.weight_hh_l0".to_string(),
            Tensor::zeros((6, 2), DType::F32, &Device::Cpu).unwrap(),
        );
        tensors.insert(
            "encoder_gru.weight_hh_l1".to_string(),
            Tensor::zeros((6, 2), DType::F32, &Device::Cpu).unwrap(),
        );
        tensors.insert(
            "crf.start_transitions".to_string(),
            Tensor::zeros(5, DType::F32, &Device::Cpu).unwrap(),
        );
        tensors
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.safetensors");
        candle_core::safetensors::save(&sample(), &path).unwrap();

        let weights = WeightMap::load(&path, &Device::Cpu).unwrap();
        assert_eq!(weights.names().len(), 3);
        assert_eq!(weights.dims2("encoder_gru.weight_hh_l0").unwrap(), (6, 2));
        assert_eq!(weights.count_indexed("encoder_gru.weight_hh_l"), 2);
        assert_eq!(weights.digest().len(), 64);
    }

    #[test]
    fn test_rank_and_missing_errors() {
        let weights = WeightMap::from_tensors("memory", sample(), &Device::Cpu);
        assert!(weights.dims2("crf.start_transitions").is_err());
        assert!(matches!(
            weights.dims("lstm.weight_ih_l0"),
            Err(NerError::Load { .. })
        ));
    }

    #[test]
    fn test_garbage_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.safetensors");
        std::fs::write(&path, b"definitely not safetensors").unwrap();

        let err = WeightMap::load(&path, &Device::Cpu).err().unwrap();
        assert!(err.is_load_error());
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let err = WeightMap::load("/nonexistent/tagger.safetensors", &Device::Cpu)
            .err()
            .unwrap();
        assert!(err.is_load_error());
    }
}
