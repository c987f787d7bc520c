use crate::core::{NerError, Result};
use candle_core::Device;
use std::fmt;
use std::str::FromStr;

/// Requested compute device, as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda(usize),
    Metal(usize),
    /// CUDA if available, then Metal, then CPU.
    Auto,
}

impl DeviceSpec {
    pub fn resolve(&self) -> Result<(Device, DeviceSpec)> {
        match *self {
            DeviceSpec::Cpu => Ok((Device::Cpu, DeviceSpec::Cpu)),
            DeviceSpec::Cuda(ordinal) => Ok((Device::new_cuda(ordinal)?, *self)),
            DeviceSpec::Metal(ordinal) => Ok((Device::new_metal(ordinal)?, *self)),
            DeviceSpec::Auto => {
                if candle_core::utils::cuda_is_available() {
                    DeviceSpec::Cuda(0).resolve()
                } else if candle_core::utils::metal_is_available() {
                    DeviceSpec::Metal(0).resolve()
                } else {
                    DeviceSpec::Cpu.resolve()
                }
            }
        }
    }
}

impl FromStr for DeviceSpec {
    type Err = NerError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        let (kind, ordinal) = match s.split_once(':') {
            Some((kind, ordinal)) => {
                let ordinal = ordinal
                    .parse::<usize>()
                    .map_err(|_| NerError::Config(format!("invalid device ordinal in '{}'", s)))?;
                (kind.to_string(), Some(ordinal))
            }
            None => (s.clone(), None),
        };

        match (kind.as_str(), ordinal) {
            ("cpu", None) => Ok(DeviceSpec::Cpu),
            ("auto", None) => Ok(DeviceSpec::Auto),
            ("cuda" | "gpu", ordinal) => Ok(DeviceSpec::Cuda(ordinal.unwrap_or(0))),
            ("metal" | "mps", ordinal) => Ok(DeviceSpec::Metal(ordinal.unwrap_or(0))),
            _ => Err(NerError::Config(format!("unknown device '{}'", s))),
        }
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSpec::Cpu => write!(f, "cpu"),
            DeviceSpec::Cuda(i) => write!(f, "cuda:{}", i),
            DeviceSpec::Metal(i) => write!(f, "metal:{}", i),
            DeviceSpec::Auto => write!(f, "auto"),
        }
    }
}

/// Execution mode of a loaded model. Loading always yields `Inference`;
/// `Training` only exists so dropout layers know when to stay inert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelMode {
    #[default]
    Inference,
    Training,
}

impl ModelMode {
    pub fn is_train(&self) -> bool {
        matches!(self, ModelMode::Training)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device() {
        assert_eq!("cpu".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cpu);
        assert_eq!("CUDA".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cuda(0));
        assert_eq!("cuda:1".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cuda(1));
        assert_eq!("metal".parse::<DeviceSpec>().unwrap(), DeviceSpec::Metal(0));
        assert_eq!("auto".parse::<DeviceSpec>().unwrap(), DeviceSpec::Auto);
        assert!("tpu".parse::<DeviceSpec>().is_err());
        assert!("cuda:x".parse::<DeviceSpec>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        assert_eq!(DeviceSpec::Cuda(2).to_string(), "cuda:2");
        assert_eq!(DeviceSpec::Cpu.to_string(), "cpu");
    }

    #[test]
    fn test_cpu_resolves() {
        let (device, spec) = DeviceSpec::Cpu.resolve().unwrap();
        assert!(device.is_cpu());
        assert_eq!(spec, DeviceSpec::Cpu);
    }

    #[test]
    fn test_default_mode_is_inference() {
        assert!(!ModelMode::default().is_train());
    }
}
