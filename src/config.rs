use std::{
    ffi::OsString,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use clap::Parser;
#[cfg(feature = "tch-backend")]
use tch::Device;

use crate::{error::ServiceError, preprocess::PreprocessMode};

/// The service always listens on every interface, port 8000.
pub const LISTEN_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8000);

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Parser)]
#[command(
    name = "digit-predict-service",
    version,
    about = "Serves handwritten digit predictions over HTTP"
)]
struct Cli {
    /// Serialized model: dense weights (.json) or TorchScript (.pt/.ts, tch builds only)
    model_path: PathBuf,

    /// How uploads are reduced to a 28x28 grayscale tensor
    #[arg(long, value_enum, default_value_t = PreprocessMode::Exact)]
    preprocess: PreprocessMode,

    /// Largest accepted request body, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    /// Inference device: cpu, cuda or cuda:N
    #[cfg(feature = "tch-backend")]
    #[arg(long, default_value = "cpu")]
    device: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub model_path: PathBuf,
    pub preprocess: PreprocessMode,
    pub max_upload_bytes: usize,
    #[cfg(feature = "tch-backend")]
    pub device: Device,
}

impl AppConfig {
    /// Parses the process arguments. Exits with usage output when they are
    /// malformed or the model path is missing.
    pub fn from_args() -> Result<Self, ServiceError> {
        Self::from_cli(Cli::parse())
    }

    pub fn try_from_args<I, T>(args: I) -> Result<Self, ServiceError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = Cli::try_parse_from(args).map_err(|e| ServiceError::Config(e.to_string()))?;
        Self::from_cli(cli)
    }

    /// Builds a config for the given model with every other setting at its default.
    pub fn for_model(model_path: impl Into<PathBuf>, preprocess: PreprocessMode) -> Self {
        Self {
            listen_addr: LISTEN_ADDR,
            model_path: model_path.into(),
            preprocess,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            #[cfg(feature = "tch-backend")]
            device: Device::Cpu,
        }
    }

    fn from_cli(cli: Cli) -> Result<Self, ServiceError> {
        let config = Self {
            listen_addr: LISTEN_ADDR,
            model_path: cli.model_path,
            preprocess: cli.preprocess,
            max_upload_bytes: cli.max_upload_bytes,
            #[cfg(feature = "tch-backend")]
            device: parse_device(&cli.device),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.model_path.as_os_str().is_empty() {
            return Err(ServiceError::Config("model path must not be empty".into()));
        }
        if self.max_upload_bytes == 0 {
            return Err(ServiceError::Config(
                "max upload size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(feature = "tch-backend")]
fn parse_device(raw: &str) -> Device {
    let lower = raw.to_lowercase();
    if lower == "cpu" {
        Device::Cpu
    } else if lower.starts_with("cuda") {
        let idx = lower
            .split(':')
            .nth(1)
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);
        if tch::Cuda::is_available() {
            Device::Cuda(idx)
        } else {
            tracing::warn!(requested = %raw, "CUDA unavailable, falling back to CPU");
            Device::Cpu
        }
    } else {
        tracing::warn!(requested = %raw, "unknown device, using CPU");
        Device::Cpu
    }
}
