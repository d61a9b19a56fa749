//! Error types for the telemetry source and the exporter.

use thiserror::Error;

/// Failure of a single telemetry source call.
///
/// The collector treats every variant the same way: the affected metric,
/// device or sweep is skipped. The variants only exist to make logs useful.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("not supported by this device or driver")]
    NotSupported,

    #[error("device {0} not found")]
    NotFound(u32),

    #[error("no samples recorded in the averaging window")]
    NoSamples,

    #[error("driver library error: {0}")]
    Driver(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("telemetry unavailable: {0}")]
    Unavailable(String),
}

#[cfg(not(target_os = "macos"))]
impl From<nvml_wrapper::error::NvmlError> for SourceError {
    fn from(err: nvml_wrapper::error::NvmlError) -> Self {
        match err {
            nvml_wrapper::error::NvmlError::NotSupported => SourceError::NotSupported,
            other => SourceError::Driver(Box::new(other)),
        }
    }
}

/// Errors surfaced by the exporter outside of a sweep.
#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("metrics registry error: {0}")]
    Registry(#[from] prometheus::Error),

    #[error("scrape task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ExporterError>;
