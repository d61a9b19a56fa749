//! Prometheus exporter for NVIDIA GPU telemetry.
//!
//! Every scrape runs one sweep over the GPUs visible to the telemetry source
//! and publishes what could be read. Failures are isolated per metric and per
//! device; only a failed device enumeration degrades a scrape to `up 0`.

pub mod app;
pub mod collector;
pub mod config;
pub mod error;
pub mod exposition;
pub mod metrics;
pub mod server;
pub mod source;
pub mod types;
pub mod utils;

pub use app::App;
pub use collector::GpuCollector;
pub use config::{Args, CollectorOptions, ServerConfig};
pub use error::{ExporterError, SourceError};
pub use metrics::{MetricDefinition, MetricKey};
pub use source::{DeviceReader, TelemetrySource};
pub use types::{Device, Observation, Sample, Sweep};
