//! Application state: the metrics registry and scrape encoding.

use prometheus::{Encoder, Registry, TextEncoder};

use crate::collector::GpuCollector;
use crate::config::CollectorOptions;
use crate::error::Result;
use crate::exposition::GpuMetricsCollector;
use crate::source::TelemetrySource;

/// Content type of [`App::scrape`] output.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Main application state shared by every request handler.
pub struct App {
    registry: Registry,
}

impl App {
    /// Create the registry and register the GPU collector with `source`.
    ///
    /// Registration validates every metric name and label set up front.
    pub fn new<S: TelemetrySource + 'static>(source: S, options: CollectorOptions) -> Result<Self> {
        let registry = Registry::new();
        let collector = GpuMetricsCollector::new(GpuCollector::new(source, options))?;
        registry.register(Box::new(collector))?;
        Ok(Self { registry })
    }

    /// Run a sweep and encode it in the Prometheus text format.
    ///
    /// Blocking: the sweep talks to the driver synchronously.
    pub fn scrape(&self) -> Result<Vec<u8>> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        Ok(buffer)
    }
}
