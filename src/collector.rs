//! The sweep: one pass over every device and every enabled metric.

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::config::CollectorOptions;
use crate::error::SourceError;
use crate::metrics::{catalog, read_device, MetricDefinition, MetricKey};
use crate::source::{DeviceReader, TelemetrySource};
use crate::types::{Device, Observation, Sweep};

/// Collects GPU telemetry from a [`TelemetrySource`] on demand.
///
/// The source is owned by the collector and only touched while the sweep
/// lock is held, so at most one sweep talks to the driver at a time.
pub struct GpuCollector<S> {
    source: Mutex<S>,
    options: CollectorOptions,
    definitions: Vec<&'static MetricDefinition>,
}

impl<S: TelemetrySource> GpuCollector<S> {
    pub fn new(source: S, options: CollectorOptions) -> Self {
        let definitions = catalog(&options);
        Self {
            source: Mutex::new(source),
            options,
            definitions,
        }
    }

    /// Every metric this collector may emit.
    pub fn describe(&self) -> Vec<&'static MetricDefinition> {
        self.definitions.clone()
    }

    /// Run one sweep.
    ///
    /// Blocks while another sweep is in progress. Only a failed device count
    /// aborts the sweep, leaving `up = 0` as its single sample.
    pub fn collect(&self) -> Sweep {
        let source = self.source.lock();

        let count = match source.device_count() {
            Ok(count) => count,
            Err(err) => {
                error!(error = %err, "failed to collect metrics: device enumeration failed");
                return Sweep::unhealthy();
            }
        };

        let mut sweep = Sweep::healthy();
        sweep.record(MetricKey::DeviceCount, Vec::new(), f64::from(count));

        match source.driver_version() {
            Ok(version) => sweep.record(MetricKey::DriverInfo, vec![version], 1.0),
            Err(err) => debug!(error = %err, "driver version unavailable"),
        }

        for index in 0..count {
            let handle = match source.device_by_index(index) {
                Ok(handle) => handle,
                Err(err) => {
                    warn!(index, error = %err, "skipping device: no handle");
                    continue;
                }
            };

            let device = match identify(index, &handle) {
                Ok(device) => device,
                Err(err) => {
                    warn!(index, error = %err, "skipping device: identity unavailable");
                    continue;
                }
            };

            sweep.record(MetricKey::Info, device.info_labels(), 1.0);

            let labels = device.labels();
            for (key, observation) in read_device(&handle, index, &self.options) {
                if let Observation::Present(value) = observation {
                    sweep.record(key, labels.clone(), value);
                }
            }
        }

        sweep
    }
}

/// Resolve the fields that make up a device's label set.
fn identify<D: DeviceReader>(index: u32, handle: &D) -> Result<Device, SourceError> {
    Ok(Device {
        index,
        minor_number: handle.minor_number()?,
        uuid: handle.uuid()?,
        name: handle.name()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::mock::{Accessor, Call, MockGpu};
    use crate::source::MockSource;

    #[test]
    fn test_describe_is_gated() {
        let options = CollectorOptions {
            fan_speed: false,
            ..CollectorOptions::default()
        };
        let collector = GpuCollector::new(MockSource::new(Vec::new()), options);
        assert!(collector
            .describe()
            .iter()
            .all(|definition| definition.key != MetricKey::FanSpeed));
    }

    #[test]
    fn test_no_devices() {
        let collector = GpuCollector::new(MockSource::new(Vec::new()), CollectorOptions::default());
        let sweep = collector.collect();

        assert!(sweep.is_healthy());
        assert_eq!(sweep.get(MetricKey::DeviceCount, &[]), Some(0.0));
        assert_eq!(sweep.get(MetricKey::Up, &[]), Some(1.0));
        assert_eq!(sweep.metric(MetricKey::Info).count(), 0);
    }

    #[test]
    fn test_identity_failure_stops_device_reads() {
        let source = MockSource::new(vec![MockGpu::new(0).failing(Accessor::Uuid)]);
        let collector = GpuCollector::new(source.clone(), CollectorOptions::default());
        let sweep = collector.collect();

        assert_eq!(sweep.get(MetricKey::DeviceCount, &[]), Some(1.0));
        assert_eq!(sweep.metric(MetricKey::Info).count(), 0);
        assert!(!source.was_called(Accessor::Temperature));
    }

    #[test]
    fn test_driver_version_is_optional() {
        let source = MockSource::new(vec![MockGpu::new(0)]);
        source.set_driver_version(None);
        let collector = GpuCollector::new(source, CollectorOptions::default());
        let sweep = collector.collect();

        assert!(sweep.is_healthy());
        assert_eq!(sweep.metric(MetricKey::DriverInfo).count(), 0);
        assert_eq!(sweep.metric(MetricKey::Temperature).count(), 1);
    }

    #[test]
    fn test_enumeration_failure_skips_device_reads() {
        let source = MockSource::new(vec![MockGpu::new(0)]);
        source.set_enumeration_failure(true);
        let collector = GpuCollector::new(source.clone(), CollectorOptions::default());
        let sweep = collector.collect();

        assert!(!sweep.is_healthy());
        assert_eq!(source.calls(), vec![Call::DeviceCount]);
    }
}
