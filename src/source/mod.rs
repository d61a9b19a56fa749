//! Telemetry sources: the boundary between the collector and the driver library.
//!
//! The collector only talks to [`TelemetrySource`] and [`DeviceReader`]. Every
//! accessor is independently fallible; the collector decides what a failure
//! means for the sweep.

use std::time::Duration;

use humansize::{format_size, BINARY};
use tracing::{info, warn};

use crate::error::SourceError;

pub mod mock;
#[cfg(not(target_os = "macos"))]
pub mod nvml;

pub use mock::MockSource;
#[cfg(not(target_os = "macos"))]
pub use nvml::NvmlSource;

/// Result of one source call.
pub type Reading<T> = std::result::Result<T, SourceError>;

/// Memory usage in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub total: u64,
    pub used: u64,
}

/// Utilization percentages over the driver's last sample period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtilizationRates {
    pub gpu: u32,
    pub memory: u32,
}

/// Clock domains read by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockDomain {
    Graphics,
    Sm,
    Memory,
}

/// PCIe traffic direction, seen from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PcieDirection {
    Tx,
    Rx,
}

/// Process-wide handle to the telemetry library.
pub trait TelemetrySource: Send {
    type Device<'a>: DeviceReader
    where
        Self: 'a;

    fn driver_version(&self) -> Reading<String>;

    fn device_count(&self) -> Reading<u32>;

    fn device_by_index(&self, index: u32) -> Reading<Self::Device<'_>>;
}

/// Per-device accessors. Units are the ones the driver reports.
pub trait DeviceReader {
    fn minor_number(&self) -> Reading<u32>;
    fn uuid(&self) -> Reading<String>;
    fn name(&self) -> Reading<String>;

    /// Core temperature in degrees Celsius.
    fn temperature(&self) -> Reading<u32>;
    /// Board power draw in milliwatts.
    fn power_usage(&self) -> Reading<u32>;
    /// Mean power draw in milliwatts over the trailing `window`.
    fn average_power_usage(&self, window: Duration) -> Reading<f64>;
    /// Configured power management limit in milliwatts.
    fn power_management_limit(&self) -> Reading<u32>;
    /// Power limit the driver enforces, in milliwatts.
    fn enforced_power_limit(&self) -> Reading<u32>;
    /// Fan speed in percent of maximum.
    fn fan_speed(&self) -> Reading<u32>;
    fn memory_info(&self) -> Reading<MemoryUsage>;
    fn utilization_rates(&self) -> Reading<UtilizationRates>;
    /// Mean GPU utilization in percent over the trailing `window`.
    fn average_gpu_utilization(&self, window: Duration) -> Reading<f64>;
    fn encoder_utilization(&self) -> Reading<u32>;
    fn decoder_utilization(&self) -> Reading<u32>;
    /// Current clock in MHz.
    fn clock(&self, domain: ClockDomain) -> Reading<u32>;
    fn pcie_link_generation(&self) -> Reading<u32>;
    fn pcie_link_width(&self) -> Reading<u32>;
    /// PCIe throughput in KB/s.
    fn pcie_throughput(&self, direction: PcieDirection) -> Reading<u32>;
}

/// Log the driver version and every visible device once at startup.
pub fn log_inventory<S: TelemetrySource>(source: &S) {
    match source.driver_version() {
        Ok(version) => info!(%version, "NVIDIA driver detected"),
        Err(err) => warn!(error = %err, "could not read driver version"),
    }

    let count = match source.device_count() {
        Ok(count) => count,
        Err(err) => {
            warn!(error = %err, "could not enumerate devices");
            return;
        }
    };
    info!(count, "found {} GPU(s)", count);

    for index in 0..count {
        let Ok(device) = source.device_by_index(index) else {
            warn!(index, "device handle unavailable");
            continue;
        };
        let name = device.name().unwrap_or_else(|_| "Unknown GPU".into());
        let uuid = device.uuid().unwrap_or_else(|_| "?".into());
        let memory = device
            .memory_info()
            .map(|memory| format_size(memory.total, BINARY))
            .unwrap_or_else(|_| "N/A".into());
        info!(index, %name, %uuid, %memory, "GPU");
    }
}
