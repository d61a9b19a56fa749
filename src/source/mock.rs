//! Scripted in-memory telemetry source.
//!
//! `MockSource` lets tests and demos drive the collector without NVML. Every
//! call is appended to a shared log so tests can assert on what the
//! collector asked for and in which order.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use super::{
    ClockDomain, DeviceReader, MemoryUsage, PcieDirection, Reading, TelemetrySource,
    UtilizationRates,
};
use crate::error::SourceError;

/// One accessor of a device handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accessor {
    MinorNumber,
    Uuid,
    Name,
    Temperature,
    PowerUsage,
    AveragePowerUsage,
    PowerManagementLimit,
    EnforcedPowerLimit,
    FanSpeed,
    MemoryInfo,
    UtilizationRates,
    AverageGpuUtilization,
    EncoderUtilization,
    DecoderUtilization,
    Clock(ClockDomain),
    PcieLinkGeneration,
    PcieLinkWidth,
    PcieThroughput(PcieDirection),
}

/// A recorded source call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    DriverVersion,
    DeviceCount,
    DeviceByIndex(u32),
    Device(u32, Accessor),
}

/// Values reported by one simulated GPU.
#[derive(Debug, Clone)]
pub struct MockGpu {
    pub minor_number: u32,
    pub uuid: String,
    pub name: String,
    pub temperature: u32,
    pub power_usage_mw: u32,
    pub average_power_usage_mw: f64,
    pub power_limit_mw: u32,
    pub enforced_power_limit_mw: u32,
    pub fan_speed: u32,
    pub memory: MemoryUsage,
    pub utilization: UtilizationRates,
    pub average_gpu_utilization: f64,
    pub encoder_utilization: u32,
    pub decoder_utilization: u32,
    pub graphics_clock_mhz: u32,
    pub sm_clock_mhz: u32,
    pub memory_clock_mhz: u32,
    pub pcie_link_generation: u32,
    pub pcie_link_width: u32,
    pub pcie_tx_kbps: u32,
    pub pcie_rx_kbps: u32,
    /// Accessors that return an error.
    pub failing: HashSet<Accessor>,
    /// Fail the handle lookup itself.
    pub missing: bool,
}

impl MockGpu {
    /// A fully readable GPU whose identity is derived from `minor_number`.
    pub fn new(minor_number: u32) -> Self {
        Self {
            minor_number,
            uuid: format!("GPU-{:08x}-0000-0000-0000-000000000000", minor_number),
            name: "Tesla T4".into(),
            temperature: 40,
            power_usage_mw: 70_000,
            average_power_usage_mw: 68_500.0,
            power_limit_mw: 70_000,
            enforced_power_limit_mw: 70_000,
            fan_speed: 30,
            memory: MemoryUsage {
                total: 16 * 1024 * 1024 * 1024,
                used: 1024 * 1024 * 1024,
            },
            utilization: UtilizationRates { gpu: 10, memory: 5 },
            average_gpu_utilization: 12.5,
            encoder_utilization: 0,
            decoder_utilization: 0,
            graphics_clock_mhz: 1590,
            sm_clock_mhz: 1590,
            memory_clock_mhz: 5000,
            pcie_link_generation: 3,
            pcie_link_width: 16,
            pcie_tx_kbps: 100,
            pcie_rx_kbps: 200,
            failing: HashSet::new(),
            missing: false,
        }
    }

    /// Make `accessor` fail on this GPU.
    pub fn failing(mut self, accessor: Accessor) -> Self {
        self.failing.insert(accessor);
        self
    }

    /// Make the handle lookup for this GPU fail.
    pub fn missing(mut self) -> Self {
        self.missing = true;
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    driver_version: Option<String>,
    count_fails: bool,
    enumeration_delay: Option<Duration>,
    gpus: Vec<MockGpu>,
    calls: Vec<Call>,
    windows: Vec<(Accessor, Duration)>,
}

/// Cloneable handle to a scripted source; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    state: Arc<Mutex<MockState>>,
}

impl MockSource {
    pub fn new(gpus: Vec<MockGpu>) -> Self {
        let source = Self::default();
        {
            let mut state = source.state.lock();
            state.gpus = gpus;
            state.driver_version = Some("550.54.15".into());
        }
        source
    }

    /// Replace the simulated devices, e.g. to model a hot-unplug between sweeps.
    pub fn set_gpus(&self, gpus: Vec<MockGpu>) {
        self.state.lock().gpus = gpus;
    }

    /// Make `device_count` fail.
    pub fn set_enumeration_failure(&self, fails: bool) {
        self.state.lock().count_fails = fails;
    }

    pub fn set_driver_version(&self, version: Option<&str>) {
        self.state.lock().driver_version = version.map(str::to_string);
    }

    /// Sleep inside `device_count`, to widen the window for overlapping sweeps.
    pub fn set_enumeration_delay(&self, delay: Duration) {
        self.state.lock().enumeration_delay = Some(delay);
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        let mut state = self.state.lock();
        state.calls.clear();
        state.windows.clear();
    }

    /// Window passed to each rolling-average accessor call, in call order.
    pub fn averaging_windows(&self) -> Vec<(Accessor, Duration)> {
        self.state.lock().windows.clone()
    }

    /// True if any device accessor `accessor` was called.
    pub fn was_called(&self, accessor: Accessor) -> bool {
        self.state
            .lock()
            .calls
            .iter()
            .any(|call| matches!(call, Call::Device(_, a) if *a == accessor))
    }

    fn log(&self, call: Call) {
        self.state.lock().calls.push(call);
    }

    fn log_window(&self, accessor: Accessor, window: Duration) {
        self.state.lock().windows.push((accessor, window));
    }
}

impl TelemetrySource for MockSource {
    type Device<'a> = MockDevice;

    fn driver_version(&self) -> Reading<String> {
        self.log(Call::DriverVersion);
        self.state
            .lock()
            .driver_version
            .clone()
            .ok_or(SourceError::NotSupported)
    }

    fn device_count(&self) -> Reading<u32> {
        self.log(Call::DeviceCount);
        let (delay, fails, count) = {
            let state = self.state.lock();
            (state.enumeration_delay, state.count_fails, state.gpus.len())
        };
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        if fails {
            return Err(SourceError::Unavailable("driver not loaded".into()));
        }
        Ok(count as u32)
    }

    fn device_by_index(&self, index: u32) -> Reading<MockDevice> {
        self.log(Call::DeviceByIndex(index));
        let gpu = self
            .state
            .lock()
            .gpus
            .get(index as usize)
            .filter(|gpu| !gpu.missing)
            .cloned()
            .ok_or(SourceError::NotFound(index))?;
        Ok(MockDevice {
            index,
            gpu,
            source: self.clone(),
        })
    }
}

/// Handle to one simulated GPU.
pub struct MockDevice {
    index: u32,
    gpu: MockGpu,
    source: MockSource,
}

impl MockDevice {
    fn read<T>(&self, accessor: Accessor, value: impl FnOnce(&MockGpu) -> T) -> Reading<T> {
        self.source.log(Call::Device(self.index, accessor));
        if self.gpu.failing.contains(&accessor) {
            return Err(SourceError::NotSupported);
        }
        Ok(value(&self.gpu))
    }
}

impl DeviceReader for MockDevice {
    fn minor_number(&self) -> Reading<u32> {
        self.read(Accessor::MinorNumber, |gpu| gpu.minor_number)
    }

    fn uuid(&self) -> Reading<String> {
        self.read(Accessor::Uuid, |gpu| gpu.uuid.clone())
    }

    fn name(&self) -> Reading<String> {
        self.read(Accessor::Name, |gpu| gpu.name.clone())
    }

    fn temperature(&self) -> Reading<u32> {
        self.read(Accessor::Temperature, |gpu| gpu.temperature)
    }

    fn power_usage(&self) -> Reading<u32> {
        self.read(Accessor::PowerUsage, |gpu| gpu.power_usage_mw)
    }

    fn average_power_usage(&self, window: Duration) -> Reading<f64> {
        self.source.log_window(Accessor::AveragePowerUsage, window);
        self.read(Accessor::AveragePowerUsage, |gpu| gpu.average_power_usage_mw)
    }

    fn power_management_limit(&self) -> Reading<u32> {
        self.read(Accessor::PowerManagementLimit, |gpu| gpu.power_limit_mw)
    }

    fn enforced_power_limit(&self) -> Reading<u32> {
        self.read(Accessor::EnforcedPowerLimit, |gpu| gpu.enforced_power_limit_mw)
    }

    fn fan_speed(&self) -> Reading<u32> {
        self.read(Accessor::FanSpeed, |gpu| gpu.fan_speed)
    }

    fn memory_info(&self) -> Reading<MemoryUsage> {
        self.read(Accessor::MemoryInfo, |gpu| gpu.memory)
    }

    fn utilization_rates(&self) -> Reading<UtilizationRates> {
        self.read(Accessor::UtilizationRates, |gpu| gpu.utilization)
    }

    fn average_gpu_utilization(&self, window: Duration) -> Reading<f64> {
        self.source.log_window(Accessor::AverageGpuUtilization, window);
        self.read(Accessor::AverageGpuUtilization, |gpu| {
            gpu.average_gpu_utilization
        })
    }

    fn encoder_utilization(&self) -> Reading<u32> {
        self.read(Accessor::EncoderUtilization, |gpu| gpu.encoder_utilization)
    }

    fn decoder_utilization(&self) -> Reading<u32> {
        self.read(Accessor::DecoderUtilization, |gpu| gpu.decoder_utilization)
    }

    fn clock(&self, domain: ClockDomain) -> Reading<u32> {
        self.read(Accessor::Clock(domain), |gpu| match domain {
            ClockDomain::Graphics => gpu.graphics_clock_mhz,
            ClockDomain::Sm => gpu.sm_clock_mhz,
            ClockDomain::Memory => gpu.memory_clock_mhz,
        })
    }

    fn pcie_link_generation(&self) -> Reading<u32> {
        self.read(Accessor::PcieLinkGeneration, |gpu| gpu.pcie_link_generation)
    }

    fn pcie_link_width(&self) -> Reading<u32> {
        self.read(Accessor::PcieLinkWidth, |gpu| gpu.pcie_link_width)
    }

    fn pcie_throughput(&self, direction: PcieDirection) -> Reading<u32> {
        self.read(Accessor::PcieThroughput(direction), |gpu| match direction {
            PcieDirection::Tx => gpu.pcie_tx_kbps,
            PcieDirection::Rx => gpu.pcie_rx_kbps,
        })
    }
}
