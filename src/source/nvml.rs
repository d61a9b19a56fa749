//! NVML-backed telemetry source (Linux/Windows).

use std::time::Duration;

use chrono::Utc;
use nvml_wrapper::enum_wrappers::device::{Clock, PcieUtilCounter, Sampling, TemperatureSensor};
use nvml_wrapper::enums::device::SampleValue;
use nvml_wrapper::{Device, Nvml};
use tracing::info;

use super::{
    ClockDomain, DeviceReader, MemoryUsage, PcieDirection, Reading, TelemetrySource,
    UtilizationRates,
};
use crate::error::SourceError;
use crate::utils::mean;

/// Owns the process-wide NVML handle. NVML is shut down when this is dropped.
pub struct NvmlSource {
    nvml: Nvml,
}

impl NvmlSource {
    /// Load and initialize the NVML library.
    pub fn init() -> Result<Self, SourceError> {
        info!("Initializing NVML");
        let nvml = Nvml::init()?;
        Ok(Self { nvml })
    }
}

impl TelemetrySource for NvmlSource {
    type Device<'a> = NvmlDevice<'a>;

    fn driver_version(&self) -> Reading<String> {
        Ok(self.nvml.sys_driver_version()?)
    }

    fn device_count(&self) -> Reading<u32> {
        Ok(self.nvml.device_count()?)
    }

    fn device_by_index(&self, index: u32) -> Reading<NvmlDevice<'_>> {
        let device = self.nvml.device_by_index(index)?;
        Ok(NvmlDevice { device })
    }
}

/// A device handle borrowed from [`NvmlSource`].
pub struct NvmlDevice<'nvml> {
    device: Device<'nvml>,
}

impl NvmlDevice<'_> {
    /// Mean of the driver's sample buffer over the trailing `window`.
    fn average(&self, sampling: Sampling, window: Duration) -> Reading<f64> {
        let window_us = i64::try_from(window.as_micros()).unwrap_or(i64::MAX);
        let since = Utc::now()
            .timestamp_micros()
            .saturating_sub(window_us)
            .max(0) as u64;

        let samples = self.device.samples(sampling, since)?;
        mean(samples.iter().map(|sample| sample_value(&sample.value))).ok_or(SourceError::NoSamples)
    }
}

fn sample_value(value: &SampleValue) -> f64 {
    match *value {
        SampleValue::F64(v) => v,
        SampleValue::U32(v) => v as f64,
        SampleValue::U64(v) => v as f64,
        SampleValue::I64(v) => v as f64,
    }
}

impl DeviceReader for NvmlDevice<'_> {
    #[cfg(target_os = "linux")]
    fn minor_number(&self) -> Reading<u32> {
        Ok(self.device.minor_number()?)
    }

    // Minor numbers are a Linux device-node concept; elsewhere the index stands in.
    #[cfg(not(target_os = "linux"))]
    fn minor_number(&self) -> Reading<u32> {
        Ok(self.device.index()?)
    }

    fn uuid(&self) -> Reading<String> {
        Ok(self.device.uuid()?)
    }

    fn name(&self) -> Reading<String> {
        Ok(self.device.name()?)
    }

    fn temperature(&self) -> Reading<u32> {
        Ok(self.device.temperature(TemperatureSensor::Gpu)?)
    }

    fn power_usage(&self) -> Reading<u32> {
        Ok(self.device.power_usage()?)
    }

    fn average_power_usage(&self, window: Duration) -> Reading<f64> {
        self.average(Sampling::Power, window)
    }

    fn power_management_limit(&self) -> Reading<u32> {
        Ok(self.device.power_management_limit()?)
    }

    fn enforced_power_limit(&self) -> Reading<u32> {
        Ok(self.device.enforced_power_limit()?)
    }

    fn fan_speed(&self) -> Reading<u32> {
        Ok(self.device.fan_speed(0)?)
    }

    fn memory_info(&self) -> Reading<MemoryUsage> {
        let info = self.device.memory_info()?;
        Ok(MemoryUsage {
            total: info.total,
            used: info.used,
        })
    }

    fn utilization_rates(&self) -> Reading<UtilizationRates> {
        let rates = self.device.utilization_rates()?;
        Ok(UtilizationRates {
            gpu: rates.gpu,
            memory: rates.memory,
        })
    }

    fn average_gpu_utilization(&self, window: Duration) -> Reading<f64> {
        self.average(Sampling::GpuUtilization, window)
    }

    fn encoder_utilization(&self) -> Reading<u32> {
        Ok(self.device.encoder_utilization()?.utilization)
    }

    fn decoder_utilization(&self) -> Reading<u32> {
        Ok(self.device.decoder_utilization()?.utilization)
    }

    fn clock(&self, domain: ClockDomain) -> Reading<u32> {
        let clock = match domain {
            ClockDomain::Graphics => Clock::Graphics,
            ClockDomain::Sm => Clock::SM,
            ClockDomain::Memory => Clock::Memory,
        };
        Ok(self.device.clock_info(clock)?)
    }

    fn pcie_link_generation(&self) -> Reading<u32> {
        Ok(self.device.current_pcie_link_gen()?)
    }

    fn pcie_link_width(&self) -> Reading<u32> {
        Ok(self.device.current_pcie_link_width()?)
    }

    fn pcie_throughput(&self, direction: PcieDirection) -> Reading<u32> {
        let counter = match direction {
            PcieDirection::Tx => PcieUtilCounter::Send,
            PcieDirection::Rx => PcieUtilCounter::Receive,
        };
        Ok(self.device.pcie_throughput(counter)?)
    }
}
