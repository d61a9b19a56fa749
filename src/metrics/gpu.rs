//! Per-device attribute reads for one sweep.

use tracing::debug;

use crate::config::CollectorOptions;
use crate::error::SourceError;
use crate::metrics::MetricKey;
use crate::source::{ClockDomain, DeviceReader, PcieDirection, Reading};
use crate::types::Observation;
use crate::utils::{kilobytes_to_bytes, megahertz_to_hertz, milliwatts_to_watts};

/// Read every enabled telemetry attribute of `device`.
///
/// Each accessor is called once and independently; a failure only turns its
/// own observations into [`Observation::Absent`]. Gated accessors are not
/// called at all when their option is off.
pub fn read_device<D: DeviceReader>(
    device: &D,
    index: u32,
    options: &CollectorOptions,
) -> Vec<(MetricKey, Observation)> {
    let mut readings = Vec::with_capacity(24);
    let mut observe = |key: MetricKey, reading: Reading<f64>| {
        readings.push((key, observation(index, key, reading)));
    };

    observe(
        MetricKey::Temperature,
        device.temperature().map(f64::from),
    );
    observe(
        MetricKey::PowerUsage,
        device
            .power_usage()
            .map(|mw| milliwatts_to_watts(f64::from(mw))),
    );
    if options.average_power {
        observe(
            MetricKey::PowerUsageAverage,
            device
                .average_power_usage(options.average_window)
                .map(milliwatts_to_watts),
        );
    }
    if options.power_limit {
        observe(
            MetricKey::PowerLimit,
            device
                .power_management_limit()
                .map(|mw| milliwatts_to_watts(f64::from(mw))),
        );
        observe(
            MetricKey::EnforcedPowerLimit,
            device
                .enforced_power_limit()
                .map(|mw| milliwatts_to_watts(f64::from(mw))),
        );
    }
    if options.fan_speed {
        observe(MetricKey::FanSpeed, device.fan_speed().map(f64::from));
    }

    // One call feeds both memory series.
    let memory = device.memory_info();
    observe(
        MetricKey::MemoryTotal,
        split(&memory, |m| m.total as f64),
    );
    observe(MetricKey::MemoryUsed, split(&memory, |m| m.used as f64));

    // duty_cycle is an alias of utilization_gpu kept for existing dashboards.
    let utilization = device.utilization_rates();
    observe(
        MetricKey::UtilizationGpu,
        split(&utilization, |u| f64::from(u.gpu)),
    );
    observe(
        MetricKey::UtilizationMemory,
        split(&utilization, |u| f64::from(u.memory)),
    );
    observe(
        MetricKey::DutyCycle,
        split(&utilization, |u| f64::from(u.gpu)),
    );

    let average_utilization = device.average_gpu_utilization(options.average_window);
    observe(
        MetricKey::UtilizationGpuAverage,
        split(&average_utilization, |v| *v),
    );
    observe(
        MetricKey::AvgDutyCycle,
        split(&average_utilization, |v| *v),
    );

    observe(
        MetricKey::UtilizationEncoder,
        device.encoder_utilization().map(f64::from),
    );
    observe(
        MetricKey::UtilizationDecoder,
        device.decoder_utilization().map(f64::from),
    );

    for (key, domain) in [
        (MetricKey::ClockGraphics, ClockDomain::Graphics),
        (MetricKey::ClockSm, ClockDomain::Sm),
        (MetricKey::ClockMemory, ClockDomain::Memory),
    ] {
        observe(key, device.clock(domain).map(megahertz_to_hertz));
    }

    observe(
        MetricKey::PcieLinkGeneration,
        device.pcie_link_generation().map(f64::from),
    );
    observe(
        MetricKey::PcieLinkWidth,
        device.pcie_link_width().map(f64::from),
    );
    for (key, direction) in [
        (MetricKey::PcieTx, PcieDirection::Tx),
        (MetricKey::PcieRx, PcieDirection::Rx),
    ] {
        observe(
            key,
            device.pcie_throughput(direction).map(kilobytes_to_bytes),
        );
    }

    readings
}

/// Project one field out of a shared reading without consuming the error.
fn split<T>(reading: &Reading<T>, field: impl FnOnce(&T) -> f64) -> Reading<f64> {
    match reading {
        Ok(value) => Ok(field(value)),
        Err(err) => Err(SourceError::Unavailable(err.to_string())),
    }
}

fn observation(index: u32, key: MetricKey, reading: Reading<f64>) -> Observation {
    match reading {
        Ok(value) => Observation::Present(value),
        Err(err) => {
            debug!(
                index,
                metric = key.definition().name,
                error = %err,
                "metric unavailable"
            );
            Observation::Absent
        }
    }
}
