//! Static catalog of every metric the exporter can publish.

use crate::config::CollectorOptions;

/// Prefix shared by every exported metric name.
pub const NAMESPACE: &str = "nvidia_gpu";

/// Identifies one metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricKey {
    Up,
    DriverInfo,
    DeviceCount,
    Info,
    Temperature,
    PowerUsage,
    PowerUsageAverage,
    PowerLimit,
    EnforcedPowerLimit,
    FanSpeed,
    MemoryTotal,
    MemoryUsed,
    UtilizationGpu,
    UtilizationMemory,
    UtilizationGpuAverage,
    UtilizationEncoder,
    UtilizationDecoder,
    DutyCycle,
    AvgDutyCycle,
    ClockGraphics,
    ClockSm,
    ClockMemory,
    PcieLinkGeneration,
    PcieLinkWidth,
    PcieTx,
    PcieRx,
}

impl MetricKey {
    pub fn definition(self) -> &'static MetricDefinition {
        // CATALOG is ordered like the enum.
        &CATALOG[self as usize]
    }
}

/// Unit a metric is published in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Celsius,
    Watts,
    Bytes,
    BytesPerSecond,
    Percent,
    Hertz,
    Count,
    Boolean,
    Info,
}

impl Unit {
    /// Name suffix for the unit, following the Prometheus base-unit naming.
    /// Dimensionless units carry none.
    pub fn suffix(self) -> Option<&'static str> {
        match self {
            Unit::Celsius => Some("celsius"),
            Unit::Watts => Some("watts"),
            Unit::Bytes => Some("bytes"),
            Unit::BytesPerSecond => Some("bytes_per_second"),
            Unit::Percent => Some("percent"),
            Unit::Hertz => Some("hertz"),
            Unit::Count | Unit::Boolean | Unit::Info => None,
        }
    }
}

/// Label names attached to a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSet {
    None,
    Driver,
    DeviceInfo,
    Device,
}

impl LabelSet {
    pub fn names(self) -> &'static [&'static str] {
        match self {
            LabelSet::None => &[],
            LabelSet::Driver => &["version"],
            LabelSet::DeviceInfo => &["index", "minor_number", "uuid", "name"],
            LabelSet::Device => &["minor_number", "uuid", "name"],
        }
    }
}

/// Configuration switch a metric depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Always,
    FanSpeed,
    PowerLimit,
    AveragePower,
}

impl Gate {
    pub fn is_open(self, options: &CollectorOptions) -> bool {
        match self {
            Gate::Always => true,
            Gate::FanSpeed => options.fan_speed,
            Gate::PowerLimit => options.power_limit,
            Gate::AveragePower => options.average_power,
        }
    }
}

/// Static description of one metric family.
#[derive(Debug, PartialEq, Eq)]
pub struct MetricDefinition {
    pub key: MetricKey,
    /// Name without the namespace prefix or the unit suffix.
    pub name: &'static str,
    pub unit: Unit,
    pub help: &'static str,
    pub labels: LabelSet,
    pub gate: Gate,
}

impl MetricDefinition {
    /// Fully qualified name, e.g. `nvidia_gpu_temperature_celsius`.
    pub fn full_name(&self) -> String {
        match self.unit.suffix() {
            Some(suffix) => format!("{}_{}_{}", NAMESPACE, self.name, suffix),
            None => format!("{}_{}", NAMESPACE, self.name),
        }
    }

    pub fn label_names(&self) -> &'static [&'static str] {
        self.labels.names()
    }
}

const fn def(
    key: MetricKey,
    name: &'static str,
    unit: Unit,
    labels: LabelSet,
    gate: Gate,
    help: &'static str,
) -> MetricDefinition {
    MetricDefinition {
        key,
        name,
        unit,
        help,
        labels,
        gate,
    }
}

use LabelSet::{Device, DeviceInfo, Driver};
use MetricKey as K;

#[rustfmt::skip]
static CATALOG: [MetricDefinition; 26] = [
    def(K::Up, "up", Unit::Boolean, LabelSet::None, Gate::Always,
        "NVML metric collection operational"),
    def(K::DriverInfo, "driver_info", Unit::Info, Driver, Gate::Always,
        "NVIDIA driver version as reported by NVML"),
    def(K::DeviceCount, "device_count", Unit::Count, LabelSet::None, Gate::Always,
        "Count of found NVIDIA devices"),
    def(K::Info, "info", Unit::Info, DeviceInfo, Gate::Always,
        "Identity as reported by the device"),
    def(K::Temperature, "temperature", Unit::Celsius, Device, Gate::Always,
        "GPU core temperature as reported by the device"),
    def(K::PowerUsage, "power_usage", Unit::Watts, Device, Gate::Always,
        "Power usage of the board as reported by the device"),
    def(K::PowerUsageAverage, "power_usage_average", Unit::Watts, Device, Gate::AveragePower,
        "Power usage as reported by the device averaged over the sampling window"),
    def(K::PowerLimit, "power_limit", Unit::Watts, Device, Gate::PowerLimit,
        "Power management limit configured on the device"),
    def(K::EnforcedPowerLimit, "enforced_power_limit", Unit::Watts, Device, Gate::PowerLimit,
        "Power limit currently enforced by the driver"),
    def(K::FanSpeed, "fanspeed", Unit::Percent, Device, Gate::FanSpeed,
        "Intended fan speed as reported by the device"),
    def(K::MemoryTotal, "memory_total", Unit::Bytes, Device, Gate::Always,
        "Total memory as reported by the device"),
    def(K::MemoryUsed, "memory_used", Unit::Bytes, Device, Gate::Always,
        "Used memory as reported by the device"),
    def(K::UtilizationGpu, "utilization_gpu", Unit::Percent, Device, Gate::Always,
        "GPU utilization as reported by the device"),
    def(K::UtilizationMemory, "utilization_memory", Unit::Percent, Device, Gate::Always,
        "Memory utilization as reported by the device"),
    def(K::UtilizationGpuAverage, "utilization_gpu_average", Unit::Percent, Device, Gate::Always,
        "GPU utilization as reported by the device averaged over the sampling window"),
    def(K::UtilizationEncoder, "utilization_encoder", Unit::Percent, Device, Gate::Always,
        "Percent of time over the last sample period during which the video encoder was used"),
    def(K::UtilizationDecoder, "utilization_decoder", Unit::Percent, Device, Gate::Always,
        "Percent of time over the last sample period during which the video decoder was used"),
    def(K::DutyCycle, "duty_cycle", Unit::Percent, Device, Gate::Always,
        "Percent of time over the past sample period during which one or more kernels were executing"),
    def(K::AvgDutyCycle, "avg_duty_cycle", Unit::Percent, Device, Gate::Always,
        "Average time over the sampling window during which one or more kernels were executing"),
    def(K::ClockGraphics, "clock_graphics", Unit::Hertz, Device, Gate::Always,
        "Current graphics clock"),
    def(K::ClockSm, "clock_sm", Unit::Hertz, Device, Gate::Always,
        "Current streaming multiprocessor clock"),
    def(K::ClockMemory, "clock_memory", Unit::Hertz, Device, Gate::Always,
        "Current memory clock"),
    def(K::PcieLinkGeneration, "pcie_link_generation", Unit::Count, Device, Gate::Always,
        "Current PCIe link generation"),
    def(K::PcieLinkWidth, "pcie_link_width", Unit::Count, Device, Gate::Always,
        "Current PCIe link width in lanes"),
    def(K::PcieTx, "pcie_tx", Unit::BytesPerSecond, Device, Gate::Always,
        "PCIe transmit throughput over the last sample period"),
    def(K::PcieRx, "pcie_rx", Unit::BytesPerSecond, Device, Gate::Always,
        "PCIe receive throughput over the last sample period"),
];

/// Definitions enabled by `options`, in catalog order.
pub fn catalog(options: &CollectorOptions) -> Vec<&'static MetricDefinition> {
    CATALOG
        .iter()
        .filter(|definition| definition.gate.is_open(options))
        .collect()
}
