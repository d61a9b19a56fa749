//! Unit conversions from driver units to exposition units.

/// Convert milliwatts to watts.
pub fn milliwatts_to_watts(milliwatts: f64) -> f64 {
    milliwatts / 1000.0
}

/// Convert megahertz to hertz.
pub fn megahertz_to_hertz(megahertz: u32) -> f64 {
    f64::from(megahertz) * 1_000_000.0
}

/// Convert KB/s (as NVML reports PCIe throughput) to bytes per second.
pub fn kilobytes_to_bytes(kilobytes: u32) -> f64 {
    f64::from(kilobytes) * 1024.0
}

/// Arithmetic mean, or `None` for an empty sequence.
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
