//! Metric catalog and per-device reads.

mod catalog;
mod gpu;

pub use catalog::{catalog, Gate, LabelSet, MetricDefinition, MetricKey, Unit, NAMESPACE};
pub use gpu::read_device;
