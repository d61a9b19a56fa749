//! Bridges sweeps into the `prometheus` registry.
//!
//! Each metric family is backed by a gauge (unlabeled) or a gauge vector
//! keyed by its label set. On every scrape the vectors are reset, refilled
//! from a fresh sweep and collected, so a series only appears if the current
//! sweep produced it.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, GaugeVec, Opts};
use tracing::warn;

use crate::collector::GpuCollector;
use crate::metrics::MetricKey;
use crate::source::TelemetrySource;
use crate::types::Sweep;

enum Family {
    Single(Gauge),
    Labeled(GaugeVec),
}

impl Family {
    fn desc(&self) -> Vec<&Desc> {
        match self {
            Family::Single(gauge) => gauge.desc(),
            Family::Labeled(vec) => vec.desc(),
        }
    }

    fn collect(&self) -> Vec<MetricFamily> {
        match self {
            Family::Single(gauge) => gauge.collect(),
            Family::Labeled(vec) => vec.collect(),
        }
    }
}

/// Registry-facing collector wrapping a [`GpuCollector`].
pub struct GpuMetricsCollector<S> {
    collector: GpuCollector<S>,
    descs: Vec<Desc>,
    families: Mutex<BTreeMap<MetricKey, Family>>,
}

impl<S: TelemetrySource> GpuMetricsCollector<S> {
    /// Build one gauge family per described metric.
    pub fn new(collector: GpuCollector<S>) -> prometheus::Result<Self> {
        let mut families = BTreeMap::new();
        let mut descs = Vec::new();

        for definition in collector.describe() {
            let opts = Opts::new(definition.full_name(), definition.help);
            let family = if definition.label_names().is_empty() {
                Family::Single(Gauge::with_opts(opts)?)
            } else {
                Family::Labeled(GaugeVec::new(opts, definition.label_names())?)
            };
            descs.extend(family.desc().into_iter().cloned());
            families.insert(definition.key, family);
        }

        Ok(Self {
            collector,
            descs,
            families: Mutex::new(families),
        })
    }
}

/// Replace every family's contents with the samples of `sweep`.
fn repopulate(families: &BTreeMap<MetricKey, Family>, sweep: &Sweep) {
    for family in families.values() {
        if let Family::Labeled(vec) = family {
            vec.reset();
        }
    }

    for sample in sweep.samples() {
        match families.get(&sample.metric) {
            Some(Family::Single(gauge)) => gauge.set(sample.value),
            Some(Family::Labeled(vec)) => {
                let values: Vec<&str> = sample.labels.iter().map(String::as_str).collect();
                match vec.get_metric_with_label_values(&values) {
                    Ok(gauge) => gauge.set(sample.value),
                    Err(err) => warn!(
                        metric = sample.metric.definition().name,
                        error = %err,
                        "dropping sample with mismatched labels"
                    ),
                }
            }
            None => {}
        }
    }
}

impl<S: TelemetrySource + 'static> Collector for GpuMetricsCollector<S> {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        // Held across the sweep so concurrent scrapes cannot interleave
        // reset and refill.
        let families = self.families.lock();
        let sweep = self.collector.collect();
        repopulate(&families, &sweep);

        families
            .iter()
            .filter(|(key, family)| match family {
                // Unlabeled gauges keep their last value; only emit them
                // when this sweep produced one.
                Family::Single(_) => sweep.get(**key, &[]).is_some(),
                Family::Labeled(_) => true,
            })
            .flat_map(|(_, family)| family.collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectorOptions;
    use crate::source::mock::MockGpu;
    use crate::source::MockSource;

    fn family<'a>(families: &'a [MetricFamily], name: &str) -> Option<&'a MetricFamily> {
        families.iter().find(|family| family.get_name() == name)
    }

    #[test]
    fn test_descs_cover_catalog() {
        let collector = GpuCollector::new(MockSource::new(Vec::new()), CollectorOptions::default());
        let expected = collector.describe().len();
        let metrics = GpuMetricsCollector::new(collector).unwrap();
        assert_eq!(metrics.desc().len(), expected);
    }

    #[test]
    fn test_device_count_hidden_when_unhealthy() {
        let source = MockSource::new(vec![MockGpu::new(0)]);
        let metrics = GpuMetricsCollector::new(GpuCollector::new(
            source.clone(),
            CollectorOptions::default(),
        ))
        .unwrap();

        let healthy = metrics.collect();
        assert!(family(&healthy, "nvidia_gpu_device_count").is_some());

        source.set_enumeration_failure(true);
        let unhealthy = metrics.collect();
        assert!(family(&unhealthy, "nvidia_gpu_device_count").is_none());
        let up = family(&unhealthy, "nvidia_gpu_up").unwrap();
        assert_eq!(up.get_metric()[0].get_gauge().get_value(), 0.0);
        let temperature = family(&unhealthy, "nvidia_gpu_temperature_celsius").unwrap();
        assert!(temperature.get_metric().is_empty());
    }
}
