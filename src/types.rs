//! Data types shared by the collector, the catalog and the exposition layer.

use std::collections::BTreeMap;

use crate::metrics::MetricKey;

/// Identity of a GPU discovered during one sweep.
///
/// Re-derived on every sweep; nothing here survives across scrapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub index: u32,
    pub minor_number: u32,
    pub uuid: String,
    pub name: String,
}

impl Device {
    /// Label values for per-device metrics: `minor_number`, `uuid`, `name`.
    pub fn labels(&self) -> Vec<String> {
        vec![
            self.minor_number.to_string(),
            self.uuid.clone(),
            self.name.clone(),
        ]
    }

    /// Label values for `nvidia_gpu_info`: `index`, `minor_number`, `uuid`, `name`.
    pub fn info_labels(&self) -> Vec<String> {
        vec![
            self.index.to_string(),
            self.minor_number.to_string(),
            self.uuid.clone(),
            self.name.clone(),
        ]
    }
}

/// Result of one best-effort accessor call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation {
    Present(f64),
    Absent,
}

impl Observation {
    pub fn value(self) -> Option<f64> {
        match self {
            Observation::Present(value) => Some(value),
            Observation::Absent => None,
        }
    }

    pub fn is_present(self) -> bool {
        matches!(self, Observation::Present(_))
    }
}

impl From<Option<f64>> for Observation {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Observation::Absent, Observation::Present)
    }
}

/// Key of one exposed series: metric plus label values in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesKey {
    pub metric: MetricKey,
    pub labels: Vec<String>,
}

/// One emitted observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub metric: MetricKey,
    pub labels: Vec<String>,
    pub value: f64,
}

/// Outcome of device enumeration for a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Up,
    Down,
}

/// Every sample gathered by one sweep.
///
/// Samples are keyed by series so that a (metric, device) pair appears at
/// most once. A new `Sweep` is built for every scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    health: Health,
    series: BTreeMap<SeriesKey, f64>,
}

impl Sweep {
    pub(crate) fn healthy() -> Self {
        let mut sweep = Self {
            health: Health::Up,
            series: BTreeMap::new(),
        };
        sweep.record(MetricKey::Up, Vec::new(), 1.0);
        sweep
    }

    pub(crate) fn unhealthy() -> Self {
        let mut sweep = Self {
            health: Health::Down,
            series: BTreeMap::new(),
        };
        sweep.record(MetricKey::Up, Vec::new(), 0.0);
        sweep
    }

    pub(crate) fn record(&mut self, metric: MetricKey, labels: Vec<String>, value: f64) {
        self.series.insert(SeriesKey { metric, labels }, value);
    }

    pub fn is_healthy(&self) -> bool {
        self.health == Health::Up
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Value of a series, if it was emitted.
    pub fn get(&self, metric: MetricKey, labels: &[&str]) -> Option<f64> {
        let key = SeriesKey {
            metric,
            labels: labels.iter().map(|label| label.to_string()).collect(),
        };
        self.series.get(&key).copied()
    }

    /// Samples of a single metric.
    pub fn metric(&self, metric: MetricKey) -> impl Iterator<Item = Sample> + '_ {
        self.samples().filter(move |sample| sample.metric == metric)
    }

    /// All samples, grouped by metric.
    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.series.iter().map(|(key, value)| Sample {
            metric: key.metric,
            labels: key.labels.clone(),
            value: *value,
        })
    }

    /// True when any sample carries the given label value.
    pub fn mentions(&self, label_value: &str) -> bool {
        self.series
            .keys()
            .any(|key| key.labels.iter().any(|label| label == label_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_from_option() {
        assert_eq!(Observation::from(Some(3.0)), Observation::Present(3.0));
        assert_eq!(Observation::from(None), Observation::Absent);
        assert!(!Observation::Absent.is_present());
        assert_eq!(Observation::Absent.value(), None);
    }

    #[test]
    fn test_sweep_keeps_one_sample_per_series() {
        let mut sweep = Sweep::healthy();
        let labels = vec!["0".to_string(), "GPU-a".to_string(), "Tesla".to_string()];
        sweep.record(MetricKey::Temperature, labels.clone(), 60.0);
        sweep.record(MetricKey::Temperature, labels, 61.0);

        assert_eq!(sweep.metric(MetricKey::Temperature).count(), 1);
        assert_eq!(
            sweep.get(MetricKey::Temperature, &["0", "GPU-a", "Tesla"]),
            Some(61.0)
        );
    }

    #[test]
    fn test_unhealthy_sweep_only_reports_up() {
        let sweep = Sweep::unhealthy();
        assert!(!sweep.is_healthy());
        assert_eq!(sweep.len(), 1);
        assert_eq!(sweep.get(MetricKey::Up, &[]), Some(0.0));
    }

    #[test]
    fn test_device_labels() {
        let device = Device {
            index: 1,
            minor_number: 3,
            uuid: "GPU-b".into(),
            name: "A100".into(),
        };
        assert_eq!(device.labels(), vec!["3", "GPU-b", "A100"]);
        assert_eq!(device.info_labels(), vec!["1", "3", "GPU-b", "A100"]);
    }
}
