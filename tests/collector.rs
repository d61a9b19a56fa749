use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;

use nvidia_gpu_exporter::source::mock::{Accessor, Call, MockGpu};
use nvidia_gpu_exporter::source::MockSource;
use nvidia_gpu_exporter::{CollectorOptions, GpuCollector, MetricKey};

fn collector(source: &MockSource) -> GpuCollector<MockSource> {
    GpuCollector::new(source.clone(), CollectorOptions::default())
}

fn labels(gpu: &MockGpu) -> [String; 3] {
    [gpu.minor_number.to_string(), gpu.uuid.clone(), gpu.name.clone()]
}

fn label_refs(labels: &[String; 3]) -> [&str; 3] {
    [labels[0].as_str(), labels[1].as_str(), labels[2].as_str()]
}

#[test]
fn test_device_count_matches_enumeration() {
    for n in [0u32, 1, 3, 8] {
        let gpus = (0..n).map(MockGpu::new).collect();
        let sweep = collector(&MockSource::new(gpus)).collect();

        assert_eq!(sweep.metric(MetricKey::DeviceCount).count(), 1);
        assert_eq!(sweep.get(MetricKey::DeviceCount, &[]), Some(f64::from(n)));
        assert_eq!(sweep.metric(MetricKey::Info).count(), n as usize);
    }
}

#[test]
fn test_healthy_and_failed_handle() {
    let mut gpu = MockGpu::new(0);
    gpu.temperature = 65;
    gpu.power_usage_mw = 120_000;
    let device0 = labels(&gpu);
    let broken = MockGpu::new(1).missing();
    let device1_uuid = broken.uuid.clone();

    let sweep = collector(&MockSource::new(vec![gpu, broken])).collect();

    assert!(sweep.is_healthy());
    assert_eq!(sweep.get(MetricKey::DeviceCount, &[]), Some(2.0));
    assert_eq!(
        sweep.get(MetricKey::Temperature, &label_refs(&device0)),
        Some(65.0)
    );
    assert_eq!(
        sweep.get(MetricKey::PowerUsage, &label_refs(&device0)),
        Some(120.0)
    );
    assert!(!sweep.mentions(&device1_uuid));
}

#[test]
fn test_enumeration_failure() {
    let source = MockSource::new(vec![MockGpu::new(0)]);
    source.set_enumeration_failure(true);
    let sweep = collector(&source).collect();

    assert!(!sweep.is_healthy());
    assert_eq!(sweep.get(MetricKey::Up, &[]), Some(0.0));
    assert_eq!(sweep.get(MetricKey::DeviceCount, &[]), None);
    assert_eq!(sweep.len(), 1);
}

#[test]
fn test_identity_failure_removes_device() {
    for accessor in [Accessor::MinorNumber, Accessor::Uuid, Accessor::Name] {
        let bad = MockGpu::new(1).failing(accessor);
        let bad_uuid = bad.uuid.clone();
        let sweep = collector(&MockSource::new(vec![MockGpu::new(0), bad])).collect();

        assert!(!sweep.mentions(&bad_uuid), "{:?}", accessor);
        assert_eq!(sweep.metric(MetricKey::Info).count(), 1);
        assert_eq!(sweep.metric(MetricKey::Temperature).count(), 1);
    }
}

#[test]
fn test_metric_failure_is_isolated() {
    let healthy = MockSource::new(vec![MockGpu::new(0), MockGpu::new(1)]);
    let baseline = collector(&healthy).collect();

    let gpu1 = MockGpu::new(1).failing(Accessor::Temperature);
    let gpu1_labels = labels(&gpu1);
    let degraded = collector(&MockSource::new(vec![MockGpu::new(0), gpu1])).collect();

    assert_eq!(
        degraded.get(MetricKey::Temperature, &label_refs(&gpu1_labels)),
        None
    );

    let expected: Vec<_> = baseline
        .samples()
        .filter(|s| !(s.metric == MetricKey::Temperature && s.labels[..] == gpu1_labels[..]))
        .collect();
    let actual: Vec<_> = degraded.samples().collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_consecutive_sweeps_are_identical() {
    let source = MockSource::new(vec![MockGpu::new(0), MockGpu::new(1)]);
    let collector = collector(&source);

    let first = collector.collect();
    let second = collector.collect();
    assert_eq!(first, second);
}

#[test]
fn test_removed_device_leaves_no_ghost() {
    let source = MockSource::new(vec![MockGpu::new(0), MockGpu::new(1)]);
    let gone_uuid = MockGpu::new(1).uuid;
    let collector = collector(&source);

    assert!(collector.collect().mentions(&gone_uuid));

    source.set_gpus(vec![MockGpu::new(0)]);
    let sweep = collector.collect();
    assert!(!sweep.mentions(&gone_uuid));
    assert_eq!(sweep.get(MetricKey::DeviceCount, &[]), Some(1.0));
}

#[test]
fn test_fan_speed_disabled() {
    let source = MockSource::new(vec![MockGpu::new(0), MockGpu::new(1)]);
    let options = CollectorOptions {
        fan_speed: false,
        ..CollectorOptions::default()
    };
    let sweep = GpuCollector::new(source.clone(), options).collect();

    assert!(!source.was_called(Accessor::FanSpeed));
    assert_eq!(sweep.metric(MetricKey::FanSpeed).count(), 0);
    assert_eq!(sweep.metric(MetricKey::Temperature).count(), 2);
}

#[test]
fn test_concurrent_sweeps_do_not_interleave() {
    let source = MockSource::new(vec![MockGpu::new(0), MockGpu::new(1)]);
    let collector = Arc::new(collector(&source));

    collector.collect();
    let single = source.calls();
    source.clear_calls();
    source.set_enumeration_delay(Duration::from_millis(50));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let collector = Arc::clone(&collector);
            thread::spawn(move || collector.collect())
        })
        .collect();
    let sweeps: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(sweeps[0], sweeps[1]);

    let calls = source.calls();
    assert_eq!(calls.len(), single.len() * 2);
    assert_eq!(calls[..single.len()].to_vec(), single);
    assert_eq!(calls[single.len()..].to_vec(), single);
    assert_eq!(
        calls.iter().filter(|call| **call == Call::DeviceCount).count(),
        2
    );
}
