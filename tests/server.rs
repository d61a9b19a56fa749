use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use nvidia_gpu_exporter::server::router;
use nvidia_gpu_exporter::source::mock::MockGpu;
use nvidia_gpu_exporter::source::MockSource;
use nvidia_gpu_exporter::{App, CollectorOptions};

async fn get(app: Arc<App>, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = router(app, "/metrics")
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

fn lines_for<'a>(body: &'a str, metric: &str) -> Vec<&'a str> {
    body.lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| {
            line.strip_prefix(metric)
                .is_some_and(|rest| rest.starts_with('{') || rest.starts_with(' '))
        })
        .collect()
}

#[tokio::test]
async fn test_scrape_returns_text_exposition() {
    let mut gpu = MockGpu::new(0);
    gpu.temperature = 65;
    gpu.power_usage_mw = 120_000;
    let app = Arc::new(App::new(MockSource::new(vec![gpu]), CollectorOptions::default()).unwrap());

    let (status, content_type, body) = get(app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/plain"));
    assert_eq!(lines_for(&body, "nvidia_gpu_up"), vec!["nvidia_gpu_up 1"]);
    assert_eq!(
        lines_for(&body, "nvidia_gpu_device_count"),
        vec!["nvidia_gpu_device_count 1"]
    );

    let temperature = lines_for(&body, "nvidia_gpu_temperature_celsius");
    assert_eq!(temperature.len(), 1);
    assert!(temperature[0].contains("minor_number=\"0\""));
    assert!(temperature[0].ends_with(" 65"));

    let power = lines_for(&body, "nvidia_gpu_power_usage_watts");
    assert_eq!(power.len(), 1);
    assert!(power[0].ends_with(" 120"));

    assert_eq!(
        lines_for(&body, "nvidia_gpu_driver_info"),
        vec!["nvidia_gpu_driver_info{version=\"550.54.15\"} 1"]
    );
}

#[tokio::test]
async fn test_enumeration_failure_still_answers_ok() {
    let source = MockSource::new(vec![MockGpu::new(0)]);
    source.set_enumeration_failure(true);
    let app = Arc::new(App::new(source, CollectorOptions::default()).unwrap());

    let (status, _, body) = get(app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(lines_for(&body, "nvidia_gpu_up"), vec!["nvidia_gpu_up 0"]);
    assert!(lines_for(&body, "nvidia_gpu_device_count").is_empty());
    assert!(lines_for(&body, "nvidia_gpu_temperature_celsius").is_empty());
}

#[tokio::test]
async fn test_unplugged_device_disappears_from_exposition() {
    let source = MockSource::new(vec![MockGpu::new(0), MockGpu::new(1)]);
    let gone_uuid = MockGpu::new(1).uuid;
    let app = Arc::new(App::new(source.clone(), CollectorOptions::default()).unwrap());

    let (_, _, before) = get(app.clone(), "/metrics").await;
    assert!(before.contains(&gone_uuid));
    assert_eq!(lines_for(&before, "nvidia_gpu_temperature_celsius").len(), 2);

    source.set_gpus(vec![MockGpu::new(0)]);
    let (_, _, after) = get(app, "/metrics").await;
    assert!(!after.contains(&gone_uuid));
    assert_eq!(lines_for(&after, "nvidia_gpu_temperature_celsius").len(), 1);
}

#[tokio::test]
async fn test_disabled_fan_speed_is_not_exposed() {
    let source = MockSource::new(vec![MockGpu::new(0)]);
    let options = CollectorOptions {
        fan_speed: false,
        ..CollectorOptions::default()
    };
    let app = Arc::new(App::new(source, options).unwrap());

    let (_, _, body) = get(app, "/metrics").await;
    assert!(!body.contains("nvidia_gpu_fanspeed_percent"));
}

#[tokio::test]
async fn test_landing_page_links_to_metrics() {
    let app = Arc::new(App::new(MockSource::new(Vec::new()), CollectorOptions::default()).unwrap());

    let (status, _, body) = get(app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("href=\"/metrics\""));
}
