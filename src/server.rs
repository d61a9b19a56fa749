//! HTTP scrape endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::app::{App, CONTENT_TYPE};
use crate::config::ServerConfig;

type SharedApp = Arc<App>;

/// Router serving metrics on `telemetry_path` and a landing page elsewhere.
pub fn router(app: SharedApp, telemetry_path: &str) -> Router {
    let landing = landing_page(telemetry_path);
    Router::new()
        .route(telemetry_path, get(handle_metrics))
        .fallback(move || async move { Html(landing) })
        .with_state(app)
}

/// Bind the listener and serve until `shutdown` resolves.
pub async fn serve(
    app: SharedApp,
    config: &ServerConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(config.listen_address).await?;
    info!(addr = %config.listen_address, path = %config.telemetry_path, "listening");

    axum::serve(listener, router(app, &config.telemetry_path))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn handle_metrics(State(app): State<SharedApp>) -> Response {
    let scrape = match tokio::task::spawn_blocking(move || app.scrape()).await {
        Ok(result) => result,
        Err(err) => Err(err.into()),
    };

    match scrape {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(err) => {
            error!(error = %err, "scrape failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("error gathering metrics: {}", err),
            )
                .into_response()
        }
    }
}

fn landing_page(telemetry_path: &str) -> String {
    format!(
        "<html>\n<head><title>NVIDIA GPU Exporter</title></head>\n<body>\n\
         <h1>NVIDIA GPU Exporter</h1>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n\
         </body>\n</html>\n",
        path = telemetry_path
    )
}
