use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use nvidia_gpu_exporter::{server, source, App, Args};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("nvidia_gpu_exporter=info")),
        )
        .init();

    if let Err(err) = run(args).await {
        error!("{:#}", err);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "starting nvidia-gpu-exporter");

    let app = Arc::new(build_app(&args)?);
    let config = args.server_config();

    server::serve(app, &config, shutdown_signal())
        .await
        .with_context(|| format!("failed to serve on {}", config.listen_address))?;

    info!("shut down");
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn build_app(args: &Args) -> Result<App> {
    let nvml = source::NvmlSource::init().context(
        "couldn't initialize NVML; make sure libnvidia-ml is in the shared library search path",
    )?;
    source::log_inventory(&nvml);

    App::new(nvml, args.collector_options()).context("failed to register GPU collector")
}

#[cfg(target_os = "macos")]
fn build_app(_args: &Args) -> Result<App> {
    anyhow::bail!("NVML is not available on macOS")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
