//! Command line flags and the settings derived from them.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use clap::Parser;

/// Driver-side averaging window used when none is configured.
pub const DEFAULT_AVERAGE_WINDOW: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(
    name = "nvidia-gpu-exporter",
    about = "Prometheus exporter for NVIDIA GPU telemetry",
    version
)]
pub struct Args {
    /// Address to listen on for the web interface and telemetry.
    #[arg(
        long = "web.listen-address",
        default_value = ":9445",
        env = "NVIDIA_GPU_EXPORTER_LISTEN",
        value_parser = parse_listen_address
    )]
    pub listen_address: SocketAddr,

    /// Path under which to expose metrics.
    #[arg(
        long = "web.telemetry-path",
        default_value = "/metrics",
        env = "NVIDIA_GPU_EXPORTER_TELEMETRY_PATH"
    )]
    pub telemetry_path: String,

    /// Disable the fan speed metric (fanless boards may error or stall on the read).
    #[arg(long = "disable-fanspeed")]
    pub disable_fan_speed: bool,

    /// Disable the power limit metrics.
    #[arg(long)]
    pub disable_power_limit: bool,

    /// Disable the averaged power usage metric.
    #[arg(long)]
    pub disable_average_power: bool,

    /// Window in seconds for driver-side averaged metrics.
    #[arg(long, default_value_t = DEFAULT_AVERAGE_WINDOW.as_secs(), value_parser = clap::value_parser!(u64).range(1..))]
    pub average_window: u64,
}

impl Args {
    pub fn collector_options(&self) -> CollectorOptions {
        CollectorOptions {
            fan_speed: !self.disable_fan_speed,
            power_limit: !self.disable_power_limit,
            average_power: !self.disable_average_power,
            average_window: Duration::from_secs(self.average_window),
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            listen_address: self.listen_address,
            telemetry_path: normalize_path(&self.telemetry_path),
        }
    }
}

/// Which optional metric groups a sweep reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorOptions {
    pub fan_speed: bool,
    pub power_limit: bool,
    pub average_power: bool,
    pub average_window: Duration,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            fan_speed: true,
            power_limit: true,
            average_power: true,
            average_window: DEFAULT_AVERAGE_WINDOW,
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen_address: SocketAddr,
    pub telemetry_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from(([0, 0, 0, 0], 9445)),
            telemetry_path: "/metrics".into(),
        }
    }
}

/// Accepts `host:port` plus the host-less `:port` form, which binds every
/// IPv4 interface.
fn parse_listen_address(value: &str) -> Result<SocketAddr, String> {
    let value = value.trim();
    let value = match value.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => value.to_string(),
    };
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Ok(addr);
    }
    value
        .to_socket_addrs()
        .map_err(|err| format!("invalid listen address {:?}: {}", value, err))?
        .next()
        .ok_or_else(|| format!("listen address {:?} resolved to nothing", value))
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
