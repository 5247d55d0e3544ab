//! Centralized runtime constants and process settings.
//!
//! Tunable intervals and sizes are collected here so they can be found and
//! adjusted in a single place. `Settings` is the flag layer; every flag can be
//! overridden with a `TWPCAP_`-prefixed environment variable.

use std::path::PathBuf;

use clap::Parser;

use crate::error::SensorError;

/// Interval at which the stats line is emitted and a report sweep is attempted (seconds).
pub const STATS_INTERVAL_SECS: u64 = 60;

/// Default minimum time between two emissions of the same record (seconds).
pub const DEFAULT_SEND_INTERVAL_SECS: i64 = 600;

/// Default idle time after which a record is evicted (seconds).
pub const DEFAULT_RETENTION_SECS: i64 = 3600;

/// Capacity of the outbound telemetry queue (lines).
pub const SINK_QUEUE_CAPACITY: usize = 2000;

/// Port used when a destination is given without one.
pub const DEFAULT_SYSLOG_PORT: u16 = 514;

/// Syslog tag attached to every message.
pub const SYSLOG_TAG: &str = "twpcap";

/// Syslog priority: facility local5 (21) << 3 | severity info (6).
pub const SYSLOG_PRIORITY: u8 = (21 << 3) | 6;

/// Capture snapshot length (bytes).
pub const CAPTURE_SNAPLEN: i32 = 65535;

/// Capture read timeout, so the capture thread can observe shutdown (milliseconds).
pub const CAPTURE_READ_TIMEOUT_MS: i32 = 1000;

/// Delay between submitting the quit line and stopping capture (seconds).
pub const QUIT_FLUSH_SECS: u64 = 1;

/// Upper bound on flushing queued lines to syslog at shutdown (seconds).
pub const SHUTDOWN_GRACE_SECS: u64 = 2;

/// Process settings, from flags or `TWPCAP_*` environment variables.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Passive network sensor reporting to syslog")]
pub struct Settings {
    /// Syslog destination list (host[:port], comma separated).
    #[arg(long, env = "TWPCAP_SYSLOG", default_value = "")]
    pub syslog: String,

    /// Monitor interface.
    #[arg(long, env = "TWPCAP_IFACE", default_value = "")]
    pub iface: String,

    /// Syslog send interval (sec).
    #[arg(long, env = "TWPCAP_INTERVAL", default_value_t = DEFAULT_SEND_INTERVAL_SECS)]
    pub interval: i64,

    /// Data retention time (sec).
    #[arg(long, env = "TWPCAP_RETENTION", default_value_t = DEFAULT_RETENTION_SECS)]
    pub retention: i64,

    /// List interfaces and exit.
    #[arg(long, env = "TWPCAP_LIST", default_value_t = false)]
    pub list: bool,

    /// Write a CPU usage snapshot to this file at shutdown.
    #[arg(long, env = "TWPCAP_CPUPROFILE")]
    pub cpuprofile: Option<PathBuf>,

    /// Write a memory usage snapshot to this file at shutdown.
    #[arg(long, env = "TWPCAP_MEMPROFILE")]
    pub memprofile: Option<PathBuf>,
}

impl Settings {
    /// Check the settings needed to run the sensor (not needed for `--list`).
    pub fn validate(&self) -> Result<(), SensorError> {
        if self.iface.trim().is_empty() {
            return Err(SensorError::Config("no monitor interface".into()));
        }
        if self.destinations().is_empty() {
            return Err(SensorError::Config("no syslog destination".into()));
        }
        if self.interval <= 0 {
            return Err(SensorError::Config(format!(
                "send interval must be positive, got {}",
                self.interval
            )));
        }
        if self.retention <= 0 {
            return Err(SensorError::Config(format!(
                "retention must be positive, got {}",
                self.retention
            )));
        }
        Ok(())
    }

    /// Destination list with the default port applied, in `host:port` form.
    pub fn destinations(&self) -> Vec<String> {
        self.syslog
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(with_default_port)
            .collect()
    }
}

/// Append the default syslog port unless the destination already carries one.
///
/// Bare IPv6 literals are bracketed; `[v6]:port` and `host:port` are kept.
pub fn with_default_port(dst: &str) -> String {
    if dst.parse::<std::net::SocketAddr>().is_ok() {
        return dst.to_string();
    }
    if let Ok(std::net::IpAddr::V6(v6)) = dst.parse::<std::net::IpAddr>() {
        return format!("[{v6}]:{DEFAULT_SYSLOG_PORT}");
    }
    match dst.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => dst.to_string(),
        _ => format!("{dst}:{DEFAULT_SYSLOG_PORT}"),
    }
}
