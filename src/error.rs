//! Unified error type for the sensor.
//!
//! `SensorError` covers every failure the sensor reports to its caller. Startup
//! code wraps it in `anyhow` with context; the engine itself never fails on a
//! malformed packet (decoders return `None` instead).

/// Sensor-level error.
///
/// Each variant maps to a distinct failure domain.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// Missing or invalid configuration (flags / environment).
    #[error("{0}")]
    Config(String),

    /// Errors from the live capture source (pcap).
    #[error("{0}")]
    Capture(String),

    /// The telemetry queue or a syslog destination failed.
    #[error("{0}")]
    Sink(String),

    /// I/O and OS-level errors (profiling files, sockets).
    #[error("{0}")]
    Io(String),
}

impl SensorError {
    /// Returns the error kind as a string matching the variant name.
    pub fn kind(&self) -> &'static str {
        match self {
            SensorError::Config(_) => "Config",
            SensorError::Capture(_) => "Capture",
            SensorError::Sink(_) => "Sink",
            SensorError::Io(_) => "Io",
        }
    }
}

// ---- From implementations for ergonomic error conversion ----

impl From<std::io::Error> for SensorError {
    fn from(err: std::io::Error) -> Self {
        SensorError::Io(err.to_string())
    }
}

impl From<pcap::Error> for SensorError {
    fn from(err: pcap::Error) -> Self {
        SensorError::Capture(err.to_string())
    }
}

impl From<serde_json::Error> for SensorError {
    fn from(err: serde_json::Error) -> Self {
        SensorError::Io(err.to_string())
    }
}
