//! Telemetry delivery.
//!
//! - [`TelemetrySink`]: bounded queue every producer submits lines to
//! - [`SyslogForwarder`]: drains the queue and sends each line to every
//!   syslog destination over UDP

use std::net::SocketAddr;

use chrono::{DateTime, Local, SecondsFormat};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config;
use crate::error::SensorError;

/// Producer handle for the telemetry queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TelemetrySink {
    tx: mpsc::Sender<String>,
}

impl TelemetrySink {
    /// Create a sink and the receiver the forwarder drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue a line, waiting while the queue is full.
    pub async fn submit(&self, line: String) -> Result<(), SensorError> {
        self.tx
            .send(line)
            .await
            .map_err(|_| SensorError::Sink("telemetry queue closed".into()))
    }
}

/// Render one RFC 3164-style syslog message.
pub fn format_syslog(
    priority: u8,
    timestamp: &DateTime<Local>,
    hostname: &str,
    tag: &str,
    pid: u32,
    msg: &str,
) -> String {
    let nl = if msg.ends_with('\n') { "" } else { "\n" };
    format!(
        "<{priority}>{} {hostname} {tag}[{pid}]: {msg}{nl}",
        timestamp.to_rfc3339_opts(SecondsFormat::Secs, false)
    )
}

struct Destination {
    name: String,
    socket: UdpSocket,
}

/// Sends queued lines to every configured syslog destination.
pub struct SyslogForwarder {
    destinations: Vec<Destination>,
    hostname: String,
    pid: u32,
}

impl SyslogForwarder {
    /// Resolve and connect one UDP socket per `host:port` destination.
    ///
    /// Any resolution or socket failure is returned; the caller treats it as fatal.
    pub async fn connect(destinations: &[String]) -> Result<Self, SensorError> {
        let mut connected = Vec::with_capacity(destinations.len());
        for name in destinations {
            let addr = resolve(name).await?;
            let bind: SocketAddr = if addr.is_ipv4() {
                ([0, 0, 0, 0], 0).into()
            } else {
                ([0u16; 8], 0).into()
            };
            let socket = UdpSocket::bind(bind).await?;
            socket.connect(addr).await?;
            tracing::info!(destination = %name, %addr, "Syslog destination connected");
            connected.push(Destination {
                name: name.clone(),
                socket,
            });
        }
        let hostname = sysinfo::System::host_name().unwrap_or_else(|| "localhost".into());
        Ok(Self {
            destinations: connected,
            hostname,
            pid: std::process::id(),
        })
    }

    /// Destination names, in configuration order.
    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        self.destinations.iter().map(|d| d.name.as_str())
    }

    /// Send one line to every destination. Failures are logged and dropped.
    pub async fn send(&self, line: &str) {
        let msg = format_syslog(
            config::SYSLOG_PRIORITY,
            &Local::now(),
            &self.hostname,
            config::SYSLOG_TAG,
            self.pid,
            line,
        );
        for dst in &self.destinations {
            if let Err(e) = dst.socket.send(msg.as_bytes()).await {
                tracing::debug!(destination = %dst.name, "Syslog send failed: {e}");
            }
        }
    }

    /// Drain `rx` until `shutdown` flips to `true` or every sink is dropped.
    ///
    /// On shutdown the queue is closed and lines already in it are still
    /// sent, for at most `SHUTDOWN_GRACE_SECS`.
    pub fn spawn(
        self,
        mut rx: mpsc::Receiver<String>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    line = rx.recv() => match line {
                        Some(line) => self.send(&line).await,
                        None => break,
                    },
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            self.flush(&mut rx).await;
                            break;
                        }
                    }
                }
            }
            tracing::info!("Syslog forwarder stopped");
        })
    }

    async fn flush(&self, rx: &mut mpsc::Receiver<String>) {
        rx.close();
        let deadline = tokio::time::Instant::now()
            + std::time::Duration::from_secs(config::SHUTDOWN_GRACE_SECS);
        let mut flushed = 0usize;
        while let Ok(Some(line)) = tokio::time::timeout_at(deadline, rx.recv()).await {
            self.send(&line).await;
            flushed += 1;
        }
        if !rx.is_empty() {
            tracing::warn!(flushed, dropped = rx.len(), "Grace period ended with lines still queued");
        }
    }
}

async fn resolve(name: &str) -> Result<SocketAddr, SensorError> {
    let mut addrs = tokio::net::lookup_host(name)
        .await
        .map_err(|e| SensorError::Sink(format!("cannot resolve syslog destination {name}: {e}")))?;
    addrs
        .next()
        .ok_or_else(|| SensorError::Sink(format!("no address for syslog destination {name}")))
}
