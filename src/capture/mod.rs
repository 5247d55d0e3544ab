//! Live packet capture.
//!
//! The capture handle is opened on the caller's thread so an open failure is
//! reported at startup; frames are then read and classified on a dedicated
//! OS thread (`pcap_backend`).

pub mod pcap_backend;

use std::fmt::Write as _;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::Engine;
use crate::error::SensorError;

/// Manages the background capture thread.
/// Implements Drop so the thread is told to stop on panic/exit.
pub struct CaptureEngine {
    shutdown: Arc<AtomicBool>,
    capture_thread: Option<std::thread::JoinHandle<()>>,
}

impl CaptureEngine {
    /// Open `iface` and start feeding its frames to `engine`.
    pub fn start(iface: &str, engine: Arc<Engine>) -> Result<Self, SensorError> {
        let capture = pcap_backend::open_live(iface)?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);

        let thread = std::thread::Builder::new()
            .name("pcap-capture".into())
            .spawn(move || pcap_backend::capture_thread(capture, engine, shutdown_clone))?;

        tracing::info!("CaptureEngine started on {iface}");
        Ok(Self {
            shutdown,
            capture_thread: Some(thread),
        })
    }

    /// Signal the capture thread and wait for it to exit.
    ///
    /// The read timeout bounds the wait to roughly one timeout period.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.capture_thread.take() {
            if thread.join().is_err() {
                tracing::error!("Capture thread panicked");
            }
        }
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        if self.capture_thread.is_some() {
            tracing::warn!("CaptureEngine dropped while running, signalling capture thread");
        }
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// One capture-capable interface, as listed by `--list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: String,
    pub description: Option<String>,
    /// (address, netmask) pairs.
    pub addresses: Vec<(IpAddr, Option<IpAddr>)>,
}

impl From<pcap::Device> for InterfaceInfo {
    fn from(dev: pcap::Device) -> Self {
        Self {
            name: dev.name,
            description: dev.desc,
            addresses: dev
                .addresses
                .into_iter()
                .map(|a| (a.addr, a.netmask))
                .collect(),
        }
    }
}

/// Enumerate the interfaces libpcap can open.
pub fn list_interfaces() -> Result<Vec<InterfaceInfo>, SensorError> {
    Ok(pcap::Device::list()?
        .into_iter()
        .map(InterfaceInfo::from)
        .collect())
}

/// Human-readable interface listing.
pub fn render_interfaces(interfaces: &[InterfaceInfo]) -> String {
    let mut out = String::from("Interface found:\n");
    for iface in interfaces {
        let _ = writeln!(out, "\nName: {}", iface.name);
        let _ = writeln!(
            out,
            "Description: {}",
            iface.description.as_deref().unwrap_or("")
        );
        let _ = writeln!(out, "addresses:");
        for (addr, mask) in &iface.addresses {
            let _ = writeln!(out, "- IP address: {addr}");
            match mask {
                Some(mask) => {
                    let _ = writeln!(out, "- Subnet mask: {mask}");
                }
                None => {
                    let _ = writeln!(out, "- Subnet mask: ");
                }
            }
        }
    }
    out
}
