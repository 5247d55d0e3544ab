//! libpcap capture backend.
//!
//! The handle is opened with a short read timeout so the loop can observe the
//! shutdown flag even on an idle link.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pcap::{Activated, Active, Capture, Linktype};

use crate::config::{CAPTURE_READ_TIMEOUT_MS, CAPTURE_SNAPLEN};
use crate::core::record::now_secs;
use crate::core::Engine;
use crate::error::SensorError;

/// Open `iface` for promiscuous live capture.
pub fn open_live(iface: &str) -> Result<Capture<Active>, SensorError> {
    let capture = Capture::from_device(iface)?
        .promisc(true)
        .snaplen(CAPTURE_SNAPLEN)
        .timeout(CAPTURE_READ_TIMEOUT_MS)
        .open()
        .map_err(|e| SensorError::Capture(format!("cannot open {iface}: {e}")))?;

    let link = capture.get_datalink();
    if link != Linktype::ETHERNET {
        tracing::warn!(
            "{iface} link type is {}, expected Ethernet; frames may not decode",
            link.get_name().unwrap_or_else(|_| link.0.to_string())
        );
    }
    Ok(capture)
}

/// Feed every captured frame to `engine` until `shutdown` is set or the
/// source runs dry.
///
/// Returns the number of frames read.
pub fn run_capture_loop<T: Activated + ?Sized>(
    capture: &mut Capture<T>,
    engine: &Engine,
    shutdown: &AtomicBool,
) -> Result<u64, SensorError> {
    let mut frames = 0u64;
    while !shutdown.load(Ordering::Relaxed) {
        match capture.next_packet() {
            Ok(packet) => {
                frames += 1;
                engine.process_frame(packet.data, now_secs());
            }
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(pcap::Error::NoMorePackets) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(frames)
}

/// Thread body: run the loop and log how it ended.
pub(crate) fn capture_thread(
    mut capture: Capture<Active>,
    engine: Arc<Engine>,
    shutdown: Arc<AtomicBool>,
) {
    match run_capture_loop(&mut capture, &engine, &shutdown) {
        Ok(frames) => tracing::info!(frames, "Capture loop stopped"),
        Err(e) => tracing::error!("Capture loop exited: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::IpAddr;

    use super::*;
    use crate::frame::test_frames::{self, CLIENT_MAC, SERVER_MAC};
    use crate::frame::MacAddr;

    /// Write a classic little-endian pcap file holding `frames`.
    fn write_pcap(frames: &[Vec<u8>]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut header = Vec::new();
        header.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
        header.extend_from_slice(&2u16.to_le_bytes());
        header.extend_from_slice(&4u16.to_le_bytes());
        header.extend_from_slice(&0i32.to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes());
        header.extend_from_slice(&65535u32.to_le_bytes());
        header.extend_from_slice(&1u32.to_le_bytes());
        file.write_all(&header).unwrap();
        for (i, frame) in frames.iter().enumerate() {
            let mut rec = Vec::new();
            rec.extend_from_slice(&(1_700_000_000u32 + i as u32).to_le_bytes());
            rec.extend_from_slice(&0u32.to_le_bytes());
            rec.extend_from_slice(&(frame.len() as u32).to_le_bytes());
            rec.extend_from_slice(&(frame.len() as u32).to_le_bytes());
            rec.extend_from_slice(frame);
            file.write_all(&rec).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_loop_feeds_engine_until_end_of_file() {
        let file = write_pcap(&[
            test_frames::arp_reply(CLIENT_MAC, [10, 0, 0, 2]),
            test_frames::arp_reply(SERVER_MAC, [10, 0, 0, 2]),
            vec![0u8; 6],
        ]);
        let mut capture = Capture::from_file(file.path()).unwrap();
        let engine = Engine::new();
        let shutdown = AtomicBool::new(false);

        let frames = run_capture_loop(&mut capture, &engine, &shutdown).unwrap();
        assert_eq!(frames, 3);
        assert_eq!(engine.packet_count(), 3);
        assert_eq!(engine.ether_types.get(0x0806), 2);

        let ip: IpAddr = "10.0.0.2".parse().unwrap();
        let rec = engine.addresses.get(&ip).unwrap();
        assert_eq!(rec.mac, MacAddr(SERVER_MAC));
        assert_eq!(rec.change, 1);
    }

    #[test]
    fn test_loop_honours_shutdown_flag() {
        let file = write_pcap(&[test_frames::arp_reply(CLIENT_MAC, [10, 0, 0, 2])]);
        let mut capture = Capture::from_file(file.path()).unwrap();
        let engine = Engine::new();
        let shutdown = AtomicBool::new(true);

        assert_eq!(run_capture_loop(&mut capture, &engine, &shutdown).unwrap(), 0);
        assert_eq!(engine.packet_count(), 0);
    }

    #[test]
    fn test_open_missing_interface_fails() {
        let err = open_live("twpcap-no-such-if0").err().unwrap();
        assert_eq!(err.kind(), "Capture");
    }
}
