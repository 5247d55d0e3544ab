//! Resource-usage snapshots for `--cpuprofile` / `--memprofile`.
//!
//! Output files are created at startup so a bad path fails early; the JSON
//! snapshots are written at shutdown.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sysinfo::System;

use crate::error::SensorError;

/// CPU usage of the sensor process.
#[derive(Debug, Clone, Serialize)]
pub struct CpuProfile {
    pub pid: u32,
    pub captured_at: String,
    pub run_time_secs: u64,
    pub cpu_usage_percent: f32,
    pub packets: u64,
}

/// Memory usage of the sensor process and host.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryProfile {
    pub pid: u32,
    pub captured_at: String,
    pub resident_bytes: u64,
    pub virtual_bytes: u64,
    pub host_total_bytes: u64,
    pub host_used_bytes: u64,
}

/// One sysinfo reading of the current process.
#[derive(Debug, Clone)]
pub struct ProcessSample {
    pub pid: u32,
    pub cpu_usage: f32,
    pub run_time: u64,
    pub resident: u64,
    pub virtual_memory: u64,
    pub host_total: u64,
    pub host_used: u64,
}

impl ProcessSample {
    /// Sample the current process. Blocks for sysinfo's minimum CPU interval.
    pub fn current() -> Result<Self, SensorError> {
        let pid = sysinfo::get_current_pid().map_err(|e| SensorError::Io(e.to_string()))?;
        let mut sys = System::new_all();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_all();
        let process = sys
            .process(pid)
            .ok_or_else(|| SensorError::Io(format!("process {pid} not found")))?;
        Ok(Self {
            pid: pid.as_u32(),
            cpu_usage: process.cpu_usage(),
            run_time: process.run_time(),
            resident: process.memory(),
            virtual_memory: process.virtual_memory(),
            host_total: sys.total_memory(),
            host_used: sys.used_memory(),
        })
    }

    pub fn cpu_profile(&self, packets: u64, captured_at: &str) -> CpuProfile {
        CpuProfile {
            pid: self.pid,
            captured_at: captured_at.to_string(),
            run_time_secs: self.run_time,
            cpu_usage_percent: self.cpu_usage,
            packets,
        }
    }

    pub fn memory_profile(&self, captured_at: &str) -> MemoryProfile {
        MemoryProfile {
            pid: self.pid,
            captured_at: captured_at.to_string(),
            resident_bytes: self.resident,
            virtual_bytes: self.virtual_memory,
            host_total_bytes: self.host_total,
            host_used_bytes: self.host_used,
        }
    }
}

struct Output {
    path: PathBuf,
    file: File,
}

impl Output {
    fn create(path: &Path, what: &str) -> Result<Self, SensorError> {
        let file = File::create(path).map_err(|e| {
            SensorError::Io(format!("could not create {what} profile {}: {e}", path.display()))
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    fn write_json<T: Serialize>(self, value: &T) -> Result<(), SensorError> {
        let mut out = BufWriter::new(self.file);
        serde_json::to_writer_pretty(&mut out, value)?;
        out.write_all(b"\n")?;
        out.flush()?;
        tracing::info!("Profile written to {}", self.path.display());
        Ok(())
    }
}

/// Profiling files opened at startup.
#[derive(Default)]
pub struct ProfileOutputs {
    cpu: Option<Output>,
    mem: Option<Output>,
}

impl ProfileOutputs {
    /// Create the requested output files.
    pub fn open(cpu: Option<&Path>, mem: Option<&Path>) -> Result<Self, SensorError> {
        Ok(Self {
            cpu: cpu.map(|p| Output::create(p, "CPU")).transpose()?,
            mem: mem.map(|p| Output::create(p, "memory")).transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.cpu.is_none() && self.mem.is_none()
    }

    /// Write both snapshots from one sample.
    pub fn write(self, sample: &ProcessSample, packets: u64) -> Result<(), SensorError> {
        let captured_at = chrono::Local::now().to_rfc3339();
        if let Some(cpu) = self.cpu {
            cpu.write_json(&sample.cpu_profile(packets, &captured_at))?;
        }
        if let Some(mem) = self.mem {
            mem.write_json(&sample.memory_profile(&captured_at))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProcessSample {
        ProcessSample {
            pid: 42,
            cpu_usage: 1.5,
            run_time: 30,
            resident: 4096,
            virtual_memory: 8192,
            host_total: 1 << 30,
            host_used: 1 << 29,
        }
    }

    #[test]
    fn test_write_both_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let cpu_path = dir.path().join("cpu.json");
        let mem_path = dir.path().join("mem.json");
        let outputs = ProfileOutputs::open(Some(&cpu_path), Some(&mem_path)).unwrap();
        assert!(!outputs.is_empty());
        outputs.write(&sample(), 1234).unwrap();

        let cpu: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&cpu_path).unwrap()).unwrap();
        assert_eq!(cpu["pid"], 42);
        assert_eq!(cpu["packets"], 1234);
        assert_eq!(cpu["run_time_secs"], 30);

        let mem: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&mem_path).unwrap()).unwrap();
        assert_eq!(mem["resident_bytes"], 4096);
        assert_eq!(mem["virtual_bytes"], 8192);
    }

    #[test]
    fn test_no_outputs_requested() {
        let outputs = ProfileOutputs::open(None, None).unwrap();
        assert!(outputs.is_empty());
        outputs.write(&sample(), 0).unwrap();
    }

    #[test]
    fn test_unwritable_path_fails_at_open() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("missing-dir").join("cpu.json");
        let err = ProfileOutputs::open(Some(&bad), None).err().unwrap();
        assert_eq!(err.kind(), "Io");
        assert!(err.to_string().contains("could not create CPU profile"));
    }

    #[test]
    fn test_sample_current_process() {
        let sample = ProcessSample::current().unwrap();
        assert_eq!(sample.pid, std::process::id());
        assert!(sample.host_total > 0);
    }
}
