//! Periodic reporting: stats line, sweep and the single-flight scheduler.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::record::{now_secs, ReportPolicy};
use super::Engine;
use crate::config;
use crate::sink::TelemetrySink;

impl Engine {
    /// Evict expired records and render every line due at `now`.
    ///
    /// Order: IPToMAC, EtherType, DNS, NTP, DHCP, TLSFlow, RADIUS.
    pub fn sweep(&self, now: i64, policy: &ReportPolicy) -> Vec<String> {
        let window = policy.window(now);
        let mut lines = Vec::new();
        self.addresses.records().sweep(&window, &mut lines);
        lines.push(self.ether_types.drain_line());
        self.dns.records().sweep(&window, &mut lines);
        self.ntp.records().sweep(&window, &mut lines);
        self.dhcp.records().sweep(&window, &mut lines);
        self.tls.records().sweep(&window, &mut lines);
        self.radius.records().sweep(&window, &mut lines);
        lines
    }

    /// Render the stats line for an interval of `interval_packets` frames over `elapsed`.
    pub fn stats_line(&self, interval_packets: u64, elapsed: Duration) -> String {
        let secs = elapsed.as_secs_f64();
        let ps = if secs > 0.0 {
            interval_packets as f64 / secs
        } else {
            0.0
        };
        format!(
            "type=Stats,total={},count={},ps={:.2},iptomac={},dns={},ntp={},dhcp={},tls={},radius={}",
            self.packet_count(),
            interval_packets,
            ps,
            self.addresses.records().len(),
            self.dns.records().len(),
            self.ntp.records().len(),
            self.dhcp.records().len(),
            self.tls.records().len(),
            self.radius.records().len(),
        )
    }
}

/// Clears the busy flag when a sweep ends, including on panic.
struct SweepGuard<'a>(&'a AtomicBool);

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives the stats line and the sweep on a fixed tick.
pub struct ReportScheduler {
    engine: Arc<Engine>,
    sink: TelemetrySink,
    policy: ReportPolicy,
    busy: AtomicBool,
    last_total: AtomicU64,
}

impl ReportScheduler {
    pub fn new(engine: Arc<Engine>, sink: TelemetrySink, policy: ReportPolicy) -> Self {
        Self {
            engine,
            sink,
            policy,
            busy: AtomicBool::new(false),
            last_total: AtomicU64::new(0),
        }
    }

    fn try_begin_sweep(&self) -> Option<SweepGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SweepGuard(&self.busy))
    }

    /// Render the stats line for the interval that just ended.
    fn take_stats(&self, elapsed: Duration) -> String {
        let total = self.engine.packet_count();
        let previous = self.last_total.swap(total, Ordering::Relaxed);
        self.engine.stats_line(total.saturating_sub(previous), elapsed)
    }

    /// Queue the stats line for the interval that just ended, waiting for
    /// room in the queue.
    pub async fn emit_stats(&self, elapsed: Duration) {
        let line = self.take_stats(elapsed);
        tracing::debug!("{line}");
        if let Err(e) = self.sink.submit(line).await {
            tracing::warn!("Stats line dropped: {e}");
        }
    }

    /// Sweep at `now` and submit the lines in order.
    ///
    /// Returns `false` without doing anything if another sweep is running.
    pub async fn run_sweep(&self, now: i64) -> bool {
        let Some(_guard) = self.try_begin_sweep() else {
            tracing::warn!("Previous report still running, skipping this sweep");
            return false;
        };
        let lines = self.engine.sweep(now, &self.policy);
        let sent = lines.len();
        for line in lines {
            if let Err(e) = self.sink.submit(line).await {
                tracing::warn!("Report aborted: {e}");
                break;
            }
        }
        tracing::debug!(lines = sent, "Sweep complete");
        true
    }

    /// Spawn the report ticker. Each tick launches a task that submits the
    /// stats line and then sweeps, so a full queue never delays the next tick.
    pub fn start(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let period = Duration::from_secs(config::STATS_INTERVAL_SECS);
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            let mut last_tick = Instant::now();
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let elapsed = last_tick.elapsed();
                        last_tick = Instant::now();
                        let reporter = Arc::clone(&scheduler);
                        tokio::spawn(async move {
                            reporter.emit_stats(elapsed).await;
                            reporter.run_sweep(now_secs()).await;
                        });
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("Report scheduler stopped");
        })
    }
}
