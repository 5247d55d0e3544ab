//! EtherType histogram.
//!
//! A plain per-report-cycle counter with no per-key timestamps and no
//! retention. Every sweep emits one line and drains the table.

use dashmap::DashMap;

/// Frame counts per EtherType since the last report.
#[derive(Default)]
pub struct EtherTypeHistogram {
    counts: DashMap<u16, u64>,
}

impl EtherTypeHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, ether_type: u16) {
        *self.counts.entry(ether_type).or_insert(0) += 1;
    }

    pub fn get(&self, ether_type: u16) -> u64 {
        self.counts.get(&ether_type).map(|c| *c).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Render the aggregate line and clear the histogram.
    ///
    /// Entries are removed one key at a time, so an increment racing with the
    /// drain lands either in this line or in a fresh entry for the next one.
    pub fn drain_line(&self) -> String {
        let mut keys: Vec<u16> = self.counts.iter().map(|e| *e.key()).collect();
        keys.sort_unstable();

        let mut line = String::from("type=EtherType");
        for key in keys {
            if let Some((t, c)) = self.counts.remove(&key) {
                line.push_str(&format!(",0x{t:04x}={c}"));
            }
        }
        line
    }
}
