//! Shared record bookkeeping and the generic concurrent table.
//!
//! Every protocol record embeds a [`Seen`] block (count + first/last/send
//! timestamps) and implements [`Record`]. [`RecordTable`] is a `DashMap`
//! keyed by the protocol key; it implements the common create-or-merge
//! contract and the evict-and-emit sweep, so the protocol modules only supply
//! their merge rule and line format.

use std::borrow::Cow;
use std::hash::Hash;

use chrono::{Local, SecondsFormat, TimeZone};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Observation bookkeeping shared by all records (epoch seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seen {
    pub count: u64,
    pub first_time: i64,
    pub last_time: i64,
    /// Last emission, 0 until the record is first reported.
    pub send_time: i64,
}

impl Seen {
    pub fn new(now: i64) -> Self {
        Self {
            count: 1,
            first_time: now,
            last_time: now,
            send_time: 0,
        }
    }

    /// Merge one more observation.
    pub fn touch(&mut self, now: i64) {
        self.count += 1;
        // Clock steps backwards must not break first <= last.
        self.last_time = now.max(self.first_time);
    }
}

/// A table entry that can be swept and rendered.
pub trait Record {
    fn seen(&self) -> &Seen;
    fn seen_mut(&mut self) -> &mut Seen;

    /// One telemetry line for this record.
    fn render(&self) -> String;

    /// Whether the record carries enough data to be emitted.
    fn reportable(&self) -> bool {
        true
    }
}

/// Minimum spacing between emissions and maximum idle time (seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPolicy {
    pub send_interval: i64,
    pub retention: i64,
}

impl ReportPolicy {
    pub fn window(&self, now: i64) -> SweepWindow {
        SweepWindow {
            now,
            send_threshold: now - self.send_interval,
            retain_threshold: now - self.retention,
        }
    }
}

/// Thresholds for one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepWindow {
    pub now: i64,
    pub send_threshold: i64,
    pub retain_threshold: i64,
}

/// Concurrent table of records keyed by `K`.
pub struct RecordTable<K, V> {
    map: DashMap<K, V>,
}

impl<K, V> RecordTable<K, V>
where
    K: Eq + Hash,
    V: Record,
{
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }

    /// Create the record with `create` or merge into the existing one with `merge`.
    ///
    /// `merge` runs after the common `count`/`last_time` update.
    pub fn observe(
        &self,
        key: K,
        now: i64,
        create: impl FnOnce() -> V,
        merge: impl FnOnce(&mut V),
    ) {
        match self.map.entry(key) {
            Entry::Occupied(mut e) => {
                let rec = e.get_mut();
                rec.seen_mut().touch(now);
                merge(rec);
            }
            Entry::Vacant(e) => {
                e.insert(create());
            }
        }
    }

    /// Mutate an existing record without counting an observation.
    pub fn update_existing(&self, key: &K, f: impl FnOnce(&mut V)) -> bool {
        match self.map.get_mut(key) {
            Some(mut rec) => {
                f(rec.value_mut());
                true
            }
            None => false,
        }
    }

    /// Evict expired records and render the ones due for emission.
    ///
    /// A record whose `last_time` is before the retention threshold is removed
    /// and never rendered. Rendered records get `send_time = now`.
    pub fn sweep(&self, window: &SweepWindow, out: &mut Vec<String>) {
        self.map.retain(|_, rec| {
            if rec.seen().last_time < window.retain_threshold {
                return false;
            }
            if rec.seen().send_time < window.send_threshold && rec.reportable() {
                out.push(rec.render());
                rec.seen_mut().send_time = window.now;
            }
            true
        });
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Run `f` against the record for `key`, if any.
    pub fn with<R>(&self, key: &K, f: impl FnOnce(&V) -> R) -> Option<R> {
        self.map.get(key).map(|rec| f(rec.value()))
    }
}

impl<K, V> Default for RecordTable<K, V>
where
    K: Eq + Hash,
    V: Record,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Current wall-clock time in epoch seconds.
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Percent-encode the bytes that would break a `key=value,...` line.
///
/// `%`, `,`, `=` and control characters are encoded; everything else is kept.
pub fn escape_value(value: &str) -> Cow<'_, str> {
    let needs_escape = |c: char| matches!(c, '%' | ',' | '=') || c.is_control();
    if !value.contains(needs_escape) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        if needs_escape(c) {
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{b:02X}"));
            }
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Render epoch seconds as RFC 3339 in local time.
pub fn format_time(secs: i64) -> String {
    match Local.timestamp_opt(secs, 0).single() {
        Some(t) => t.to_rfc3339_opts(SecondsFormat::Secs, false),
        None => secs.to_string(),
    }
}
