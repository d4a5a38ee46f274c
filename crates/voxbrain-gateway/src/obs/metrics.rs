//! Minimal metrics registry for the brain.
//!
//! Counter/gauge/histogram types with dynamic labels backed by `DashMap`.
//! Labels are flattened into sorted key vectors to keep deterministic
//! ordering. Histogram buckets are fixed in milliseconds (queue-delay scale).

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// Dotted internal names become Prometheus-safe on export.
fn export_name(name: &str) -> String {
    name.replace('.', "_")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<Vec<(String, String)>, AtomicU64>,
}

impl CounterVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let mut key: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        key.sort();

        let counter = self.map.entry(key).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for a label set (used by tests and close accounting).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        let mut key: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        key.sort();
        self.map
            .get(&key)
            .map(|c| c.value().load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, name: &str, out: &mut String) {
        let name = export_name(name);
        let _ = writeln!(out, "# TYPE {} counter", name);
        for r in self.map.iter() {
            let key = r.key();
            let val = r.value().load(Ordering::Relaxed);
            let label_str = key
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                .collect::<Vec<_>>()
                .join(",");
            let _ = writeln!(out, "{}{{{}}} {}", name, label_str, val);
        }
    }
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<Vec<(String, String)>, AtomicI64>,
}

impl GaugeVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }
    /// Decrement by 1.
    pub fn dec(&self, labels: &[(&str, &str)]) {
        self.add(labels, -1);
    }

    /// Add an arbitrary signed delta.
    pub fn add(&self, labels: &[(&str, &str)], v: i64) {
        let mut key: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        key.sort();
        let gauge = self.map.entry(key).or_insert_with(|| AtomicI64::new(0));
        gauge.fetch_add(v, Ordering::Relaxed);
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, name: &str, out: &mut String) {
        let name = export_name(name);
        let _ = writeln!(out, "# TYPE {} gauge", name);
        for r in self.map.iter() {
            let key = r.key();
            let val = r.value().load(Ordering::Relaxed);
            let label_str = key
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                .collect::<Vec<_>>()
                .join(",");
            let _ = writeln!(out, "{}{{{}}} {}", name, label_str, val);
        }
    }
}

// Fixed buckets in milliseconds: queue-delay / write-latency scale.
const BUCKETS_MS: [u64; 9] = [1, 5, 10, 25, 50, 100, 250, 500, 1_000];

struct AtomicHistogram {
    count: AtomicU64,
    sum: AtomicU64,
    buckets: [AtomicU64; 9],
}

impl Default for AtomicHistogram {
    fn default() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            buckets: [
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
            ],
        }
    }
}

#[derive(Default)]
pub struct HistogramVec {
    map: DashMap<Vec<(String, String)>, AtomicHistogram>,
}

impl HistogramVec {
    /// Observe a duration and increment cumulative buckets (millisecond scale).
    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let mut key: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        key.sort();

        let hist = self.map.entry(key).or_insert_with(AtomicHistogram::default);
        let millis = duration.as_millis() as u64;

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum.fetch_add(millis, Ordering::Relaxed);

        for (i, &b) in BUCKETS_MS.iter().enumerate() {
            if millis <= b {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Render in Prometheus text exposition format (unit: milliseconds).
    fn render(&self, name: &str, out: &mut String) {
        let name = export_name(name);
        let _ = writeln!(out, "# TYPE {} histogram", name);
        for r in self.map.iter() {
            let key = r.key();
            let hist = r.value();

            let label_str = key
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                .collect::<Vec<_>>()
                .join(",");
            let prefix = if label_str.is_empty() {
                String::new()
            } else {
                format!("{},", label_str)
            };

            for (i, &le) in BUCKETS_MS.iter().enumerate() {
                let count = hist.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(out, "{}_bucket{{{}le=\"{}\"}} {}", name, prefix, le, count);
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, count);

            let sum = hist.sum.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_sum{{{}}} {}", name, label_str, sum);
            let _ = writeln!(out, "{}_count{{{}}} {}", name, label_str, count);
        }
    }
}

/// Process-global registry for the brain's counters.
///
/// Field names mirror the dotted metric names used throughout the session
/// code; `render` does the dot-to-underscore export.
#[derive(Default)]
pub struct BrainMetrics {
    pub ws_upgrades: CounterVec,
    pub ws_sessions_active: GaugeVec,
    pub inbound_frames: CounterVec,
    pub inbound_bad_schema: CounterVec,
    pub inbound_queue_evictions: CounterVec,
    pub outbound_queue_evictions: CounterVec,
    pub ws_write_timeout: CounterVec,
    pub stale_segment_dropped: CounterVec,
    pub stale_turn_dropped: CounterVec,
    pub turns_started: CounterVec,
    pub keepalive_write_attempt: CounterVec,
    pub keepalive_write_timeout: CounterVec,
    pub keepalive_missed_deadline: CounterVec,
    pub keepalive_queue_delay: HistogramVec,
    pub transcript_compactions: CounterVec,
    pub ws_close_reason: CounterVec,
}

impl BrainMetrics {
    /// Render all registered metrics.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.ws_upgrades.render("ws.upgrades_total", &mut out);
        self.ws_sessions_active.render("ws.sessions_active", &mut out);
        self.inbound_frames.render("inbound.frames_total", &mut out);
        self.inbound_bad_schema.render("inbound.bad_schema_total", &mut out);
        self.inbound_queue_evictions
            .render("inbound.queue_evictions_total", &mut out);
        self.outbound_queue_evictions
            .render("outbound.queue_evictions_total", &mut out);
        self.ws_write_timeout.render("ws.write_timeout_total", &mut out);
        self.stale_segment_dropped
            .render("stale_segment_dropped_total", &mut out);
        self.stale_turn_dropped.render("stale_turn_dropped_total", &mut out);
        self.turns_started.render("turns.started_total", &mut out);
        self.keepalive_write_attempt
            .render("keepalive.ping_pong_write_attempt_total", &mut out);
        self.keepalive_write_timeout
            .render("keepalive.ping_pong_write_timeout_total", &mut out);
        self.keepalive_missed_deadline
            .render("keepalive.ping_pong_missed_deadline_total", &mut out);
        self.keepalive_queue_delay
            .render("keepalive.ping_pong_queue_delay_ms", &mut out);
        self.transcript_compactions
            .render("memory.transcript_compactions_total", &mut out);
        self.ws_close_reason.render("ws_close_reason_total", &mut out);
        out
    }
}
