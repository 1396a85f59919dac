//! Minimal metrics registry for the game server.
//!
//! Counters and gauges with dynamic labels backed by `DashMap`. Label sets are
//! flattened into sorted key vectors so rendering order is deterministic.

use std::fmt::Write;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use dashmap::DashMap;

type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn render_labels(key: &LabelKey) -> String {
    if key.is_empty() {
        return String::new();
    }
    let inner = key
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", escape_label(v)))
        .collect::<Vec<_>>()
        .join(",");
    format!("{{{inner}}}")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Current value for one label set (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} counter");
        for r in self.map.iter() {
            let val = r.value().load(Ordering::Relaxed);
            let _ = writeln!(out, "{name}{} {val}", render_labels(r.key()));
        }
    }
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<LabelKey, AtomicI64>,
}

impl GaugeVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }
    pub fn dec(&self, labels: &[(&str, &str)]) {
        self.add(labels, -1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: i64) {
        self.map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicI64::new(0))
            .fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> i64 {
        self.map
            .get(&label_key(labels))
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} gauge");
        for r in self.map.iter() {
            let val = r.value().load(Ordering::Relaxed);
            let _ = writeln!(out, "{name}{} {val}", render_labels(r.key()));
        }
    }
}

#[derive(Default)]
pub struct GameMetrics {
    pub rooms_created: CounterVec,
    pub rooms_active: GaugeVec,
    /// kind = new | observer | overflow | reconnect_id | reconnect_name
    pub joins: CounterVec,
    /// reason = not_found | busy | timeout | rejected | invalid
    pub join_failures: CounterVec,
    /// stage = target stage
    pub stage_transitions: CounterVec,
    /// kind = broadcast | unicast
    pub dropped_messages: CounterVec,
    pub ws_connections: GaugeVec,
    draining: AtomicBool,
}

impl GameMetrics {
    pub fn set_draining(&self) {
        self.draining.store(true, Ordering::Relaxed);
    }
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Relaxed)
    }

    /// Prometheus text exposition of every metric.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.rooms_created.render("undercover_rooms_created_total", &mut out);
        self.rooms_active.render("undercover_rooms_active", &mut out);
        self.joins.render("undercover_joins_total", &mut out);
        self.join_failures.render("undercover_join_failures_total", &mut out);
        self.stage_transitions.render("undercover_stage_transitions_total", &mut out);
        self.dropped_messages.render("undercover_dropped_messages_total", &mut out);
        self.ws_connections.render("undercover_ws_connections", &mut out);
        let _ = writeln!(
            out,
            "# TYPE undercover_draining gauge\nundercover_draining {}",
            u8::from(self.is_draining())
        );
        out
    }
}
