//! Structured JSON-lines logging for export runs.
//!
//! Every line carries the run id, a sequence number, level, domain and
//! event name, plus a `data` object. Lines go to stderr because stdout
//! carries the exported table. When `LOG_DIR` is set, a run directory is
//! created with `events.jsonl` and a `manifest.json`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        Self::parse(std::env::var("LOG_LEVEL").as_deref().unwrap_or("info"))
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "trace" => Level::Trace,
            "debug" => Level::Debug,
            "warn" => Level::Warn,
            "error" => Level::Error,
            "fatal" => Level::Fatal,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Scan,    // Page retrieval from the record source
    Reduce,  // Event folding, taxonomy hits
    Export,  // Rendering and writing output
    System,  // Startup, config, shutdown
    Profile, // Timings
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Scan => "scan",
            Domain::Reduce => "reduce",
            Domain::Export => "export",
            Domain::System => "system",
            Domain::Profile => "profile",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS: comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Option<Mutex<BufWriter<File>>>,
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let events = std::env::var("LOG_DIR")
            .ok()
            .and_then(|base| open_run_dir(&base, &run_id))
            .map(|f| Mutex::new(BufWriter::new(f)));
        RunContext { run_id, events }
    })
}

fn open_run_dir(base: &str, run_id: &str) -> Option<File> {
    let mut run_dir = PathBuf::from(base);
    run_dir.push(run_id);
    if let Err(err) = create_dir_all(&run_dir) {
        eprintln!("[log] failed to create run dir: {}", err);
        return None;
    }
    let _ = std::fs::write(
        run_dir.join("manifest.json"),
        json!({
            "run_id": run_id,
            "ts": ts_now(),
            "pid": process::id(),
            "log_dir": run_dir.to_string_lossy(),
        })
        .to_string(),
    );
    match File::create(run_dir.join("events.jsonl")) {
        Ok(f) => Some(f),
        Err(err) => {
            eprintln!("[log] failed to create events log: {}", err);
            None
        }
    }
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["session_id", "table", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    emit_record(level, domain.as_str(), event, fields);
}

pub fn format_record(
    run_id: &str,
    seq: u64,
    level: Level,
    component: &str,
    event: &str,
    fields: Map<String, Value>,
) -> Value {
    let (mut top, data) = split_fields(fields);
    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(run_id));
    entry.insert("seq".to_string(), json!(seq));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));
    Value::Object(entry)
}

fn emit_record(level: Level, component: &str, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let line = format_record(&ctx.run_id, next_seq(), level, component, event, fields).to_string();
    if let Some(writer) = &ctx.events {
        if let Ok(mut w) = writer.lock() {
            let _ = writeln!(w, "{}", line);
            let _ = w.flush();
        }
    }
    eprintln!("{}", line);
}

// =============================================================================
// Run logs
// =============================================================================

pub fn log_run_start(table: &str, region: &str, source: &str, from: &str, to: &str, page_size: usize) {
    log(
        Level::Info,
        Domain::System,
        "run_start",
        obj(&[
            ("table", v_str(table)),
            ("region", v_str(region)),
            ("source", v_str(source)),
            ("window_from", v_str(from)),
            ("window_to", v_str(to)),
            ("page_size", json!(page_size)),
        ]),
    );
}

pub fn log_run_summary(
    sessions: usize,
    records: u64,
    pages: u64,
    kinds: &[(&str, u64)],
    format: &str,
    sha256: &str,
) {
    let hist: Map<String, Value> = kinds
        .iter()
        .map(|(k, n)| (k.to_string(), json!(n)))
        .collect();

    log(
        Level::Info,
        Domain::Export,
        "run_summary",
        obj(&[
            ("sessions", json!(sessions)),
            ("records", json!(records)),
            ("pages", json!(pages)),
            ("kinds", Value::Object(hist)),
            ("format", v_str(format)),
            ("sha256", v_str(sha256)),
        ]),
    );
}

pub fn unknown_tag_fields(session_id: &str, tag: &str, page: u64) -> Map<String, Value> {
    obj(&[
        ("session_id", v_str(session_id)),
        ("tag", v_str(tag)),
        ("page", json!(page)),
    ])
}

pub fn log_unknown_tag(session_id: &str, tag: &str, page: u64) {
    log(Level::Error, Domain::Reduce, "unknown_tag", unknown_tag_fields(session_id, tag, page));
}

pub fn log_run_failed(err: &anyhow::Error) {
    log(
        Level::Fatal,
        Domain::System,
        "run_failed",
        obj(&[("msg", v_str(&format!("{:#}", err)))]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Profiling Scope
// =============================================================================

/// Profiling scope that emits structured timing on drop.
pub struct ProfileScope {
    label: &'static str,
    started: Instant,
}

impl ProfileScope {
    pub fn new(label: &'static str) -> Self {
        Self { label, started: Instant::now() }
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        log(
            Level::Trace,
            Domain::Profile,
            "profile",
            obj(&[("label", v_str(self.label)), ("elapsed_ms", v_num(elapsed_ms))]),
        );
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn test_level_parse_defaults_to_info() {
        assert_eq!(Level::parse("debug"), Level::Debug);
        assert_eq!(Level::parse("loud"), Level::Info);
    }

    #[test]
    fn test_obj_helper() {
        let m = obj(&[("key", v_str("value")), ("num", v_num(42.0))]);
        assert_eq!(m.get("key").unwrap(), "value");
        assert_eq!(m.get("num").unwrap(), 42.0);
    }

    #[test]
    fn test_record_lifts_top_fields() {
        let rec = format_record(
            "r-1",
            7,
            Level::Warn,
            "scan",
            "page_fetched",
            obj(&[("table", v_str("session")), ("records", json!(3)), ("msg", v_str("hi"))]),
        );
        assert_eq!(rec["lvl"], "WARN");
        assert_eq!(rec["seq"], 7);
        assert_eq!(rec["table"], "session");
        assert_eq!(rec["msg"], "hi");
        assert_eq!(rec["data"]["records"], 3);
        assert!(rec["data"].get("table").is_none());
    }

    #[test]
    fn test_unknown_tag_record() {
        let rec = format_record(
            "r-1",
            0,
            Level::Error,
            Domain::Reduce.as_str(),
            "unknown_tag",
            unknown_tag_fields("s1", "DOMAINEVENT#SomethingNew", 3),
        );
        assert_eq!(rec["component"], "reduce");
        assert_eq!(rec["session_id"], "s1");
        assert_eq!(rec["data"]["tag"], "DOMAINEVENT#SomethingNew");
        assert_eq!(rec["data"]["page"], 3);
    }

    #[test]
    fn test_seq_increments() {
        let s1 = next_seq();
        let s2 = next_seq();
        assert!(s2 > s1);
    }
}
