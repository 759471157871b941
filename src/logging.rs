//! Structured JSON-lines logging for the demo core.
//!
//! Every record carries the run id, a process-wide sequence number and an
//! RFC3339 timestamp, so a seeded session can be diffed against a replay.
//! Records go to `events.jsonl` (info and above) or `trace.jsonl`
//! (trace/debug) under `LOG_DIR/RUN_ID`, and are echoed on stderr.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use crate::batch::BatchOutcome;
use crate::params::ClinicalParameters;
use crate::scorer::LabelScore;

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
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            Ok("fatal") => Level::Fatal,
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
    Scorer,  // Label confidences
    Signal,  // Synthesizer ticks
    Batch,   // Simulated folder runs
    Session, // Workspace commands and phase changes
    System,  // Startup, shutdown
    Audit,   // Snapshot digests
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Scorer => "scorer",
            Domain::Signal => "signal",
            Domain::Batch => "batch",
            Domain::Session => "session",
            Domain::System => "system",
            Domain::Audit => "audit",
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
    trace: Option<Mutex<BufWriter<File>>>,
    echo: bool,
}

fn open_sink(path: PathBuf) -> Option<Mutex<BufWriter<File>>> {
    match File::create(&path) {
        Ok(f) => Some(Mutex::new(BufWriter::new(f))),
        Err(err) => {
            eprintln!("[log] failed to create {}: {}", path.display(), err);
            None
        }
    }
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let base = std::env::var("LOG_DIR").unwrap_or_else(|_| "out/runs".to_string());
        let echo = !matches!(std::env::var("LOG_ECHO").as_deref(), Ok("0") | Ok("false"));
        let mut run_dir = PathBuf::from(base);
        run_dir.push(&run_id);
        if let Err(err) = create_dir_all(&run_dir) {
            eprintln!("[log] failed to create run dir: {}", err);
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

        RunContext {
            events: open_sink(run_dir.join("events.jsonl")),
            trace: open_sink(run_dir.join("trace.jsonl")),
            run_id,
            echo,
        }
    })
}

fn write_line(writer: &Option<Mutex<BufWriter<File>>>, line: &str) {
    if let Some(Ok(mut w)) = writer.as_ref().map(|m| m.lock()) {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
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

pub fn run_id() -> String {
    ensure_run_context().run_id.clone()
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    emit_record(level, domain.as_str(), event, fields);
}

fn emit_record(level: Level, component: &str, event: &str, mut fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let msg = fields.remove("msg").unwrap_or(Value::String(String::new()));

    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    entry.insert("data".to_string(), Value::Object(fields));

    let line = Value::Object(entry).to_string();
    match level {
        Level::Trace | Level::Debug => write_line(&ctx.trace, &line),
        _ => write_line(&ctx.events, &line),
    }
    if ctx.echo {
        eprintln!("{}", line);
    }
}

// =============================================================================
// Domain helpers
// =============================================================================

pub fn log_scores(params: &ClinicalParameters, scores: &[LabelScore]) {
    let ranked: Vec<Value> = scores
        .iter()
        .map(|s| json!({"label": s.label.as_str(), "confidence": s.confidence}))
        .collect();
    log(
        Level::Debug,
        Domain::Scorer,
        "scores",
        obj(&[
            ("heart_rate", v_num(params.heart_rate)),
            ("qrs_duration", v_num(params.qrs_duration)),
            ("st_level", v_num(params.st_level)),
            ("pr_interval", v_num(params.pr_interval)),
            ("ranked", Value::Array(ranked)),
        ]),
    );
}

pub fn log_param_change(param: &str, raw: f64, applied: f64) {
    log(
        Level::Info,
        Domain::Session,
        "param_change",
        obj(&[
            ("param", v_str(param)),
            ("raw", v_num(raw)),
            ("applied", v_num(applied)),
        ]),
    );
}

pub fn log_phase(prev: &str, next: &str, reason: &str) {
    log(
        Level::Info,
        Domain::Session,
        "phase",
        obj(&[
            ("prev_state", v_str(prev)),
            ("new_state", v_str(next)),
            ("reason", v_str(reason)),
        ]),
    );
}

pub fn log_rejected(what: &str, reason: &str) {
    log(
        Level::Warn,
        Domain::Session,
        "rejected",
        obj(&[("what", v_str(what)), ("msg", v_str(reason))]),
    );
}

pub fn log_sample(tick: u64, value: f64, window: usize) {
    log(
        Level::Trace,
        Domain::Signal,
        "sample",
        obj(&[
            ("tick", json!(tick)),
            ("value", v_num(value)),
            ("window", json!(window)),
        ]),
    );
}

pub fn log_batch_item(index: usize, total: usize, bucket: &str, draw: f64) {
    log(
        Level::Debug,
        Domain::Batch,
        "item",
        obj(&[
            ("index", json!(index)),
            ("total", json!(total)),
            ("bucket", v_str(bucket)),
            ("draw", v_num(draw)),
        ]),
    );
}

pub fn log_batch_summary(status: &str, outcome: &BatchOutcome) {
    let counts: Map<String, Value> = outcome
        .bucket_counts
        .iter()
        .map(|(b, n)| (b.as_str().to_string(), json!(n)))
        .collect();
    log(
        Level::Info,
        Domain::Batch,
        "summary",
        obj(&[
            ("status", v_str(status)),
            ("total", json!(outcome.total)),
            ("processed", json!(outcome.processed)),
            ("bucket_counts", Value::Object(counts)),
        ]),
    );
}

pub fn log_digest(digest: &str, reason: &str) {
    log(
        Level::Info,
        Domain::Audit,
        "snapshot_digest",
        obj(&[("digest", v_str(digest)), ("reason", v_str(reason))]),
    );
}

/// Session summary on shutdown
pub fn log_session_summary(duration_ms: u64, param_changes: u64, batches: u64, samples: u64) {
    log(
        Level::Info,
        Domain::System,
        "session_summary",
        obj(&[
            ("duration_ms", json!(duration_ms)),
            ("param_changes", json!(param_changes)),
            ("batches", json!(batches)),
            ("samples", json!(samples)),
        ]),
    );
}

// =============================================================================
// Field helpers
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
