use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// The structured fields emitted per decision. One of these is
/// serialized as a single JSON line per admission.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "trace.id")]
    pub trace_id: String,
    #[serde(rename = "agent.id")]
    pub agent_id: String,
    #[serde(rename = "tool.name")]
    pub tool_name: String,
    #[serde(rename = "tool.action")]
    pub tool_action: String,
    #[serde(rename = "decision.allow")]
    pub decision_allow: bool,
    pub reason: String,
    #[serde(rename = "policy.version")]
    pub policy_version: i64,
    #[serde(rename = "params.hash")]
    pub params_hash: String,
    #[serde(rename = "latency.ms")]
    pub latency_ms: f64,
    #[serde(rename = "parent.agent", skip_serializing_if = "Option::is_none")]
    pub parent_agent: Option<String>,
    #[serde(rename = "tool.latency.ms", skip_serializing_if = "Option::is_none")]
    pub tool_latency_ms: Option<f64>,
    #[serde(rename = "approval.id", skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<Uuid>,
}

/// Hex SHA-256 of `params` encoded with sorted keys and no whitespace,
/// so audit records are content-addressable without carrying raw
/// (possibly sensitive) parameters.
pub fn hash_params(params: &serde_json::Value) -> String {
    let canonical = canonicalize(params);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn canonicalize(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted: Vec<(&String, &serde_json::Value)> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let parts: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{}", serde_json::to_string(k).unwrap(), canonicalize(v)))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", parts.join(","))
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Consumed by the Admission Pipeline. The implementation must persist
/// the record and open the `policy.decision` tracing span (with a
/// nested `tool.call` span when a tool was actually invoked) — the
/// `tracing` calls live here rather than in the pipeline so a test
/// double can swap in a no-op sink without losing coverage of the
/// pipeline's own control flow.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &DecisionRecord);
}

/// Append-only JSONL log, one object per line, following the
/// `BufWriter` + line-per-append + explicit `flush` discipline without
/// any hash-chaining: audit-entry signing is explicitly out of scope
/// here, integrity is assumed on the filesystem.
pub struct JsonlAuditSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonlAuditSink {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(JsonlAuditSink {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, record: &DecisionRecord) {
        let span = tracing::info_span!(
            "policy.decision",
            agent.id = %record.agent_id,
            tool.name = %record.tool_name,
            tool.action = %record.tool_action,
            decision.allow = record.decision_allow,
            policy.version = record.policy_version,
            params.hash = %record.params_hash,
            latency.ms = record.latency_ms,
            parent.agent = record.parent_agent.as_deref().unwrap_or_default(),
        );
        let _enter = span.enter();

        if let Some(tool_latency_ms) = record.tool_latency_ms {
            let tool_span = tracing::info_span!(
                "tool.call",
                tool.name = %record.tool_name,
                tool.action = %record.tool_action,
                latency.ms = tool_latency_ms,
            );
            let _tool_enter = tool_span.enter();
        }

        match serde_json::to_string(record) {
            Ok(line) => {
                let mut writer = self.writer.lock().expect("audit log lock poisoned");
                if let Err(err) = writeln!(writer, "{line}") {
                    tracing::error!(error = %err, "failed to write audit record");
                } else if let Err(err) = writer.flush() {
                    tracing::error!(error = %err, "failed to flush audit log");
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize audit record");
            }
        }
    }
}

/// Test double: collects records in memory instead of writing a file.
#[derive(Default)]
pub struct InMemoryAuditSink {
    records: Mutex<Vec<DecisionRecord>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DecisionRecord> {
        self.records.lock().expect("audit lock poisoned").clone()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, record: &DecisionRecord) {
        self.records.lock().expect("audit lock poisoned").push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_stability_under_key_reordering() {
        let a = json!({"amount": 500, "currency": "USD"});
        let b = json!({"currency": "USD", "amount": 500});
        assert_eq!(hash_params(&a), hash_params(&b));
    }

    #[test]
    fn known_sha256_of_empty_object_inputs_differ_from_empty_string() {
        let empty_obj_hash = hash_params(&json!({}));
        let mut hasher = Sha256::new();
        hasher.update(b"");
        let empty_str_hash = format!("{:x}", hasher.finalize());
        assert_ne!(empty_obj_hash, empty_str_hash);
    }

    #[test]
    fn jsonl_sink_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = JsonlAuditSink::open(&path).unwrap();

        let record = DecisionRecord {
            timestamp: Utc::now(),
            trace_id: "0".repeat(32),
            agent_id: "a".to_string(),
            tool_name: "payments".to_string(),
            tool_action: "create".to_string(),
            decision_allow: true,
            reason: "Policy allows this action".to_string(),
            policy_version: 1,
            params_hash: hash_params(&json!({})),
            latency_ms: 1.23,
            parent_agent: None,
            tool_latency_ms: Some(4.56),
            approval_id: None,
        };
        sink.record(&record);
        sink.record(&record);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("\"tool.latency.ms\":4.56"));
    }
}
