use std::fs;
use std::sync::Arc;

use async_trait::async_trait;
use gatekeep_core::{
    AdmissionPipeline, AdmissionRequest, ApprovalGate, DecisionHistory, InMemoryAuditSink,
    PipelineError, PolicyStore, ToolForwardError, ToolForwarder,
};
use serde_json::{json, Value};
use tempfile::tempdir;

struct EchoForwarder;

#[async_trait]
impl ToolForwarder for EchoForwarder {
    async fn forward(&self, tool: &str, action: &str, params: &Value) -> Result<Value, ToolForwardError> {
        Ok(json!({"tool": tool, "action": action, "echo": params}))
    }
}

fn pipeline(dir: &std::path::Path) -> AdmissionPipeline {
    let store = PolicyStore::new(dir);
    store.load();
    AdmissionPipeline::new(
        store,
        Arc::new(ApprovalGate::new()),
        Arc::new(DecisionHistory::new()),
        Arc::new(InMemoryAuditSink::new()),
        Arc::new(EchoForwarder),
    )
}

#[tokio::test]
async fn bad_file_isolation_end_to_end() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("good.yaml"),
        "version: 1\nagents:\n  - id: a\n    allow:\n      - tool: files\n        actions: [read]\n",
    )
    .unwrap();
    fs::write(dir.path().join("bad.yaml"), "agents: not-a-list-or-even-valid: [").unwrap();

    let pipeline = pipeline(dir.path());
    assert_eq!(pipeline.store().stats().policy_files, 1);

    let result = pipeline
        .admit(AdmissionRequest {
            agent_id: "a".to_string(),
            parent_agent: None,
            tool: "files".to_string(),
            action: "read".to_string(),
            params: json!({}),
            approval_id: None,
        })
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn hot_reload_end_to_end_through_the_pipeline() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("p.yaml"),
        "version: 1\nagents:\n  - id: a\n    allow:\n      - tool: other\n        actions: [noop]\n",
    )
    .unwrap();

    let pipeline = pipeline(dir.path());

    let denied = pipeline
        .admit(AdmissionRequest {
            agent_id: "a".to_string(),
            parent_agent: None,
            tool: "files".to_string(),
            action: "read".to_string(),
            params: json!({}),
            approval_id: None,
        })
        .await;
    assert!(matches!(denied, Err(PipelineError::PolicyViolation { .. })));

    fs::write(
        dir.path().join("p.yaml"),
        "version: 2\nagents:\n  - id: a\n    allow:\n      - tool: files\n        actions: [read]\n",
    )
    .unwrap();
    pipeline.store().load();

    let allowed = pipeline
        .admit(AdmissionRequest {
            agent_id: "a".to_string(),
            parent_agent: None,
            tool: "files".to_string(),
            action: "read".to_string(),
            params: json!({}),
            approval_id: None,
        })
        .await;
    assert!(allowed.is_ok());
}

#[tokio::test]
async fn approval_gate_full_roundtrip_through_the_pipeline() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("p.yaml"),
        "version: 1\nagents:\n  - id: a\n    allow:\n      - tool: payments\n        actions: [send]\n        require_approval: true\n",
    )
    .unwrap();
    let pipeline = pipeline(dir.path());

    let request = || AdmissionRequest {
        agent_id: "a".to_string(),
        parent_agent: None,
        tool: "payments".to_string(),
        action: "send".to_string(),
        params: json!({"amount": 10}),
        approval_id: None,
    };

    let approval_id = match pipeline.admit(request()).await.unwrap_err() {
        PipelineError::ApprovalRequired { approval_id } => approval_id,
        other => panic!("unexpected: {other:?}"),
    };
    assert_eq!(pipeline.approvals().pending().len(), 1);

    let mut retried = request();
    retried.approval_id = Some(approval_id);
    assert!(pipeline.admit(retried).await.is_ok());
    assert!(pipeline.approvals().pending().is_empty());
}
