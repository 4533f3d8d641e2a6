//! Simulated downstream tool adapters. Spec.md treats these as an
//! external collaborator — interface only — so the policy core never
//! depends on them. They exist here purely so the gateway is runnable
//! end-to-end; grounded in the reference gateway's payments/files
//! adapters.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use gatekeep_core::{ToolForwardError, ToolForwarder};
use serde_json::{json, Value};
use uuid::Uuid;

/// In-memory stand-in for a payment rail.
#[derive(Default)]
pub struct PaymentsAdapter {
    payments: Mutex<HashMap<String, Value>>,
}

impl PaymentsAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn create(&self, params: &Value) -> Result<Value, ToolForwardError> {
        let amount = params
            .get("amount")
            .and_then(Value::as_f64)
            .ok_or_else(|| ToolForwardError::new("amount must be positive"))?;
        if amount <= 0.0 {
            return Err(ToolForwardError::new("amount must be positive"));
        }
        let currency = params
            .get("currency")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolForwardError::new("currency is required"))?;
        let vendor_id = params
            .get("vendor_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolForwardError::new("vendor_id is required"))?;
        let _ = vendor_id;

        let payment_id = Uuid::new_v4().simple().to_string();
        let payment = json!({
            "payment_id": payment_id,
            "amount": amount,
            "currency": currency,
            "status": "created",
        });
        self.payments
            .lock()
            .expect("payments lock poisoned")
            .insert(payment_id, payment.clone());
        Ok(payment)
    }

    fn refund(&self, params: &Value) -> Result<Value, ToolForwardError> {
        let payment_id = params
            .get("payment_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolForwardError::new("payment_id is required"))?;
        let payments = self.payments.lock().expect("payments lock poisoned");
        if !payments.contains_key(payment_id) {
            return Err(ToolForwardError::new(format!("payment '{payment_id}' not found")));
        }
        Ok(json!({
            "refund_id": Uuid::new_v4().simple().to_string(),
            "payment_id": payment_id,
            "status": "refunded",
        }))
    }
}

#[async_trait]
impl ToolForwarder for PaymentsAdapter {
    async fn forward(&self, _tool: &str, action: &str, params: &Value) -> Result<Value, ToolForwardError> {
        match action {
            "create" => self.create(params),
            "refund" => self.refund(params),
            other => Err(ToolForwardError::new(format!("payments has no action '{other}'"))),
        }
    }
}

/// In-memory stand-in for a document/file store, seeded with a handful
/// of fixtures so read-path policies have something real to read.
pub struct FilesAdapter {
    files: Mutex<HashMap<String, String>>,
}

impl Default for FilesAdapter {
    fn default() -> Self {
        let mut files = HashMap::new();
        files.insert(
            "/hr-docs/employee-handbook.txt".to_string(),
            "Employee Handbook Version 2.0\n\nWelcome to the company...".to_string(),
        );
        files.insert(
            "/hr-docs/benefits.txt".to_string(),
            "Benefits Information\n\nHealth Insurance: ...".to_string(),
        );
        files.insert(
            "/legal/contract.docx".to_string(),
            "CONFIDENTIAL LEGAL CONTRACT\n\nThis agreement...".to_string(),
        );
        FilesAdapter {
            files: Mutex::new(files),
        }
    }
}

impl FilesAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self, params: &Value) -> Result<Value, ToolForwardError> {
        let path = params
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolForwardError::new("path is required"))?;
        let files = self.files.lock().expect("files lock poisoned");
        let content = files
            .get(path)
            .ok_or_else(|| ToolForwardError::new(format!("file '{path}' not found")))?;
        Ok(json!({"path": path, "content": content}))
    }

    fn write(&self, params: &Value) -> Result<Value, ToolForwardError> {
        let path = params
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolForwardError::new("path is required"))?;
        let content = params.get("content").and_then(Value::as_str).unwrap_or_default();
        self.files
            .lock()
            .expect("files lock poisoned")
            .insert(path.to_string(), content.to_string());
        Ok(json!({"path": path, "status": "written"}))
    }
}

#[async_trait]
impl ToolForwarder for FilesAdapter {
    async fn forward(&self, _tool: &str, action: &str, params: &Value) -> Result<Value, ToolForwardError> {
        match action {
            "read" => self.read(params),
            "write" => self.write(params),
            other => Err(ToolForwardError::new(format!("files has no action '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn payments_create_then_refund() {
        let adapter = PaymentsAdapter::new();
        let created = adapter
            .forward("payments", "create", &json!({"amount": 10, "currency": "USD", "vendor_id": "v1"}))
            .await
            .unwrap();
        let payment_id = created["payment_id"].as_str().unwrap().to_string();
        let refunded = adapter
            .forward("payments", "refund", &json!({"payment_id": payment_id}))
            .await
            .unwrap();
        assert_eq!(refunded["status"], "refunded");
    }

    #[tokio::test]
    async fn payments_rejects_non_positive_amount() {
        let adapter = PaymentsAdapter::new();
        let result = adapter
            .forward("payments", "create", &json!({"amount": -5, "currency": "USD", "vendor_id": "v1"}))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn files_read_seeded_fixture() {
        let adapter = FilesAdapter::new();
        let result = adapter
            .forward("files", "read", &json!({"path": "/hr-docs/benefits.txt"}))
            .await
            .unwrap();
        assert!(result["content"].as_str().unwrap().contains("Health Insurance"));
    }

    #[tokio::test]
    async fn files_read_missing_path_errors() {
        let adapter = FilesAdapter::new();
        let result = adapter.forward("files", "read", &json!({"path": "/nope"})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn files_write_then_read_roundtrip() {
        let adapter = FilesAdapter::new();
        adapter
            .forward("files", "write", &json!({"path": "/tmp/note.txt", "content": "hi"}))
            .await
            .unwrap();
        let result = adapter.forward("files", "read", &json!({"path": "/tmp/note.txt"})).await.unwrap();
        assert_eq!(result["content"], "hi");
    }
}
