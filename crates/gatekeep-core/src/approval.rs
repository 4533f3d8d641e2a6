use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::evaluator::EvaluationContext;

/// Default lifetime for a pending approval request before it's treated
/// as stale. 15 minutes, swept by `sweep_expired`.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Serialize)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: ApprovalStatus,
    pub context: EvaluationContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
}

struct Entry {
    request: ApprovalRequest,
}

/// Correlates a `require_approval` decision to a later `consume` call.
/// Guarded by a single mutex; every operation runs inside the lock.
pub struct ApprovalGate {
    ttl: Duration,
    pending: Mutex<HashMap<Uuid, Entry>>,
}

impl Default for ApprovalGate {
    fn default() -> Self {
        ApprovalGate {
            ttl: DEFAULT_TTL,
            pending: Mutex::new(HashMap::new()),
        }
    }
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        ApprovalGate {
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts a new pending request, returning its freshly-generated id.
    pub fn create(&self, context: EvaluationContext) -> Uuid {
        let id = Uuid::new_v4();
        let request = ApprovalRequest {
            id,
            created_at: Utc::now(),
            status: ApprovalStatus::Pending,
            context,
        };
        self.pending
            .lock()
            .expect("approval gate lock poisoned")
            .insert(id, Entry { request });
        id
    }

    /// Atomically removes and returns the entry for `id`. A second
    /// call with the same id (or an expired one) returns `None` —
    /// single-use by construction.
    pub fn consume(&self, id: Uuid) -> Option<ApprovalRequest> {
        let mut pending = self.pending.lock().expect("approval gate lock poisoned");
        let entry = pending.remove(&id)?;
        if self.is_expired(&entry) {
            return None;
        }
        Some(entry.request)
    }

    /// Reads a pending request's context without consuming it. Used by
    /// a transport that needs to rebuild the original call (tool,
    /// action, params) before resubmitting it through the pipeline.
    pub fn peek(&self, id: Uuid) -> Option<ApprovalRequest> {
        let pending = self.pending.lock().expect("approval gate lock poisoned");
        let entry = pending.get(&id)?;
        if self.is_expired(entry) {
            return None;
        }
        Some(entry.request.clone())
    }

    pub fn pending(&self) -> Vec<ApprovalRequest> {
        let pending = self.pending.lock().expect("approval gate lock poisoned");
        pending
            .values()
            .filter(|e| !self.is_expired(e))
            .map(|e| e.request.clone())
            .collect()
    }

    /// Removes entries older than the configured TTL. Call this
    /// periodically (the daemon does so on a timer); the core itself
    /// has no background task of its own.
    pub fn sweep_expired(&self) -> usize {
        let mut pending = self.pending.lock().expect("approval gate lock poisoned");
        let before = pending.len();
        pending.retain(|_, e| !self.is_expired(e));
        before - pending.len()
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        let age = Utc::now().signed_duration_since(entry.request.created_at);
        age.to_std().map(|a| a > self.ttl).unwrap_or(false)
    }
}
