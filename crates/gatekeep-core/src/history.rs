use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOutcome {
    Allowed,
    Denied,
    ApprovalRequired,
    AllowedButToolError,
    /// The inbound transport cancelled before forwarding; the
    /// admission still records what the policy would have decided.
    ClientCancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub tool: String,
    pub action: String,
    pub outcome: HistoryOutcome,
    pub reason: String,
    pub parent_agent: Option<String>,
    pub approval_id: Option<Uuid>,
}

/// Bounded recent-decisions buffer for admin inspection. Tail-evicting:
/// once full, the oldest entry is dropped to make room for the newest.
pub struct DecisionHistory {
    capacity: usize,
    entries: Mutex<VecDeque<HistoryEntry>>,
}

impl Default for DecisionHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl DecisionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        DecisionHistory {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, entry: HistoryEntry) {
        let mut entries = self.entries.lock().expect("history lock poisoned");
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Returns up to `limit` most recent entries, newest last.
    pub fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        let entries = self.entries.lock().expect("history lock poisoned");
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("history lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry {
            timestamp: Utc::now(),
            agent_id: format!("agent-{n}"),
            tool: "x".to_string(),
            action: "y".to_string(),
            outcome: HistoryOutcome::Allowed,
            reason: "Policy allows this action".to_string(),
            parent_agent: None,
            approval_id: None,
        }
    }

    #[test]
    fn history_boundedness_caps_at_capacity() {
        let history = DecisionHistory::with_capacity(3);
        for n in 0..5 {
            history.record(entry(n));
        }
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn recent_returns_newest_last() {
        let history = DecisionHistory::with_capacity(10);
        for n in 0..5 {
            history.record(entry(n));
        }
        let recent = history.recent(10);
        assert_eq!(recent.last().unwrap().agent_id, "agent-4");
        assert_eq!(recent.first().unwrap().agent_id, "agent-0");
    }

    #[test]
    fn under_capacity_holds_min_n_capacity_entries() {
        let history = DecisionHistory::with_capacity(50);
        for n in 0..10 {
            history.record(entry(n));
        }
        assert_eq!(history.len(), 10);
    }

    #[test]
    fn recent_respects_limit_smaller_than_len() {
        let history = DecisionHistory::with_capacity(10);
        for n in 0..10 {
            history.record(entry(n));
        }
        assert_eq!(history.recent(3).len(), 3);
    }
}
