//! # gatekeep-core
//!
//! Policy evaluation and approval subsystem for a policy-mediated
//! egress gateway. An inbound tool call is evaluated against a
//! hot-reloadable set of declarative policy files; the result either
//! denies the call, suspends it pending human approval, or forwards it
//! to a registered [`forwarder::ToolForwarder`] and records the
//! outcome.
//!
//! This crate has no transport and no process entrypoint — see
//! `gatekeep-gateway` for the HTTP surface and `gatekeep-daemon` for
//! the binary that wires everything together.

pub mod approval;
pub mod audit;
pub mod error;
pub mod evaluator;
pub mod forwarder;
pub mod history;
pub mod pipeline;
pub mod policy;
pub mod store;
pub mod watcher;

pub use approval::{ApprovalGate, ApprovalRequest, ApprovalStatus};
pub use audit::{AuditSink, DecisionRecord, InMemoryAuditSink, JsonlAuditSink};
pub use error::{PipelineError, PolicyFileError};
pub use evaluator::{evaluate, Decision, EvaluationContext};
pub use forwarder::{ToolForwardError, ToolForwarder, ToolRegistry};
pub use history::{DecisionHistory, HistoryEntry, HistoryOutcome};
pub use pipeline::{AdmissionPipeline, AdmissionRequest};
pub use policy::{Agent, ConditionSet, Permission, PolicyFile};
pub use store::{PolicySnapshot, PolicyStore, Stats};
pub use watcher::PolicyWatcher;
