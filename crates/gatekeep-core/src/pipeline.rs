use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use uuid::Uuid;

use crate::approval::ApprovalGate;
use crate::audit::{hash_params, AuditSink, DecisionRecord};
use crate::error::PipelineError;
use crate::evaluator::{Decision, EvaluationContext};
use crate::forwarder::ToolForwarder;
use crate::history::{DecisionHistory, HistoryEntry, HistoryOutcome};
use crate::store::PolicyStore;

pub struct AdmissionRequest {
    pub agent_id: String,
    pub parent_agent: Option<String>,
    pub tool: String,
    pub action: String,
    pub params: Value,
    pub approval_id: Option<Uuid>,
}

/// Orchestrates evaluate -> (approve?) -> forward -> audit. Holds no
/// policy state of its own; every collaborator is injected so the
/// pipeline stays testable without a filesystem or a server.
pub struct AdmissionPipeline {
    store: PolicyStore,
    approvals: Arc<ApprovalGate>,
    history: Arc<DecisionHistory>,
    audit: Arc<dyn AuditSink>,
    forwarder: Arc<dyn ToolForwarder>,
}

impl AdmissionPipeline {
    pub fn new(
        store: PolicyStore,
        approvals: Arc<ApprovalGate>,
        history: Arc<DecisionHistory>,
        audit: Arc<dyn AuditSink>,
        forwarder: Arc<dyn ToolForwarder>,
    ) -> Self {
        AdmissionPipeline {
            store,
            approvals,
            history,
            audit,
            forwarder,
        }
    }

    pub fn store(&self) -> &PolicyStore {
        &self.store
    }

    pub fn approvals(&self) -> &ApprovalGate {
        &self.approvals
    }

    pub fn history(&self) -> &DecisionHistory {
        &self.history
    }

    pub async fn admit(&self, request: AdmissionRequest) -> Result<Value, PipelineError> {
        let t0 = Instant::now();

        if let Some(approval_id) = request.approval_id {
            if self.approvals.consume(approval_id).is_none() {
                return Err(PipelineError::ApprovalNotFound);
            }
        }

        let ctx = EvaluationContext {
            agent_id: request.agent_id,
            tool: request.tool,
            action: request.action,
            params: request.params,
            parent_agent: request.parent_agent,
        };
        let decision = self.store.current().evaluate(&ctx);
        let policy_latency_ms = elapsed_ms(t0);

        if decision.require_approval && request.approval_id.is_none() {
            let approval_ctx = decision.approval_context.clone().unwrap_or_else(|| ctx.clone());
            let id = self.approvals.create(approval_ctx);
            self.emit(
                &ctx,
                &decision,
                HistoryOutcome::ApprovalRequired,
                false,
                policy_latency_ms,
                None,
                Some(id),
                &decision.reason,
                &decision.reason,
            );
            return Err(PipelineError::ApprovalRequired { approval_id: id });
        }

        // A second arrival with a matching, already-consumed approval
        // id satisfies the gate even though re-evaluation still says
        // `require_approval` for this permission — that's the signal
        // the same gated action fired again, not a new deny.
        let proceeding = decision.allow || (decision.require_approval && request.approval_id.is_some());

        if !proceeding {
            self.emit(
                &ctx,
                &decision,
                HistoryOutcome::Denied,
                false,
                policy_latency_ms,
                None,
                None,
                &decision.reason,
                &decision.reason,
            );
            return Err(PipelineError::PolicyViolation {
                reason: decision.reason.clone(),
            });
        }

        let t1 = Instant::now();
        match self.forwarder.forward(&ctx.tool, &ctx.action, &ctx.params).await {
            Ok(response) => {
                let tool_latency_ms = elapsed_ms(t1);
                self.emit(
                    &ctx,
                    &decision,
                    HistoryOutcome::Allowed,
                    true,
                    policy_latency_ms,
                    Some(tool_latency_ms),
                    None,
                    &decision.reason,
                    &decision.reason,
                );
                Ok(response)
            }
            Err(err) => {
                let tool_latency_ms = elapsed_ms(t1);
                self.emit(
                    &ctx,
                    &decision,
                    HistoryOutcome::AllowedButToolError,
                    true,
                    policy_latency_ms,
                    Some(tool_latency_ms),
                    None,
                    &format!("Policy allows, but tool error: {}", err.message),
                    &format!("Tool error: {}", err.message),
                );
                Err(PipelineError::ToolError { message: err.message })
            }
        }
    }

    /// Records an admission the transport abandoned before forwarding.
    /// The tool is never called.
    pub fn record_cancellation(&self, ctx: &EvaluationContext, decision: &Decision) {
        self.emit(
            ctx,
            decision,
            HistoryOutcome::ClientCancelled,
            decision.allow,
            0.0,
            None,
            None,
            &decision.reason,
            &decision.reason,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        ctx: &EvaluationContext,
        decision: &Decision,
        outcome: HistoryOutcome,
        allowed: bool,
        policy_latency_ms: f64,
        tool_latency_ms: Option<f64>,
        approval_id: Option<Uuid>,
        audit_reason: &str,
        history_reason: &str,
    ) {
        let timestamp = chrono::Utc::now();
        let record = DecisionRecord {
            timestamp,
            trace_id: Uuid::new_v4().simple().to_string(),
            agent_id: ctx.agent_id.clone(),
            tool_name: ctx.tool.clone(),
            tool_action: ctx.action.clone(),
            decision_allow: allowed,
            reason: audit_reason.to_string(),
            policy_version: decision.version,
            params_hash: hash_params(&ctx.params),
            latency_ms: round2(policy_latency_ms),
            parent_agent: ctx.parent_agent.clone(),
            tool_latency_ms: tool_latency_ms.map(round2),
            approval_id,
        };
        self.audit.record(&record);

        self.history.record(HistoryEntry {
            timestamp,
            agent_id: ctx.agent_id.clone(),
            tool: ctx.tool.clone(),
            action: ctx.action.clone(),
            outcome,
            reason: history_reason.to_string(),
            parent_agent: ctx.parent_agent.clone(),
            approval_id,
        });
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
