use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::policy::conditions::first_violation;
use crate::policy::schema::PolicyFile;

/// The request shape the evaluator reasons about. Params are opaque
/// except where a condition names a key it examines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub agent_id: String,
    pub tool: String,
    pub action: String,
    pub params: Value,
    pub parent_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub allow: bool,
    pub reason: String,
    pub version: i64,
    pub require_approval: bool,
    pub approval_context: Option<EvaluationContext>,
}

impl Decision {
    fn deny(reason: impl Into<String>, version: i64) -> Self {
        Decision {
            allow: false,
            reason: reason.into(),
            version,
            require_approval: false,
            approval_context: None,
        }
    }

    fn allow(reason: impl Into<String>, version: i64) -> Self {
        Decision {
            allow: true,
            reason: reason.into(),
            version,
            require_approval: false,
            approval_context: None,
        }
    }

    fn require_approval(reason: impl Into<String>, version: i64, ctx: &EvaluationContext) -> Self {
        Decision {
            allow: false,
            reason: reason.into(),
            version,
            require_approval: true,
            approval_context: Some(ctx.clone()),
        }
    }
}

/// Pure, deterministic `(PolicyFile, EvaluationContext) -> Decision`.
/// No I/O, no mutable state; safe to call concurrently against a
/// shared `&PolicyFile`.
pub fn evaluate(file: &PolicyFile, ctx: &EvaluationContext) -> Decision {
    let Some(agent) = file.agent(&ctx.agent_id) else {
        return Decision::deny("agent not found in policy", file.version);
    };

    if let Some(parent) = &ctx.parent_agent {
        if !agent.deny_if_parent.is_empty() && agent.deny_if_parent.contains(parent) {
            return Decision::deny(
                format!("agent '{}' denies calls from parent '{parent}'", agent.id),
                file.version,
            );
        }
        if !agent.allow_only_parents.is_empty() && !agent.allow_only_parents.contains(parent) {
            let allowed: Vec<&str> = agent.allow_only_parents.iter().map(String::as_str).collect();
            return Decision::deny(
                format!(
                    "agent '{}' requires a parent from: {}",
                    agent.id,
                    allowed.join(", ")
                ),
                file.version,
            );
        }
    } else if !agent.allow_only_parents.is_empty() {
        let allowed: Vec<&str> = agent.allow_only_parents.iter().map(String::as_str).collect();
        return Decision::deny(
            format!(
                "agent '{}' requires a parent from: {}",
                agent.id,
                allowed.join(", ")
            ),
            file.version,
        );
    }

    for perm in &agent.allow {
        if perm.tool != ctx.tool || !perm.actions.contains(&ctx.action) {
            continue;
        }

        if let Some(violation) = first_violation(&perm.conditions, &ctx.params) {
            return Decision::deny(violation, file.version);
        }

        if perm.require_approval {
            return Decision::require_approval("action requires approval", file.version, ctx);
        }

        return Decision::allow("Policy allows this action", file.version);
    }

    Decision::deny(
        format!(
            "no policy allows agent '{}' to perform {}.{}",
            ctx.agent_id, ctx.tool, ctx.action
        ),
        file.version,
    )
}
