use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gatekeep_core::{AdmissionPipeline, AdmissionRequest, PipelineError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

pub struct AppState {
    pub pipeline: Arc<AdmissionPipeline>,
}

fn json_error(status: StatusCode, error: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({"error": error, "message": message.into()})),
    )
        .into_response()
}

/// Builds the full route table for the gateway. GET/POST allowed from
/// any origin, since this gateway is meant to sit behind agent-facing
/// infrastructure rather than a browser.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/tools/{tool}/{action}", post(handle_tool_call))
        .route("/approve/{approval_id}", post(handle_approve))
        .route("/health", get(handle_health))
        .route("/admin/agents", get(handle_admin_agents))
        .route("/admin/policies", get(handle_admin_policies))
        .route("/admin/decisions", get(handle_admin_decisions))
        .route("/admin/approvals/pending", get(handle_admin_approvals_pending))
        .with_state(state)
        .layer(cors)
}

async fn handle_tool_call(
    State(state): State<Arc<AppState>>,
    Path((tool, action)): Path<(String, String)>,
    headers: HeaderMap,
    Json(params): Json<Value>,
) -> Response {
    let Some(agent_id) = header_str(&headers, "x-agent-id") else {
        tracing::warn!(%tool, %action, "rejected call missing X-Agent-ID header");
        return json_error(StatusCode::BAD_REQUEST, "MissingHeader", "X-Agent-ID is required");
    };
    let parent_agent = header_str(&headers, "x-parent-agent");
    let approval_id = match header_str(&headers, "x-approval-id") {
        Some(raw) => match raw.parse::<Uuid>() {
            Ok(id) => Some(id),
            Err(_) => return json_error(StatusCode::BAD_REQUEST, "InvalidHeader", "X-Approval-ID is not a UUID"),
        },
        None => None,
    };

    let result = state
        .pipeline
        .admit(AdmissionRequest {
            agent_id,
            parent_agent,
            tool,
            action,
            params,
            approval_id,
        })
        .await;

    respond(result)
}

async fn handle_approve(
    State(state): State<Arc<AppState>>,
    Path(approval_id): Path<Uuid>,
) -> Response {
    let Some(approval) = state.pipeline.approvals().peek(approval_id) else {
        return json_error(StatusCode::NOT_FOUND, "ApprovalNotFound", "approval id unknown or already consumed");
    };

    let ctx = approval.context;
    let result = state
        .pipeline
        .admit(AdmissionRequest {
            agent_id: ctx.agent_id,
            parent_agent: ctx.parent_agent,
            tool: ctx.tool,
            action: ctx.action,
            params: ctx.params,
            approval_id: Some(approval_id),
        })
        .await;

    respond(result)
}

fn respond(result: Result<Value, PipelineError>) -> Response {
    match result {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(PipelineError::ApprovalRequired { approval_id }) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "error": "ApprovalRequired",
                "approval_id": approval_id,
                "message": "this action requires approval before it will be forwarded",
            })),
        )
            .into_response(),
        Err(PipelineError::PolicyViolation { reason }) => {
            json_error(StatusCode::FORBIDDEN, "PolicyViolation", reason)
        }
        Err(PipelineError::ApprovalNotFound) => json_error(
            StatusCode::NOT_FOUND,
            "ApprovalNotFound",
            "approval id unknown or already consumed",
        ),
        Err(PipelineError::ToolError { message }) => json_error(StatusCode::BAD_GATEWAY, "ToolError", message),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    policy: gatekeep_core::Stats,
}

async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let policy = state.pipeline.store().stats();
    Json(HealthResponse { status: "ok", policy })
}

async fn handle_admin_agents(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.pipeline.store().current();
    let agents: Vec<serde_json::Value> = snapshot
        .files()
        .flat_map(|(path, file)| {
            file.agents.iter().map(move |agent| {
                serde_json::json!({
                    "file": path.display().to_string(),
                    "agent_id": agent.id,
                    "policy_version": file.version,
                })
            })
        })
        .collect();
    Json(agents)
}

async fn handle_admin_policies(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.pipeline.store().current();
    let policies: Vec<serde_json::Value> = snapshot
        .files()
        .map(|(path, file)| {
            serde_json::json!({
                "file": path.display().to_string(),
                "version": file.version,
                "agent_count": file.total_agents(),
            })
        })
        .collect();
    Json(policies)
}

#[derive(Deserialize)]
struct DecisionsQuery {
    limit: Option<usize>,
}

async fn handle_admin_decisions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DecisionsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(50);
    Json(state.pipeline.history().recent(limit))
}

async fn handle_admin_approvals_pending(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.pipeline.approvals().pending())
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gatekeep_core::{ApprovalGate, DecisionHistory, InMemoryAuditSink, PolicyStore, ToolForwardError, ToolForwarder};
    use std::fs;
    use tempfile::tempdir;
    use tower::ServiceExt;

    struct EchoForwarder;

    #[async_trait]
    impl ToolForwarder for EchoForwarder {
        async fn forward(&self, tool: &str, action: &str, params: &Value) -> Result<Value, ToolForwardError> {
            Ok(serde_json::json!({"tool": tool, "action": action, "echo": params}))
        }
    }

    fn router_with_policy(yaml: &str) -> (Router, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("p.yaml"), yaml).unwrap();
        let store = PolicyStore::new(dir.path());
        store.load();
        let pipeline = Arc::new(AdmissionPipeline::new(
            store,
            Arc::new(ApprovalGate::new()),
            Arc::new(DecisionHistory::new()),
            Arc::new(InMemoryAuditSink::new()),
            Arc::new(EchoForwarder),
        ));
        let state = Arc::new(AppState { pipeline });
        (build_router(state), dir)
    }

    #[tokio::test]
    async fn allowed_call_returns_200() {
        let (router, _dir) = router_with_policy(
            r#"
version: 1
agents:
  - id: billing_bot
    allow:
      - tool: payments
        actions: [create]
        conditions:
          max_amount: 1000
          currencies: [USD]
"#,
        );

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/tools/payments/create")
            .header("x-agent-id", "billing_bot")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(
                serde_json::to_vec(&serde_json::json!({"amount": 500, "currency": "USD", "vendor_id": "v1"})).unwrap(),
            ))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn denied_call_returns_403() {
        let (router, _dir) = router_with_policy(
            r#"
version: 1
agents:
  - id: billing_bot
    allow:
      - tool: payments
        actions: [create]
        conditions:
          max_amount: 1000
"#,
        );

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/tools/payments/create")
            .header("x-agent-id", "billing_bot")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(
                serde_json::to_vec(&serde_json::json!({"amount": 1500})).unwrap(),
            ))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn approval_flow_returns_202_then_200_then_404() {
        let (router, _dir) = router_with_policy(
            r#"
version: 1
agents:
  - id: billing_bot
    allow:
      - tool: payments
        actions: [send]
        require_approval: true
"#,
        );

        let build_request = || {
            axum::http::Request::builder()
                .method("POST")
                .uri("/tools/payments/send")
                .header("x-agent-id", "billing_bot")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&serde_json::json!({"amount": 10})).unwrap(),
                ))
                .unwrap()
        };

        let first = router.clone().oneshot(build_request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::ACCEPTED);
        let body = axum::body::to_bytes(first.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let approval_id = parsed["approval_id"].as_str().unwrap().to_string();

        let approve_request = axum::http::Request::builder()
            .method("POST")
            .uri(format!("/approve/{approval_id}"))
            .body(axum::body::Body::empty())
            .unwrap();
        let second = router.clone().oneshot(approve_request).await.unwrap();
        assert_eq!(second.status(), StatusCode::OK);

        let approve_again = axum::http::Request::builder()
            .method("POST")
            .uri(format!("/approve/{approval_id}"))
            .body(axum::body::Body::empty())
            .unwrap();
        let third = router.oneshot(approve_again).await.unwrap();
        assert_eq!(third.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reports_policy_stats() {
        let (router, _dir) = router_with_policy(
            "version: 1\nagents:\n  - id: a\n    allow:\n      - tool: x\n        actions: [y]\n",
        );
        let request = axum::http::Request::builder()
            .method("GET")
            .uri("/health")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["policy"]["policy_files"], 1);
    }
}
