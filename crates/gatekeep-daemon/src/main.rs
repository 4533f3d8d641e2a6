//! # gatekeep-daemon
//!
//! Process entrypoint for the policy-mediated egress gateway. Loads
//! policies, starts the hot-reload watcher, wires the mock tool
//! adapters, and serves the HTTP surface described in the gateway's
//! external interfaces.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use gatekeep_core::{AdmissionPipeline, ApprovalGate, DecisionHistory, JsonlAuditSink, PolicyStore, PolicyWatcher, ToolRegistry};
use gatekeep_gateway::{build_router, AppState, FilesAdapter, GatewayConfig, PaymentsAdapter};
use tracing_subscriber::EnvFilter;

/// gatekeep egress gateway.
#[derive(Parser)]
#[command(name = "gatekeep-daemon", about = "Policy-mediated egress gateway")]
struct Cli {
    /// Directory to load policies from (overrides POLICY_DIR).
    #[arg(long)]
    policy_dir: Option<std::path::PathBuf>,

    /// Port to listen on (overrides PORT).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("gatekeep_core=info".parse()?)
                .add_directive("gatekeep_gateway=info".parse()?)
                .add_directive("gatekeep_daemon=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let mut config = GatewayConfig::from_env();
    if let Some(policy_dir) = cli.policy_dir {
        config.policy_dir = policy_dir;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    if let Some(endpoint) = &config.otel_endpoint {
        tracing::info!(endpoint = %endpoint, "OTLP endpoint configured (exporter wiring out of scope for this build)");
    }

    tracing::info!(policy_dir = %config.policy_dir.display(), "loading policies");
    let store = PolicyStore::new(&config.policy_dir);
    let stats = store.load();
    tracing::info!(policy_files = stats.policy_files, total_agents = stats.total_agents, "initial policy load complete");

    let watcher = Arc::new(PolicyWatcher::new());
    watcher.start(store.clone());

    let approvals = Arc::new(ApprovalGate::new());
    spawn_approval_sweeper(approvals.clone());

    let audit_log_path = "gatekeep-audit.jsonl";
    let audit = Arc::new(JsonlAuditSink::open(audit_log_path)?);
    tracing::info!(path = audit_log_path, "audit log opened");

    let forwarder = Arc::new(
        ToolRegistry::new()
            .register("payments", Box::new(PaymentsAdapter::new()))
            .register("files", Box::new(FilesAdapter::new())),
    );

    let pipeline = Arc::new(AdmissionPipeline::new(
        store,
        approvals,
        Arc::new(DecisionHistory::new()),
        audit,
        forwarder,
    ));

    let state = Arc::new(AppState { pipeline });
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "gatekeep-daemon listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("gatekeep-daemon shutting down");
    Ok(())
}

fn spawn_approval_sweeper(approvals: Arc<ApprovalGate>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let swept = approvals.sweep_expired();
            if swept > 0 {
                tracing::info!(count = swept, "swept expired approval requests");
            }
        }
    });
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
}
