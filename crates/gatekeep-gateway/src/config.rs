use std::path::PathBuf;

/// Reads the process environment into the gateway's configuration.
/// Environment variables stand in for a project-root-derived layout
/// since this gateway has no workspace concept of its own.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub policy_dir: PathBuf,
    pub otel_endpoint: Option<String>,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        GatewayConfig {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            policy_dir: std::env::var("POLICY_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./policies")),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
        }
    }
}
