//! HTTP transport for the gatekeep egress gateway, plus the mock tool
//! adapters that stand in for real downstream tools.

pub mod config;
pub mod http;
pub mod tools;

pub use config::GatewayConfig;
pub use http::{build_router, AppState};
pub use tools::{FilesAdapter, PaymentsAdapter};
