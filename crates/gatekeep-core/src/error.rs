use uuid::Uuid;

/// Errors the admission pipeline can return to its caller.
///
/// `ConfigError` and `NoPoliciesLoaded` from the error taxonomy are
/// deliberately absent here: a bad policy file is logged during load
/// and never escapes it, and an empty snapshot surfaces only as a
/// `Decision` reason string, not as a variant of this enum.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("policy violation: {reason}")]
    PolicyViolation { reason: String },

    #[error("action requires approval")]
    ApprovalRequired { approval_id: Uuid },

    #[error("approval id not found or already consumed")]
    ApprovalNotFound,

    #[error("tool error: {message}")]
    ToolError { message: String },
}

/// Reasons a policy document can fail validation. Never returned to a
/// transport caller; logged and the file is dropped.
#[derive(Debug, thiserror::Error)]
pub enum PolicyFileError {
    #[error("invalid version {version}: must be > 0")]
    InvalidVersion { version: i64 },

    #[error("policy file has no agents")]
    NoAgents,

    #[error("agent has empty id")]
    EmptyAgentId,

    #[error("duplicate agent id '{id}'")]
    DuplicateAgentId { id: String },

    #[error("agent '{agent_id}' has no allow permissions")]
    EmptyAllowList { agent_id: String },

    #[error("agent '{agent_id}' has a permission with an empty tool name")]
    EmptyPermissionTool { agent_id: String },

    #[error("agent '{agent_id}' has a permission with no actions")]
    EmptyPermissionActions { agent_id: String },

    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
}
