use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::PolicyFileError;

/// The recognized, AND-combined condition keys. Unknown keys in the
/// source document are silently dropped by serde during parse —
/// forward-compatibility is free, not something we implement.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConditionSet {
    pub max_amount: Option<f64>,
    #[serde(default)]
    pub currencies: BTreeSet<String>,
    pub folder_prefix: Option<String>,
}

impl ConditionSet {
    fn is_default(&self) -> bool {
        self.max_amount.is_none() && self.currencies.is_empty() && self.folder_prefix.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Permission {
    pub tool: String,
    pub actions: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "ConditionSet::is_default")]
    pub conditions: ConditionSet,
    #[serde(default)]
    pub require_approval: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub id: String,
    pub allow: Vec<Permission>,
    #[serde(default)]
    pub deny_if_parent: BTreeSet<String>,
    #[serde(default)]
    pub allow_only_parents: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyFile {
    pub version: i64,
    pub agents: Vec<Agent>,
}

impl PolicyFile {
    /// Parses and validates a YAML document, in one step. The first
    /// validation failure encountered is the one reported.
    pub fn parse_and_validate(yaml: &str) -> Result<Self, PolicyFileError> {
        let file: PolicyFile = serde_yaml::from_str(yaml)?;
        file.validate()?;
        Ok(file)
    }

    fn validate(&self) -> Result<(), PolicyFileError> {
        if self.version <= 0 {
            return Err(PolicyFileError::InvalidVersion {
                version: self.version,
            });
        }
        if self.agents.is_empty() {
            return Err(PolicyFileError::NoAgents);
        }
        let mut seen_ids = BTreeSet::new();
        for agent in &self.agents {
            if agent.id.is_empty() {
                return Err(PolicyFileError::EmptyAgentId);
            }
            if !seen_ids.insert(agent.id.clone()) {
                return Err(PolicyFileError::DuplicateAgentId {
                    id: agent.id.clone(),
                });
            }
            if agent.allow.is_empty() {
                return Err(PolicyFileError::EmptyAllowList {
                    agent_id: agent.id.clone(),
                });
            }
            for perm in &agent.allow {
                if perm.tool.is_empty() {
                    return Err(PolicyFileError::EmptyPermissionTool {
                        agent_id: agent.id.clone(),
                    });
                }
                if perm.actions.is_empty() {
                    return Err(PolicyFileError::EmptyPermissionActions {
                        agent_id: agent.id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn total_agents(&self) -> usize {
        self.agents.len()
    }
}
