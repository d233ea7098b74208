// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::domain::capability::CapabilityRef;
use crate::domain::error::CoordinationError;
use crate::domain::graph::Term;
use crate::domain::ids::{AgentId, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Active,
    Inactive,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn to_term(self) -> Term {
        Term::text(self.as_str())
    }
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl FromStr for AgentStatus {
    type Err = CoordinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(CoordinationError::malformed(format!(
                "unknown agent status '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration payload for `create_agent_node`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAgent {
    pub name: String,
    #[serde(rename = "type", alias = "agent_type", default = "default_agent_type")]
    pub agent_type: String,
    /// Capability ids or literal capability names, stored as given.
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

fn default_agent_type() -> String {
    "worker".to_string()
}

impl NewAgent {
    pub fn new(name: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agent_type: agent_type.into(),
            ..Self::default()
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    pub fn capability_refs(&self) -> Vec<CapabilityRef> {
        let mut refs: Vec<CapabilityRef> = Vec::new();
        for raw in self.capabilities.iter().filter(|c| !c.trim().is_empty()) {
            let r = CapabilityRef::parse(raw);
            if !refs.contains(&r) {
                refs.push(r);
            }
        }
        refs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    #[serde(rename = "type")]
    pub agent_type: String,
    pub status: AgentStatus,
    pub capabilities: Vec<CapabilityRef>,
    pub assigned_tasks: Vec<TaskId>,
    pub working_on: Option<TaskId>,
    pub metadata: Value,
    pub created_at: Option<DateTime<Utc>>,
}

/// Result row of `discover_agents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent: AgentId,
    pub name: String,
    #[serde(rename = "type")]
    pub agent_type: String,
    pub capabilities: Vec<String>,
}

/// Discovery filter. `status` defaults to active.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentQuery {
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub status: AgentStatus,
}

impl AgentQuery {
    pub fn with_capabilities<I, S>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            status: AgentStatus::Active,
        }
    }
}
