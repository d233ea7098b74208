// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Task Domain Model
//!
//! A task is a unit of work published to the fabric and claimed by exactly one
//! agent. Its lifecycle is `pending → in_progress → {completed, failed}`.
//!
//! "Blocked" is not a stored status: a pending task whose dependencies are not
//! all completed is reported as blocked by [`DependencyState`], and only by the
//! read-only dependency accessor. Claiming never consults dependencies.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Aggregate Root:** Task

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::CoordinationError;
use crate::domain::graph::{Facts, Term};
use crate::domain::ids::{AgentId, CapabilityId, TaskId, WorkflowId};
use crate::domain::vocabulary::{core, task};

// ============================================================================
// Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl FromStr for Priority {
    type Err = CoordinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(CoordinationError::malformed(format!(
                "unknown priority '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn to_term(self) -> Term {
        Term::text(self.as_str())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl FromStr for TaskStatus {
    type Err = CoordinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(CoordinationError::malformed(format!(
                "unknown task status '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// Fields accepted by `create_task`, also the payload of the `create_task`
/// coordinator message and of each workflow step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    #[serde(rename = "type", alias = "task_type", default = "default_task_type")]
    pub task_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, alias = "capabilities")]
    pub required_capabilities: Vec<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

fn default_task_type() -> String {
    "generic".to_string()
}

impl NewTask {
    pub fn new(name: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            task_type: task_type.into(),
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.required_capabilities.push(capability.into());
        self
    }

    pub fn with_dependency(mut self, dependency: &TaskId) -> Self {
        self.dependencies.push(dependency.to_string());
        self
    }

    pub fn validated_dependencies(&self) -> Result<Vec<TaskId>, CoordinationError> {
        self.dependencies.iter().map(|d| TaskId::parse(d)).collect()
    }

    /// Trimmed task type; blank falls back to `generic`.
    pub fn normalized_type(&self) -> String {
        match self.task_type.trim() {
            "" => default_task_type(),
            t => t.to_string(),
        }
    }

    pub fn capability_ids(&self) -> Vec<CapabilityId> {
        let mut ids: Vec<CapabilityId> = self
            .required_capabilities
            .iter()
            .filter(|c| !c.trim().is_empty())
            .map(|c| CapabilityId::from_any(c))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Normalise opaque metadata to its stored JSON text.
///
/// A JSON string is treated as already-serialised metadata and must parse.
pub fn metadata_to_json(metadata: Option<&Value>) -> Result<String, CoordinationError> {
    match metadata {
        None | Some(Value::Null) => Ok("{}".to_string()),
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)
            .map(|v| v.to_string())
            .map_err(|e| CoordinationError::malformed(format!("unparseable metadata: {}", e))),
        Some(other) => Ok(other.to_string()),
    }
}

/// Decode stored JSON text, falling back to the raw string.
pub fn json_or_raw(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Filters for `query_available_tasks`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskFilter {
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default, alias = "task_types")]
    pub types: Vec<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

// ============================================================================
// Read models
// ============================================================================

/// Full task record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub description: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub created_by: Option<AgentId>,
    pub created_at: Option<DateTime<Utc>>,
    pub dependencies: Vec<TaskId>,
    pub required_capabilities: Vec<CapabilityId>,
    pub assigned_to: Option<AgentId>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub failed_at: Option<DateTime<Utc>>,
    pub metadata: Value,
    pub workflow: Option<WorkflowId>,
    pub step_number: Option<u32>,
}

impl Task {
    /// Hydrate a task from its facts.
    pub fn from_facts(id: TaskId, facts: &Facts) -> Result<Self, CoordinationError> {
        let status: TaskStatus = facts
            .str(core::STATUS)
            .ok_or_else(|| CoordinationError::Internal(format!("task {} has no status", id)))?
            .parse()?;
        let priority: Priority = facts
            .str(core::PRIORITY)
            .map(str::parse)
            .transpose()?
            .unwrap_or_default();

        let mut dependencies: Vec<TaskId> = facts
            .all(task::DEPENDS_ON)
            .iter()
            .filter_map(Term::as_str)
            .map(TaskId::from_raw)
            .collect();
        dependencies.sort();

        let mut required_capabilities: Vec<CapabilityId> = facts
            .all(task::REQUIRES_CAPABILITY)
            .iter()
            .filter_map(Term::as_str)
            .map(CapabilityId::from_any)
            .collect();
        required_capabilities.sort();

        Ok(Self {
            name: facts.str(task::NAME).unwrap_or_default().to_string(),
            task_type: facts.str(task::TYPE).unwrap_or_default().to_string(),
            description: facts.str(core::DESCRIPTION).unwrap_or_default().to_string(),
            priority,
            status,
            created_by: facts.str(core::CREATED_BY).map(AgentId::from_raw),
            created_at: facts.timestamp(core::CREATED_AT),
            dependencies,
            required_capabilities,
            assigned_to: facts.str(task::ASSIGNED_TO).map(AgentId::from_raw),
            claimed_at: facts.timestamp(task::CLAIMED_AT),
            last_updated: facts.timestamp(core::LAST_UPDATED),
            result: facts.str(task::RESULT).map(json_or_raw),
            completed_at: facts.timestamp(task::COMPLETED_AT),
            error: facts.str(task::ERROR).map(str::to_string),
            failed_at: facts.timestamp(task::FAILED_AT),
            metadata: facts
                .str(core::METADATA)
                .map(json_or_raw)
                .unwrap_or(Value::Null),
            workflow: facts.str(task::PART_OF_WORKFLOW).map(WorkflowId::from_raw),
            step_number: facts
                .one(task::STEP_NUMBER)
                .and_then(Term::as_integer)
                .and_then(|n| u32::try_from(n).ok()),
            id,
        })
    }
}

/// Row returned by `query_available_tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_id: TaskId,
    pub name: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub description: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub required_capabilities: Vec<String>,
}

/// One-hop dependency view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyInfo {
    pub task_id: TaskId,
    pub name: Option<String>,
    pub status: Option<TaskStatus>,
}

/// Readiness of a task with respect to its direct dependencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DependencyState {
    Satisfied,
    /// Some dependencies are not completed yet (the informal "blocked").
    Waiting { pending: Vec<TaskId> },
    /// At least one dependency failed; the dependent stays claimable.
    Failed { failed: Vec<TaskId> },
}

impl DependencyState {
    pub fn evaluate(dependencies: &[DependencyInfo]) -> Self {
        let failed: Vec<TaskId> = dependencies
            .iter()
            .filter(|d| d.status == Some(TaskStatus::Failed))
            .map(|d| d.task_id.clone())
            .collect();
        if !failed.is_empty() {
            return Self::Failed { failed };
        }
        let pending: Vec<TaskId> = dependencies
            .iter()
            .filter(|d| d.status != Some(TaskStatus::Completed))
            .map(|d| d.task_id.clone())
            .collect();
        if pending.is_empty() {
            Self::Satisfied
        } else {
            Self::Waiting { pending }
        }
    }

    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }
}
