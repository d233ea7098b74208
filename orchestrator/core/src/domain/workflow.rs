// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Workflow Domain Model
//!
//! A workflow is an ordered group of tasks. Its type is a label only: the
//! fabric does not execute sequential, parallel or conditional workflows
//! differently, and it never wires dependencies between steps. Callers that
//! want ordering populate each step's `dependencies` themselves.
//!
//! Workflow status is *derived* from the statuses of its tasks on every read
//! and is never stored.
//!
//! # Architectural Context
//!
//! - **Layer:** Domain Layer
//! - **Aggregate Root:** Workflow (tasks remain their own aggregates)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::CoordinationError;
use crate::domain::ids::{AgentId, TaskId, WorkflowId};
use crate::domain::task::{NewTask, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowType {
    Sequential,
    Parallel,
    Conditional,
}

impl WorkflowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Conditional => "conditional",
        }
    }
}

impl Default for WorkflowType {
    fn default() -> Self {
        Self::Sequential
    }
}

impl FromStr for WorkflowType {
    type Err = CoordinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            "conditional" => Ok(Self::Conditional),
            other => Err(CoordinationError::malformed(format!(
                "unknown workflow type '{}'",
                other
            ))),
        }
    }
}

/// Aggregate status of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Completed,
    Failed,
    InProgress,
    Unknown,
}

impl WorkflowStatus {
    /// Derive the workflow status from its task statuses.
    ///
    /// Rules, first match wins:
    /// 1. no tasks → `Unknown`
    /// 2. any task failed → `Failed`
    /// 3. every task completed → `Completed`
    /// 4. any task pending or in progress → `InProgress`
    /// 5. otherwise → `Unknown`
    pub fn derive(statuses: &[TaskStatus]) -> Self {
        if statuses.is_empty() {
            return Self::Unknown;
        }
        if statuses.contains(&TaskStatus::Failed) {
            return Self::Failed;
        }
        if statuses.iter().all(|s| *s == TaskStatus::Completed) {
            return Self::Completed;
        }
        if statuses
            .iter()
            .any(|s| matches!(s, TaskStatus::Pending | TaskStatus::InProgress))
        {
            return Self::InProgress;
        }
        Self::Unknown
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::InProgress => "in_progress",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of `create_workflow`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewWorkflow {
    pub name: String,
    #[serde(rename = "type", alias = "workflow_type", default)]
    pub workflow_type: WorkflowType,
    #[serde(default)]
    pub steps: Vec<NewTask>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl NewWorkflow {
    pub fn new(name: impl Into<String>, workflow_type: WorkflowType) -> Self {
        Self {
            name: name.into(),
            workflow_type,
            ..Self::default()
        }
    }

    pub fn step(mut self, step: NewTask) -> Self {
        self.steps.push(step);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedWorkflow {
    pub workflow_id: WorkflowId,
    pub task_ids: Vec<TaskId>,
}

/// One step as seen by `query_workflow_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTask {
    pub task_id: TaskId,
    pub name: String,
    pub step: u32,
    pub status: TaskStatus,
    pub assigned_to: Option<AgentId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStatusReport {
    pub workflow_id: WorkflowId,
    pub name: String,
    #[serde(rename = "type")]
    pub workflow_type: String,
    pub status: WorkflowStatus,
    pub tasks: Vec<WorkflowTask>,
    pub total_tasks: usize,
    pub completed_tasks: usize,
}

impl WorkflowStatusReport {
    /// True when every task is pending and nobody holds a claim.
    pub fn looks_unstarted(&self) -> bool {
        !self.tasks.is_empty()
            && self
                .tasks
                .iter()
                .all(|t| t.status == TaskStatus::Pending && t.assigned_to.is_none())
    }
}
