// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{AgentId, CapabilityId, MessageId, TaskId, WorkflowId};
use crate::domain::task::TaskStatus;
use crate::domain::workflow::WorkflowType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskEvent {
    TaskCreated {
        task_id: TaskId,
        task_type: String,
        created_by: AgentId,
        workflow_id: Option<WorkflowId>,
        created_at: DateTime<Utc>,
    },
    TaskClaimed {
        task_id: TaskId,
        agent_id: AgentId,
        claimed_at: DateTime<Utc>,
    },
    /// A claim attempt lost the race or hit a non-pending task.
    ClaimRejected {
        task_id: TaskId,
        agent_id: AgentId,
        rejected_at: DateTime<Utc>,
    },
    TaskReleased {
        task_id: TaskId,
        agent_id: AgentId,
        released_at: DateTime<Utc>,
    },
    TaskStatusChanged {
        task_id: TaskId,
        status: TaskStatus,
        changed_at: DateTime<Utc>,
    },
}

impl TaskEvent {
    pub fn task_id(&self) -> &TaskId {
        match self {
            Self::TaskCreated { task_id, .. }
            | Self::TaskClaimed { task_id, .. }
            | Self::ClaimRejected { task_id, .. }
            | Self::TaskReleased { task_id, .. }
            | Self::TaskStatusChanged { task_id, .. } => task_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkflowEvent {
    WorkflowCreated {
        workflow_id: WorkflowId,
        workflow_type: WorkflowType,
        task_ids: Vec<TaskId>,
        created_at: DateTime<Utc>,
    },
    WorkflowStarted {
        workflow_id: WorkflowId,
        hinted_assignments: usize,
        started_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AgentEvent {
    AgentRegistered {
        agent_id: AgentId,
        capabilities: Vec<CapabilityId>,
        registered_at: DateTime<Utc>,
    },
    AgentStatusChanged {
        agent_id: AgentId,
        active: bool,
        changed_at: DateTime<Utc>,
    },
    CapabilityDefined {
        capability_id: CapabilityId,
        defined_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessageEvent {
    MessageBroadcast {
        message_id: MessageId,
        message_type: String,
        sender: AgentId,
        targets: Vec<CapabilityId>,
        sent_at: DateTime<Utc>,
    },
    MessageRead {
        message_id: MessageId,
        reader: AgentId,
        read_at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_events_serialize_with_variant_name() {
        let event = TaskEvent::TaskClaimed {
            task_id: TaskId::new(),
            agent_id: AgentId::new(),
            claimed_at: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("TaskClaimed"));
        let back: TaskEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.task_id(), event.task_id());
    }
}
