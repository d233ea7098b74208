// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Coordinator
//!
//! Message-driven entry point over the fabric registries. A caller sends one
//! JSON message whose `message_type` selects the verb; fields are read from
//! `payload` when it is an object, otherwise from the message itself.
//!
//! | `message_type` | Result `data` |
//! |----------------|---------------|
//! | `create_task` | `{task_id}` |
//! | `create_workflow` | `{workflow_id, task_ids}` |
//! | `orchestrate_agents` | depends on `action` (`discover`, `broadcast`, `create_agent`) |
//! | `query_tasks` | `{tasks, count}` |
//! | `execute_workflow` | `{status: "started", ...}` or the workflow status report |
//! | `tool_call` | whatever the tool returns |
//!
//! [`Coordinator::dispatch`] never fails and never unwinds: registry errors
//! and handler panics both come back as [`CoordinatorResponse::Error`].

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::application::fabric::Fabric;
use crate::application::tools::ToolRegistry;
use crate::domain::agent::{AgentQuery, NewAgent};
use crate::domain::error::{CoordinationError, CoordinationResult, ErrorKind};
use crate::domain::events::WorkflowEvent;
use crate::domain::ids::{AgentId, TaskId, WorkflowId};
use crate::domain::message::TASK_AVAILABLE;
use crate::domain::task::{NewTask, TaskFilter};
use crate::domain::workflow::NewWorkflow;

pub const MESSAGE_TYPES: &[&str] = &[
    "create_task",
    "create_workflow",
    "orchestrate_agents",
    "query_tasks",
    "execute_workflow",
    "tool_call",
];

pub const AGENT_ACTIONS: &[&str] = &["discover", "broadcast", "create_agent"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_keys: Option<Vec<String>>,
}

impl From<&CoordinationError> for ErrorBody {
    fn from(err: &CoordinationError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            retryable: err.is_retryable(),
            known_keys: err.known_keys().map(<[String]>::to_vec),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CoordinatorResponse {
    Success {
        message_type: String,
        data: Value,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_type: Option<String>,
        error: ErrorBody,
    },
}

impl CoordinatorResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Success { data, .. } => Some(data),
            Self::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorBody> {
        match self {
            Self::Success { .. } => None,
            Self::Error { error, .. } => Some(error),
        }
    }
}

#[derive(Deserialize)]
struct AgentAction {
    action: String,
}

#[derive(Deserialize)]
struct BroadcastRequest {
    #[serde(rename = "type", alias = "broadcast_type")]
    message_type: String,
    #[serde(default)]
    content: Value,
    #[serde(default, alias = "capabilities")]
    target_capabilities: Vec<String>,
}

#[derive(Deserialize)]
struct ExecuteWorkflowRequest {
    workflow_id: String,
}

#[derive(Deserialize)]
struct ToolCallRequest {
    tool_name: String,
    #[serde(default)]
    arguments: Value,
}

/// One step of a started workflow and the agents hinted for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepAssignment {
    pub task_id: TaskId,
    pub step: u32,
    pub agents: Vec<AgentId>,
    pub message_id: String,
}

#[derive(Clone)]
pub struct Coordinator {
    fabric: Fabric,
    tools: Arc<ToolRegistry>,
}

impl Coordinator {
    /// Coordinator with only the built-in tools.
    pub fn new(fabric: Fabric) -> Self {
        let tools = Arc::new(ToolRegistry::with_builtins(&fabric));
        Self { fabric, tools }
    }

    pub fn with_tools(fabric: Fabric, tools: Arc<ToolRegistry>) -> Self {
        Self { fabric, tools }
    }

    pub fn fabric(&self) -> &Fabric {
        &self.fabric
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub async fn dispatch(&self, actor: &AgentId, message: Value) -> CoordinatorResponse {
        let message_type = message
            .get("message_type")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string());

        let outcome = AssertUnwindSafe(self.route(actor, message_type.as_deref(), &message))
            .catch_unwind()
            .await;
        let result = match outcome {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic_reason(panic.as_ref());
                error!(
                    actor = %actor,
                    message_type = ?message_type,
                    reason = %reason,
                    "Coordinator handler panicked"
                );
                Err(CoordinationError::Internal(format!("handler panicked: {}", reason)))
            }
        };

        let label = message_type.clone().unwrap_or_else(|| "missing".to_string());
        match result {
            Ok(data) => {
                metrics::counter!(
                    "aegis_fabric_dispatch_total",
                    "message_type" => label.clone(),
                    "status" => "success"
                )
                .increment(1);
                debug!(actor = %actor, message_type = %label, "Dispatch succeeded");
                CoordinatorResponse::Success {
                    message_type: label,
                    data,
                }
            }
            Err(err) => {
                metrics::counter!(
                    "aegis_fabric_dispatch_total",
                    "message_type" => label,
                    "status" => "error"
                )
                .increment(1);
                warn!(
                    actor = %actor,
                    message_type = ?message_type,
                    kind = %err.kind(),
                    error = %err,
                    "Dispatch failed"
                );
                CoordinatorResponse::Error {
                    message_type,
                    error: ErrorBody::from(&err),
                }
            }
        }
    }

    async fn route(
        &self,
        actor: &AgentId,
        message_type: Option<&str>,
        message: &Value,
    ) -> CoordinationResult<Value> {
        let Some(message_type) = message_type else {
            return Err(CoordinationError::malformed("message has no string 'message_type'"));
        };
        let payload = match message.get("payload") {
            Some(payload @ Value::Object(_)) => payload.clone(),
            _ => message.clone(),
        };

        match message_type {
            "create_task" => {
                let new_task: NewTask = serde_json::from_value(payload)?;
                let task_id = self.fabric.tasks.create_task(actor, new_task).await?;
                Ok(json!({ "task_id": task_id }))
            }
            "create_workflow" => {
                let new_workflow: NewWorkflow = serde_json::from_value(payload)?;
                let created = self.fabric.workflows.create_workflow(actor, new_workflow).await?;
                Ok(serde_json::to_value(created)?)
            }
            "orchestrate_agents" => self.orchestrate_agents(actor, payload).await,
            "query_tasks" => {
                let filter: TaskFilter = serde_json::from_value(payload)?;
                let tasks = self.fabric.tasks.query_available_tasks(&filter).await?;
                Ok(json!({ "count": tasks.len(), "tasks": tasks }))
            }
            "execute_workflow" => {
                let request: ExecuteWorkflowRequest = serde_json::from_value(payload)?;
                let workflow_id = WorkflowId::parse(&request.workflow_id)?;
                self.execute_workflow(actor, &workflow_id).await
            }
            "tool_call" => {
                let request: ToolCallRequest = serde_json::from_value(payload)?;
                self.tools.invoke(actor, request.tool_name.trim(), request.arguments).await
            }
            other => Err(CoordinationError::UnknownKey {
                field: "message_type",
                value: other.to_string(),
                known: MESSAGE_TYPES.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }

    async fn orchestrate_agents(
        &self,
        actor: &AgentId,
        payload: Value,
    ) -> CoordinationResult<Value> {
        let AgentAction { action } = serde_json::from_value(payload.clone())?;
        match action.trim() {
            "discover" => {
                let query: AgentQuery = serde_json::from_value(payload)?;
                let agents = self.fabric.agents.discover_agents(&query).await?;
                Ok(json!({ "count": agents.len(), "agents": agents }))
            }
            "broadcast" => {
                let request: BroadcastRequest = serde_json::from_value(payload)?;
                let message_id = self
                    .fabric
                    .messages
                    .broadcast_message(
                        actor,
                        &request.message_type,
                        &request.content,
                        &request.target_capabilities,
                    )
                    .await?;
                Ok(json!({ "message_id": message_id }))
            }
            "create_agent" => {
                let new_agent: NewAgent = serde_json::from_value(payload)?;
                let agent_id = self.fabric.agents.create_agent_node(new_agent).await?;
                Ok(json!({ "agent_id": agent_id }))
            }
            other => Err(CoordinationError::UnknownKey {
                field: "action",
                value: other.to_string(),
                known: AGENT_ACTIONS.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }

    /// Start an unstarted workflow: hint capable agents for each step and
    /// announce every step with a `task_available` message. A workflow with
    /// any claimed or progressed step only reports its status.
    pub async fn execute_workflow(
        &self,
        actor: &AgentId,
        workflow_id: &WorkflowId,
    ) -> CoordinationResult<Value> {
        let report = self.fabric.workflows.query_workflow_status(workflow_id).await?;
        if !report.looks_unstarted() {
            debug!(
                workflow_id = %workflow_id,
                status = %report.status,
                "Workflow already started, reporting status"
            );
            return Ok(serde_json::to_value(report)?);
        }

        let mut hints = Vec::new();
        let mut assignments = Vec::with_capacity(report.tasks.len());
        for step in &report.tasks {
            let task = self.fabric.tasks.get_task(&step.task_id).await?;
            let capabilities: Vec<String> = task
                .required_capabilities
                .iter()
                .map(|c| c.to_string())
                .collect();

            // No requirements means no hint target; the announcement becomes a broadcast.
            let agents: Vec<AgentId> = if capabilities.is_empty() {
                Vec::new()
            } else {
                self.fabric
                    .agents
                    .discover_agents(&AgentQuery::with_capabilities(capabilities.iter().cloned()))
                    .await?
                    .into_iter()
                    .map(|a| a.agent)
                    .collect()
            };
            hints.extend(agents.iter().map(|a| (a.clone(), step.task_id.clone())));

            let message_id = self
                .fabric
                .messages
                .broadcast_message(
                    actor,
                    TASK_AVAILABLE,
                    &json!({
                        "task_id": step.task_id,
                        "workflow_id": workflow_id,
                        "name": step.name,
                        "step": step.step,
                        "required_capabilities": capabilities,
                    }),
                    &capabilities,
                )
                .await?;
            assignments.push(StepAssignment {
                task_id: step.task_id.clone(),
                step: step.step,
                agents,
                message_id: message_id.to_string(),
            });
        }
        self.fabric.agents.record_assignment_hints(&hints).await?;

        info!(
            workflow_id = %workflow_id,
            steps = assignments.len(),
            hints = hints.len(),
            "Workflow started"
        );
        self.fabric.event_bus.publish_workflow_event(WorkflowEvent::WorkflowStarted {
            workflow_id: workflow_id.clone(),
            hinted_assignments: hints.len(),
            started_at: chrono::Utc::now(),
        });

        Ok(json!({
            "status": "started",
            "workflow_id": workflow_id,
            "assignments": assignments,
        }))
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tools::{CoordinationTool, ToolMetadata};
    use crate::domain::message::MessageFilter;
    use crate::infrastructure::event_bus::EventBus;
    use crate::infrastructure::graph_store::InMemoryGraphStore;
    use async_trait::async_trait;

    fn coordinator() -> Coordinator {
        Coordinator::new(Fabric::new(Arc::new(InMemoryGraphStore::new()), EventBus::new(32)))
    }

    struct Exploding;

    #[async_trait]
    impl CoordinationTool for Exploding {
        fn metadata(&self) -> ToolMetadata {
            ToolMetadata {
                name: "explode".into(),
                description: "always panics".into(),
                input_schema: json!({}),
            }
        }

        async fn invoke(&self, _actor: &AgentId, _arguments: Value) -> CoordinationResult<Value> {
            panic!("boom")
        }
    }

    #[tokio::test]
    async fn test_payload_or_inline_fields() {
        let c = coordinator();
        let actor = AgentId::new();
        let nested = c
            .dispatch(
                &actor,
                json!({"message_type": "create_task", "payload": {"name": "a", "type": "io"}}),
            )
            .await;
        let inline = c
            .dispatch(
                &actor,
                json!({"message_type": "create_task", "name": "b", "priority": "high"}),
            )
            .await;
        assert!(nested.is_success());
        assert!(inline.is_success());

        let listed = c.dispatch(&actor, json!({"message_type": "query_tasks"})).await;
        let data = listed.data().unwrap();
        assert_eq!(data["count"], 2);
        assert_eq!(data["tasks"][0]["name"], "b");
    }

    #[tokio::test]
    async fn test_unknown_message_type_and_action_list_known_keys() {
        let c = coordinator();
        let actor = AgentId::new();

        let response = c.dispatch(&actor, json!({"message_type": "launch"})).await;
        let error = response.error().unwrap();
        assert_eq!(error.kind, ErrorKind::MalformedInput);
        assert_eq!(error.known_keys.as_ref().unwrap().len(), MESSAGE_TYPES.len());

        let response = c
            .dispatch(&actor, json!({"message_type": "orchestrate_agents", "action": "fire"}))
            .await;
        let known = response.error().unwrap().known_keys.clone().unwrap();
        assert_eq!(known, vec!["discover", "broadcast", "create_agent"]);

        let response = c.dispatch(&actor, json!({"payload": {}})).await;
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_panicking_tool_becomes_internal_error() {
        let c = coordinator();
        c.tools().register(Arc::new(Exploding)).unwrap();
        let response = c
            .dispatch(
                &AgentId::new(),
                json!({"message_type": "tool_call", "tool_name": "explode"}),
            )
            .await;
        let error = response.error().unwrap();
        assert_eq!(error.kind, ErrorKind::Internal);
        assert!(error.message.contains("boom"));
    }

    #[tokio::test]
    async fn test_execute_workflow_hints_and_announces_once() {
        let c = coordinator();
        let owner = AgentId::new();
        let painter = c
            .fabric()
            .agents
            .create_agent_node(NewAgent::new("painter", "llm").with_capability("drawing"))
            .await
            .unwrap();
        let created = c
            .dispatch(
                &owner,
                json!({
                    "message_type": "create_workflow",
                    "payload": {
                        "name": "poster",
                        "type": "sequential",
                        "steps": [
                            {"name": "sketch", "required_capabilities": ["drawing"]},
                            {"name": "print"}
                        ]
                    }
                }),
            )
            .await;
        let workflow_id = created.data().unwrap()["workflow_id"].clone();

        let started = c
            .dispatch(
                &owner,
                json!({"message_type": "execute_workflow", "workflow_id": workflow_id}),
            )
            .await;
        let data = started.data().unwrap();
        assert_eq!(data["status"], "started");
        assert_eq!(data["assignments"][0]["agents"][0], json!(painter));
        assert_eq!(data["assignments"][1]["agents"], json!([]));

        let agent = c.fabric().agents.get_agent(&painter).await.unwrap();
        assert_eq!(agent.assigned_tasks.len(), 1);

        let inbox = c
            .fabric()
            .messages
            .query_messages(&painter, &MessageFilter::unread().of_type(TASK_AVAILABLE))
            .await
            .unwrap();
        assert_eq!(inbox.len(), 2);

        // Claiming a step means the workflow has started; execute only reports.
        let task_id = TaskId::parse(data["assignments"][0]["task_id"].as_str().unwrap()).unwrap();
        assert!(c.fabric().tasks.claim_task(&painter, &task_id).await.unwrap());
        let again = c
            .dispatch(
                &owner,
                json!({"message_type": "execute_workflow", "workflow_id": workflow_id}),
            )
            .await;
        assert_eq!(again.data().unwrap()["status"], "in_progress");
    }
}
