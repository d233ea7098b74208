// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Coordination Tools
//!
//! Named operations reachable through the coordinator's `tool_call` verb.
//!
//! The registry is seeded with the built-in coordination tools (claiming,
//! status updates, inbox access, ...). Hosts can register their own
//! [`CoordinationTool`] implementations under new names, for example a client
//! for an external image-generation service. Names are unique: registering a
//! second tool under a taken name is rejected.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Tool lookup and invocation for agents

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::application::fabric::Fabric;
use crate::domain::agent::{AgentQuery, AgentStatus};
use crate::domain::capability::NewCapability;
use crate::domain::error::{CoordinationError, CoordinationResult};
use crate::domain::ids::{AgentId, MessageId, TaskId, WorkflowId};
use crate::domain::message::MessageFilter;
use crate::domain::task::TaskStatus;

/// Tool metadata for discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[async_trait]
pub trait CoordinationTool: Send + Sync {
    fn metadata(&self) -> ToolMetadata;

    async fn invoke(&self, actor: &AgentId, arguments: Value) -> CoordinationResult<Value>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<BTreeMap<String, Arc<dyn CoordinationTool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in tool bound to `fabric`.
    pub fn with_builtins(fabric: &Fabric) -> Self {
        let registry = Self::new();
        {
            let mut tools = registry.tools.write();
            for kind in BuiltinKind::ALL {
                tools.insert(
                    kind.name().to_string(),
                    Arc::new(BuiltinTool::new(*kind, fabric.clone())),
                );
            }
        }
        registry
    }

    pub fn register(&self, tool: Arc<dyn CoordinationTool>) -> CoordinationResult<()> {
        let name = tool.metadata().name;
        if name.trim().is_empty() {
            return Err(CoordinationError::malformed("tool name must not be empty"));
        }
        let mut tools = self.tools.write();
        if tools.contains_key(&name) {
            return Err(CoordinationError::PreconditionFailed(format!(
                "tool '{}' is already registered",
                name
            )));
        }
        debug!(tool = %name, "Registered coordination tool");
        tools.insert(name, tool);
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.read().keys().cloned().collect()
    }

    pub fn list(&self) -> Vec<ToolMetadata> {
        self.tools.read().values().map(|t| t.metadata()).collect()
    }

    pub async fn invoke(
        &self,
        actor: &AgentId,
        tool_name: &str,
        arguments: Value,
    ) -> CoordinationResult<Value> {
        let tool = self.tools.read().get(tool_name).cloned();
        let Some(tool) = tool else {
            return Err(CoordinationError::UnknownKey {
                field: "tool_name",
                value: tool_name.to_string(),
                known: self.names(),
            });
        };
        debug!(tool = tool_name, actor = %actor, "Invoking coordination tool");
        tool.invoke(actor, arguments).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    ClaimTask,
    ReleaseTask,
    UpdateTaskStatus,
    GetTask,
    AssignedTasks,
    GetTaskDependencies,
    CheckDependencies,
    QueryWorkflowStatus,
    QueryMessages,
    MarkMessageRead,
    CreateCapability,
    GetCapability,
    DiscoverAgents,
    SetAgentStatus,
}

impl BuiltinKind {
    pub const ALL: &'static [BuiltinKind] = &[
        Self::ClaimTask,
        Self::ReleaseTask,
        Self::UpdateTaskStatus,
        Self::GetTask,
        Self::AssignedTasks,
        Self::GetTaskDependencies,
        Self::CheckDependencies,
        Self::QueryWorkflowStatus,
        Self::QueryMessages,
        Self::MarkMessageRead,
        Self::CreateCapability,
        Self::GetCapability,
        Self::DiscoverAgents,
        Self::SetAgentStatus,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::ClaimTask => "claim_task",
            Self::ReleaseTask => "release_task",
            Self::UpdateTaskStatus => "update_task_status",
            Self::GetTask => "get_task",
            Self::AssignedTasks => "assigned_tasks",
            Self::GetTaskDependencies => "get_task_dependencies",
            Self::CheckDependencies => "check_dependencies",
            Self::QueryWorkflowStatus => "query_workflow_status",
            Self::QueryMessages => "query_messages",
            Self::MarkMessageRead => "mark_message_read",
            Self::CreateCapability => "create_capability",
            Self::GetCapability => "get_capability",
            Self::DiscoverAgents => "discover_agents",
            Self::SetAgentStatus => "set_agent_status",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Self::ClaimTask => "Claim a pending, unassigned task for the calling agent",
            Self::ReleaseTask => "Return a task you are working on to the pending pool",
            Self::UpdateTaskStatus => "Set a task status, recording a result or an error",
            Self::GetTask => "Read a full task record",
            Self::AssignedTasks => "List the tasks an agent is working on",
            Self::GetTaskDependencies => "List the direct dependencies of a task",
            Self::CheckDependencies => "Report whether the dependencies of a task are completed",
            Self::QueryWorkflowStatus => "Read the aggregate status of a workflow",
            Self::QueryMessages => "Read the calling agent's inbox",
            Self::MarkMessageRead => "Mark a message as read",
            Self::CreateCapability => "Define or update a capability",
            Self::GetCapability => "Read a capability by id or name",
            Self::DiscoverAgents => "Find agents by capability and status",
            Self::SetAgentStatus => "Mark an agent active or inactive",
        }
    }

    fn required(&self) -> &'static [&'static str] {
        match self {
            Self::ClaimTask
            | Self::ReleaseTask
            | Self::GetTask
            | Self::GetTaskDependencies
            | Self::CheckDependencies => &["task_id"],
            Self::UpdateTaskStatus => &["task_id", "status"],
            Self::QueryWorkflowStatus => &["workflow_id"],
            Self::MarkMessageRead => &["message_id"],
            Self::CreateCapability => &["name"],
            Self::GetCapability => &["capability"],
            Self::SetAgentStatus => &["status"],
            Self::QueryMessages | Self::DiscoverAgents | Self::AssignedTasks => &[],
        }
    }
}

/// A built-in tool bound to the fabric registries.
pub struct BuiltinTool {
    kind: BuiltinKind,
    fabric: Fabric,
}

impl BuiltinTool {
    pub fn new(kind: BuiltinKind, fabric: Fabric) -> Self {
        Self { kind, fabric }
    }
}

#[derive(Deserialize)]
struct TaskArgs {
    task_id: String,
}

#[derive(Deserialize)]
struct StatusArgs {
    task_id: String,
    status: String,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct WorkflowArgs {
    workflow_id: String,
}

#[derive(Deserialize)]
struct MessageArgs {
    message_id: String,
}

#[derive(Deserialize)]
struct CapabilityArgs {
    capability: String,
}

#[derive(Deserialize)]
struct AgentArgs {
    #[serde(default)]
    agent_id: Option<String>,
}

#[derive(Deserialize)]
struct AgentStatusArgs {
    #[serde(default)]
    agent_id: Option<String>,
    status: String,
}

/// `agent_id` when given, otherwise the caller.
fn agent_or_actor(agent_id: Option<&str>, actor: &AgentId) -> CoordinationResult<AgentId> {
    match agent_id {
        Some(raw) => AgentId::parse(raw),
        None => Ok(actor.clone()),
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> CoordinationResult<T> {
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments).map_err(|e| {
        CoordinationError::malformed(format!("invalid arguments for '{}': {}", tool, e))
    })
}

#[async_trait]
impl CoordinationTool for BuiltinTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: self.kind.name().to_string(),
            description: self.kind.description().to_string(),
            input_schema: json!({
                "type": "object",
                "required": self.kind.required(),
            }),
        }
    }

    async fn invoke(&self, actor: &AgentId, arguments: Value) -> CoordinationResult<Value> {
        let name = self.kind.name();
        let fabric = &self.fabric;
        match self.kind {
            BuiltinKind::ClaimTask => {
                let args: TaskArgs = parse_args(name, arguments)?;
                let task_id = TaskId::parse(&args.task_id)?;
                let claimed = fabric.tasks.claim_task(actor, &task_id).await?;
                Ok(json!({ "task_id": task_id, "claimed": claimed }))
            }
            BuiltinKind::ReleaseTask => {
                let args: TaskArgs = parse_args(name, arguments)?;
                let task_id = TaskId::parse(&args.task_id)?;
                let released = fabric.tasks.release_task(actor, &task_id).await?;
                Ok(json!({ "task_id": task_id, "released": released }))
            }
            BuiltinKind::UpdateTaskStatus => {
                let args: StatusArgs = parse_args(name, arguments)?;
                let task_id = TaskId::parse(&args.task_id)?;
                let status: TaskStatus = args.status.parse()?;
                fabric
                    .tasks
                    .update_task_status(&task_id, status, args.result, args.error)
                    .await?;
                Ok(json!({ "task_id": task_id, "status": status }))
            }
            BuiltinKind::GetTask => {
                let args: TaskArgs = parse_args(name, arguments)?;
                let task = fabric.tasks.get_task(&TaskId::parse(&args.task_id)?).await?;
                Ok(serde_json::to_value(task)?)
            }
            BuiltinKind::AssignedTasks => {
                let args: AgentArgs = parse_args(name, arguments)?;
                let agent_id = agent_or_actor(args.agent_id.as_deref(), actor)?;
                let tasks = fabric.tasks.tasks_assigned_to(&agent_id).await?;
                Ok(json!({ "agent_id": agent_id, "count": tasks.len(), "tasks": tasks }))
            }
            BuiltinKind::GetTaskDependencies => {
                let args: TaskArgs = parse_args(name, arguments)?;
                let task_id = TaskId::parse(&args.task_id)?;
                let dependencies = fabric.tasks.get_task_dependencies(&task_id).await?;
                Ok(json!({ "task_id": task_id, "dependencies": dependencies }))
            }
            BuiltinKind::CheckDependencies => {
                let args: TaskArgs = parse_args(name, arguments)?;
                let task_id = TaskId::parse(&args.task_id)?;
                let state = fabric.tasks.are_dependencies_satisfied(&task_id).await?;
                Ok(json!({
                    "task_id": task_id,
                    "satisfied": state.is_satisfied(),
                    "dependencies": state,
                }))
            }
            BuiltinKind::QueryWorkflowStatus => {
                let args: WorkflowArgs = parse_args(name, arguments)?;
                let report = fabric
                    .workflows
                    .query_workflow_status(&WorkflowId::parse(&args.workflow_id)?)
                    .await?;
                Ok(serde_json::to_value(report)?)
            }
            BuiltinKind::QueryMessages => {
                let filter: MessageFilter = parse_args(name, arguments)?;
                let messages = fabric.messages.query_messages(actor, &filter).await?;
                Ok(json!({ "count": messages.len(), "messages": messages }))
            }
            BuiltinKind::MarkMessageRead => {
                let args: MessageArgs = parse_args(name, arguments)?;
                let message_id = MessageId::parse(&args.message_id)?;
                fabric.messages.mark_message_read(actor, &message_id).await?;
                Ok(json!({ "message_id": message_id, "status": "read" }))
            }
            BuiltinKind::CreateCapability => {
                let new_capability: NewCapability = parse_args(name, arguments)?;
                let capability_id = fabric
                    .capabilities
                    .create_capability_node(new_capability)
                    .await?;
                Ok(json!({ "capability_id": capability_id }))
            }
            BuiltinKind::GetCapability => {
                let args: CapabilityArgs = parse_args(name, arguments)?;
                let capability = fabric.capabilities.get_capability(&args.capability).await?;
                Ok(serde_json::to_value(capability)?)
            }
            BuiltinKind::DiscoverAgents => {
                let query: AgentQuery = parse_args(name, arguments)?;
                let agents = fabric.agents.discover_agents(&query).await?;
                Ok(json!({ "count": agents.len(), "agents": agents }))
            }
            BuiltinKind::SetAgentStatus => {
                let args: AgentStatusArgs = parse_args(name, arguments)?;
                let agent_id = agent_or_actor(args.agent_id.as_deref(), actor)?;
                let status: AgentStatus = args.status.parse()?;
                fabric.agents.set_agent_status(&agent_id, status).await?;
                Ok(json!({ "agent_id": agent_id, "status": status }))
            }
        }
    }
}
