// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Workflow Registry
//!
//! Groups ordered step tasks under a workflow record. Steps are created
//! through [`TaskRegistry::create_task`] with their own fields; the workflow
//! record and every task ↔ workflow link are written afterwards in one batch,
//! so readers never see a workflow with a partial step list.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::facts::entity_facts;
use crate::application::task_registry::TaskRegistry;
use crate::domain::error::{CoordinationError, CoordinationResult};
use crate::domain::events::WorkflowEvent;
use crate::domain::graph::{var, Direction, Group, Query, Term, Triple};
use crate::domain::ids::{AgentId, TaskId, WorkflowId};
use crate::domain::repository::GraphStore;
use crate::domain::task::{metadata_to_json, TaskStatus};
use crate::domain::vocabulary::{class, core, task, workflow};
use crate::domain::workflow::{
    CreatedWorkflow, NewWorkflow, WorkflowStatus, WorkflowStatusReport, WorkflowTask,
};
use crate::infrastructure::event_bus::EventBus;

#[derive(Clone)]
pub struct WorkflowRegistry {
    store: Arc<dyn GraphStore>,
    tasks: TaskRegistry,
    event_bus: EventBus,
}

impl WorkflowRegistry {
    pub fn new(store: Arc<dyn GraphStore>, tasks: TaskRegistry, event_bus: EventBus) -> Self {
        Self {
            store,
            tasks,
            event_bus,
        }
    }

    /// Create a workflow and one task per step, linked with 1-based step
    /// numbers. No dependencies are wired between steps.
    pub async fn create_workflow(
        &self,
        actor: &AgentId,
        new_workflow: NewWorkflow,
    ) -> CoordinationResult<CreatedWorkflow> {
        if new_workflow.name.trim().is_empty() {
            return Err(CoordinationError::malformed("workflow name must not be empty"));
        }
        let metadata = metadata_to_json(new_workflow.metadata.as_ref())?;
        // Reject bad steps before anything is written.
        for (index, step) in new_workflow.steps.iter().enumerate() {
            if step.name.trim().is_empty() {
                return Err(CoordinationError::malformed(format!(
                    "workflow step {} has no name",
                    index + 1
                )));
            }
            step.validated_dependencies()?;
            metadata_to_json(step.metadata.as_ref())?;
        }

        let workflow_id = WorkflowId::new();
        let mut task_ids = Vec::with_capacity(new_workflow.steps.len());
        for step in new_workflow.steps {
            task_ids.push(self.tasks.create_task(actor, step).await?);
        }

        let now = Utc::now();
        let w = workflow_id.as_str();
        let mut triples = vec![
            Triple::new(w, core::TYPE, Term::node(class::WORKFLOW)),
            Triple::new(w, workflow::NAME, Term::text(new_workflow.name.trim())),
            Triple::new(w, workflow::TYPE, Term::text(new_workflow.workflow_type.as_str())),
            Triple::new(w, core::CREATED_BY, actor.to_term()),
            Triple::new(w, core::CREATED_AT, Term::Timestamp(now)),
            Triple::new(w, core::METADATA, Term::Text(metadata)),
        ];
        for (index, task_id) in task_ids.iter().enumerate() {
            let t = task_id.as_str();
            triples.push(Triple::new(w, workflow::HAS_TASK, task_id.to_term()));
            triples.push(Triple::new(t, task::PART_OF_WORKFLOW, workflow_id.to_term()));
            triples.push(Triple::new(t, task::STEP_NUMBER, Term::Integer(index as i64 + 1)));
        }
        self.store.add_all(triples).await?;

        info!(
            workflow_id = %workflow_id,
            workflow_type = new_workflow.workflow_type.as_str(),
            steps = task_ids.len(),
            "Workflow created"
        );
        self.event_bus.publish_workflow_event(WorkflowEvent::WorkflowCreated {
            workflow_id: workflow_id.clone(),
            workflow_type: new_workflow.workflow_type,
            task_ids: task_ids.clone(),
            created_at: now,
        });

        Ok(CreatedWorkflow {
            workflow_id,
            task_ids,
        })
    }

    /// Current step statuses and the aggregate derived from them.
    pub async fn query_workflow_status(
        &self,
        workflow_id: &WorkflowId,
    ) -> CoordinationResult<WorkflowStatusReport> {
        let facts = entity_facts(
            self.store.as_ref(),
            "workflow",
            workflow_id.as_str(),
            class::WORKFLOW,
        )
        .await?;

        let query = Query::new(
            Group::new()
                .triple(workflow_id.as_str(), workflow::HAS_TASK, var("task"))
                .optional(Group::new().triple(var("task"), task::STEP_NUMBER, var("step")))
                .optional(Group::new().triple(var("task"), task::NAME, var("name")))
                .optional(Group::new().triple(var("task"), core::STATUS, var("status")))
                .optional(Group::new().triple(var("task"), task::ASSIGNED_TO, var("agent"))),
        )
        .order_by("step", Direction::Asc)
        .order_by("task", Direction::Asc);

        let rows = self.store.query(&query).await?;
        let mut tasks = Vec::with_capacity(rows.len());
        for row in &rows {
            let Some(task_id) = row.str("task") else { continue };
            let status: TaskStatus = match row.str("status").map(str::parse) {
                Some(Ok(status)) => status,
                _ => {
                    warn!(
                        workflow_id = %workflow_id,
                        task_id,
                        "Workflow task has no readable status"
                    );
                    continue;
                }
            };
            tasks.push(WorkflowTask {
                task_id: TaskId::from_raw(task_id),
                name: row.str("name").unwrap_or_default().to_string(),
                step: row
                    .integer("step")
                    .and_then(|n| u32::try_from(n).ok())
                    .unwrap_or_default(),
                status,
                assigned_to: row.str("agent").map(AgentId::from_raw),
            });
        }

        let statuses: Vec<TaskStatus> = tasks.iter().map(|t| t.status).collect();
        Ok(WorkflowStatusReport {
            workflow_id: workflow_id.clone(),
            name: facts.str(workflow::NAME).unwrap_or_default().to_string(),
            workflow_type: facts.str(workflow::TYPE).unwrap_or_default().to_string(),
            status: WorkflowStatus::derive(&statuses),
            total_tasks: tasks.len(),
            completed_tasks: statuses.iter().filter(|s| **s == TaskStatus::Completed).count(),
            tasks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::NewTask;
    use crate::domain::workflow::WorkflowType;
    use crate::infrastructure::graph_store::InMemoryGraphStore;

    fn registries() -> (WorkflowRegistry, TaskRegistry) {
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let bus = EventBus::new(16);
        let tasks = TaskRegistry::new(store.clone(), bus.clone());
        (WorkflowRegistry::new(store, tasks.clone(), bus), tasks)
    }

    #[tokio::test]
    async fn test_steps_are_numbered_in_order() {
        let (workflows, tasks) = registries();
        let actor = AgentId::new();
        let created = workflows
            .create_workflow(
                &actor,
                NewWorkflow::new("pipeline", WorkflowType::Sequential)
                    .step(NewTask::new("fetch", "io"))
                    .step(NewTask::new("parse", "cpu"))
                    .step(NewTask::new("store", "io")),
            )
            .await
            .unwrap();
        assert_eq!(created.task_ids.len(), 3);

        let report = workflows.query_workflow_status(&created.workflow_id).await.unwrap();
        assert_eq!(report.name, "pipeline");
        assert_eq!(report.workflow_type, "sequential");
        assert_eq!(report.status, WorkflowStatus::InProgress);
        let names: Vec<_> = report.tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["fetch", "parse", "store"]);
        assert_eq!(report.tasks[2].step, 3);

        let second = tasks.get_task(&created.task_ids[1]).await.unwrap();
        assert_eq!(second.workflow, Some(created.workflow_id.clone()));
        assert_eq!(second.step_number, Some(2));
        assert!(second.dependencies.is_empty());
    }

    #[tokio::test]
    async fn test_empty_workflow_is_unknown() {
        let (workflows, _) = registries();
        let created = workflows
            .create_workflow(&AgentId::new(), NewWorkflow::new("nothing", WorkflowType::Parallel))
            .await
            .unwrap();
        let report = workflows.query_workflow_status(&created.workflow_id).await.unwrap();
        assert_eq!(report.status, WorkflowStatus::Unknown);
        assert_eq!(report.total_tasks, 0);
    }

    #[tokio::test]
    async fn test_invalid_step_writes_nothing() {
        let store = Arc::new(InMemoryGraphStore::new());
        let bus = EventBus::new(4);
        let tasks = TaskRegistry::new(store.clone(), bus.clone());
        let workflows = WorkflowRegistry::new(store.clone(), tasks, bus);
        let err = workflows
            .create_workflow(
                &AgentId::new(),
                NewWorkflow::new("broken", WorkflowType::Sequential)
                    .step(NewTask::new("ok", "generic"))
                    .step(NewTask::new("", "generic")),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::domain::error::ErrorKind::MalformedInput);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_workflow_is_not_found() {
        let (workflows, _) = registries();
        let err = workflows.query_workflow_status(&WorkflowId::new()).await.unwrap_err();
        assert_eq!(err.kind(), crate::domain::error::ErrorKind::NotFound);
    }
}
