// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Task Registry
//!
//! Creates task records, lists claimable work and drives the task lifecycle.
//! Every check-then-act sequence is expressed as a single [`GuardedUpdate`] so
//! concurrent agents racing for the same task can never both win.
//!
//! Dependencies are advisory: [`TaskRegistry::claim_task`] does not consult
//! them, callers that care ask [`TaskRegistry::are_dependencies_satisfied`].

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

const STATUS_UPDATE_ATTEMPTS: usize = 3;

use crate::application::facts::{entity_facts, is_instance, LIST_SEPARATOR};
use crate::domain::error::{CoordinationError, CoordinationResult};
use crate::domain::events::TaskEvent;
use crate::domain::graph::{
    var, Aggregate, Direction, Filter, Group, Guard, GuardedUpdate, Query, Row, Term, Triple,
};
use crate::domain::ids::{AgentId, CapabilityId, TaskId};
use crate::domain::repository::GraphStore;
use crate::domain::task::{
    metadata_to_json, DependencyInfo, DependencyState, NewTask, Task, TaskFilter, TaskStatus,
    TaskSummary,
};
use crate::domain::vocabulary::{agent, class, core, task};
use crate::infrastructure::event_bus::EventBus;

#[derive(Clone)]
pub struct TaskRegistry {
    store: Arc<dyn GraphStore>,
    event_bus: EventBus,
}

impl TaskRegistry {
    pub fn new(store: Arc<dyn GraphStore>, event_bus: EventBus) -> Self {
        Self { store, event_bus }
    }

    /// Publish a new pending task. All attributes land in one batch.
    pub async fn create_task(
        &self,
        actor: &AgentId,
        new_task: NewTask,
    ) -> CoordinationResult<TaskId> {
        if new_task.name.trim().is_empty() {
            return Err(CoordinationError::malformed("task name must not be empty"));
        }
        let task_type = new_task.normalized_type();
        let dependencies = new_task.validated_dependencies()?;
        let metadata = metadata_to_json(new_task.metadata.as_ref())?;

        let id = TaskId::new();
        let now = Utc::now();
        let s = id.as_str();

        let mut triples = vec![
            Triple::new(s, core::TYPE, Term::node(class::TASK)),
            Triple::new(s, task::NAME, Term::text(new_task.name.trim())),
            Triple::new(s, task::TYPE, Term::text(task_type.clone())),
            Triple::new(s, core::DESCRIPTION, Term::text(new_task.description.clone())),
            Triple::new(s, core::PRIORITY, Term::text(new_task.priority.as_str())),
            Triple::new(s, core::STATUS, TaskStatus::Pending.to_term()),
            Triple::new(s, core::CREATED_BY, actor.to_term()),
            Triple::new(s, core::CREATED_AT, Term::Timestamp(now)),
            Triple::new(s, core::LAST_UPDATED, Term::Timestamp(now)),
            Triple::new(s, core::METADATA, Term::Text(metadata)),
        ];
        triples.extend(
            dependencies
                .iter()
                .map(|dep| Triple::new(s, task::DEPENDS_ON, dep.to_term())),
        );
        triples.extend(
            new_task
                .capability_ids()
                .iter()
                .map(|cap| Triple::new(s, task::REQUIRES_CAPABILITY, cap.to_term())),
        );

        self.store.add_all(triples).await?;

        info!(
            task_id = %id,
            task_type = %task_type,
            priority = %new_task.priority,
            created_by = %actor,
            "Task created"
        );
        self.event_bus.publish_task_event(TaskEvent::TaskCreated {
            task_id: id.clone(),
            task_type,
            created_by: actor.clone(),
            workflow_id: None,
            created_at: now,
        });
        Ok(id)
    }

    pub async fn get_task(&self, task_id: &TaskId) -> CoordinationResult<Task> {
        let facts =
            entity_facts(self.store.as_ref(), "task", task_id.as_str(), class::TASK).await?;
        Task::from_facts(task_id.clone(), &facts)
    }

    /// Pending, unassigned tasks matching the filter, most urgent first.
    ///
    /// Capabilities and types are each OR-ed; the groups are AND-ed together
    /// with the priority.
    pub async fn query_available_tasks(
        &self,
        filter: &TaskFilter,
    ) -> CoordinationResult<Vec<TaskSummary>> {
        let wanted_caps: Vec<Term> = filter
            .capabilities
            .iter()
            .map(|c| CapabilityId::from_any(c).to_term())
            .collect();
        let wanted_types: Vec<Term> =
            filter.types.iter().map(|t| Term::text(t.trim())).collect();

        let base = Group::new()
            .triple(var("task"), core::TYPE, Term::node(class::TASK))
            .triple(var("task"), core::STATUS, TaskStatus::Pending.to_term())
            .not_exists(Group::new().triple(var("task"), task::ASSIGNED_TO, var("assignee")))
            .when(!wanted_caps.is_empty(), |g| {
                g.exists(
                    Group::new()
                        .triple(var("task"), task::REQUIRES_CAPABILITY, var("wanted"))
                        .filter(Filter::is_in("wanted", wanted_caps.clone())),
                )
            });

        let extra = Group::new().when(!wanted_types.is_empty(), |g| {
            g.filter(Filter::is_in("type", wanted_types.clone()))
        });
        let extra = match filter.priority {
            Some(p) => extra.filter(Filter::eq("priority", Term::text(p.as_str()))),
            None => extra,
        };

        let rows = self.store.query(&summary_query(base, extra)).await?;
        let mut tasks: Vec<TaskSummary> = rows.iter().filter_map(summary_from_row).collect();
        sort_by_urgency(&mut tasks);

        debug!(count = tasks.len(), "Queried available tasks");
        Ok(tasks)
    }

    /// Tasks currently assigned to an agent.
    pub async fn tasks_assigned_to(
        &self,
        agent_id: &AgentId,
    ) -> CoordinationResult<Vec<TaskSummary>> {
        let base = Group::new()
            .triple(var("task"), task::ASSIGNED_TO, agent_id.to_term())
            .triple(var("task"), core::TYPE, Term::node(class::TASK));
        let rows = self.store.query(&summary_query(base, Group::new())).await?;
        let mut tasks: Vec<TaskSummary> = rows.iter().filter_map(summary_from_row).collect();
        sort_by_urgency(&mut tasks);
        Ok(tasks)
    }

    /// Claim a pending, unassigned task.
    ///
    /// Returns `Ok(false)` when the task exists but is already taken or no
    /// longer pending, and `NotFound` when it does not exist at all.
    pub async fn claim_task(
        &self,
        actor: &AgentId,
        task_id: &TaskId,
    ) -> CoordinationResult<bool> {
        let now = Utc::now();
        let t = task_id.as_str();
        let update = GuardedUpdate::new()
            .guard(Guard::holds(t, core::TYPE, Term::node(class::TASK)))
            .guard(Guard::holds(t, core::STATUS, TaskStatus::Pending.to_term()))
            .guard(Guard::absent(t, task::ASSIGNED_TO))
            .replace(t, core::STATUS, TaskStatus::InProgress.to_term())
            .add(t, task::ASSIGNED_TO, actor.to_term())
            .replace(t, task::CLAIMED_AT, Term::Timestamp(now))
            .replace(t, core::LAST_UPDATED, Term::Timestamp(now))
            .replace(actor.as_str(), agent::WORKING_ON, task_id.to_term());

        if self.store.apply(update).await? {
            metrics::counter!("aegis_fabric_claims_total", "outcome" => "claimed").increment(1);
            info!(task_id = %task_id, agent_id = %actor, "Task claimed");
            self.event_bus.publish_task_event(TaskEvent::TaskClaimed {
                task_id: task_id.clone(),
                agent_id: actor.clone(),
                claimed_at: now,
            });
            return Ok(true);
        }

        if !is_instance(self.store.as_ref(), t, class::TASK).await? {
            metrics::counter!("aegis_fabric_claims_total", "outcome" => "not_found").increment(1);
            return Err(CoordinationError::not_found("task", task_id));
        }

        metrics::counter!("aegis_fabric_claims_total", "outcome" => "rejected").increment(1);
        debug!(task_id = %task_id, agent_id = %actor, "Claim rejected");
        self.event_bus.publish_task_event(TaskEvent::ClaimRejected {
            task_id: task_id.clone(),
            agent_id: actor.clone(),
            rejected_at: now,
        });
        Ok(false)
    }

    /// Hand an in-progress task back to the pool. Only the claimant may
    /// release; anyone else gets `Ok(false)`.
    pub async fn release_task(
        &self,
        actor: &AgentId,
        task_id: &TaskId,
    ) -> CoordinationResult<bool> {
        let now = Utc::now();
        let t = task_id.as_str();
        let update = GuardedUpdate::new()
            .guard(Guard::holds(t, task::ASSIGNED_TO, actor.to_term()))
            .guard(Guard::holds(t, core::STATUS, TaskStatus::InProgress.to_term()))
            .remove(t, task::ASSIGNED_TO, None)
            .remove(t, task::CLAIMED_AT, None)
            .replace(t, core::STATUS, TaskStatus::Pending.to_term())
            .replace(t, core::LAST_UPDATED, Term::Timestamp(now))
            .remove(actor.as_str(), agent::WORKING_ON, Some(task_id.to_term()));

        if self.store.apply(update).await? {
            info!(task_id = %task_id, agent_id = %actor, "Task released");
            self.event_bus.publish_task_event(TaskEvent::TaskReleased {
                task_id: task_id.clone(),
                agent_id: actor.clone(),
                released_at: now,
            });
            return Ok(true);
        }

        if !is_instance(self.store.as_ref(), t, class::TASK).await? {
            return Err(CoordinationError::not_found("task", task_id));
        }
        Ok(false)
    }

    /// Replace the task status. `result` is recorded for completed tasks and
    /// `error` for failed ones; both are ignored for other statuses.
    ///
    /// Moving a task back to `pending` drops its claim so it can be claimed
    /// again. Completed and failed tasks keep `assignedTo` as a record, but
    /// the claimant's `workingOn` edge is removed.
    pub async fn update_task_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
        result: Option<Value>,
        error: Option<String>,
    ) -> CoordinationResult<()> {
        if matches!(status, TaskStatus::Pending | TaskStatus::InProgress)
            && (result.is_some() || error.is_some())
        {
            warn!(
                task_id = %task_id,
                status = %status,
                "Ignoring result/error for non-terminal status"
            );
        }

        for _ in 0..STATUS_UPDATE_ATTEMPTS {
            let now = Utc::now();
            let assignee = self.current_assignee(task_id).await?;
            let update =
                status_update(task_id, assignee.as_ref(), status, &result, &error, now);

            if self.store.apply(update).await? {
                info!(task_id = %task_id, status = %status, "Task status updated");
                self.event_bus.publish_task_event(TaskEvent::TaskStatusChanged {
                    task_id: task_id.clone(),
                    status,
                    changed_at: now,
                });
                return Ok(());
            }

            if !is_instance(self.store.as_ref(), task_id.as_str(), class::TASK).await? {
                return Err(CoordinationError::not_found("task", task_id));
            }
            debug!(task_id = %task_id, "Assignee changed during status update, retrying");
        }

        Err(CoordinationError::PreconditionFailed(format!(
            "task {} kept changing hands during status update",
            task_id
        )))
    }

    async fn current_assignee(&self, task_id: &TaskId) -> CoordinationResult<Option<AgentId>> {
        let query = Query::new(Group::new().triple(
            task_id.as_str(),
            task::ASSIGNED_TO,
            var("agent"),
        ))
        .limit(1);
        let rows = self.store.query(&query).await?;
        Ok(rows.first().and_then(|row| row.str("agent")).map(AgentId::from_raw))
    }

    /// Direct dependencies of a task (one hop).
    pub async fn get_task_dependencies(
        &self,
        task_id: &TaskId,
    ) -> CoordinationResult<Vec<DependencyInfo>> {
        if !is_instance(self.store.as_ref(), task_id.as_str(), class::TASK).await? {
            return Err(CoordinationError::not_found("task", task_id));
        }

        let query = Query::new(
            Group::new()
                .triple(task_id.as_str(), task::DEPENDS_ON, var("dep"))
                .optional(Group::new().triple(var("dep"), task::NAME, var("name")))
                .optional(Group::new().triple(var("dep"), core::STATUS, var("status"))),
        )
        .order_by("dep", Direction::Asc);

        let rows = self.store.query(&query).await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(DependencyInfo {
                    task_id: TaskId::from_raw(row.str("dep")?),
                    name: row.str("name").map(str::to_string),
                    status: row.str("status").and_then(|s| s.parse().ok()),
                })
            })
            .collect())
    }

    /// Read-only readiness check; never consulted by claiming.
    pub async fn are_dependencies_satisfied(
        &self,
        task_id: &TaskId,
    ) -> CoordinationResult<DependencyState> {
        let dependencies = self.get_task_dependencies(task_id).await?;
        Ok(DependencyState::evaluate(&dependencies))
    }
}

/// Status replacement guarded on the assignee read just before it.
fn status_update(
    task_id: &TaskId,
    assignee: Option<&AgentId>,
    status: TaskStatus,
    result: &Option<Value>,
    error: &Option<String>,
    now: DateTime<Utc>,
) -> GuardedUpdate {
    let t = task_id.as_str();
    let mut update = GuardedUpdate::new()
        .guard(Guard::holds(t, core::TYPE, Term::node(class::TASK)))
        .guard(match assignee {
            Some(agent_id) => Guard::holds(t, task::ASSIGNED_TO, agent_id.to_term()),
            None => Guard::absent(t, task::ASSIGNED_TO),
        })
        .replace(t, core::STATUS, status.to_term())
        .replace(t, core::LAST_UPDATED, Term::Timestamp(now));

    match status {
        TaskStatus::Completed => {
            if let Some(result) = result {
                update = update.replace(t, task::RESULT, Term::text(result.to_string()));
            }
            update = update.replace(t, task::COMPLETED_AT, Term::Timestamp(now));
        }
        TaskStatus::Failed => {
            if let Some(error) = error {
                update = update.replace(t, task::ERROR, Term::text(error.clone()));
            }
            update = update.replace(t, task::FAILED_AT, Term::Timestamp(now));
        }
        TaskStatus::Pending => {
            update = update
                .remove(t, task::ASSIGNED_TO, None)
                .remove(t, task::CLAIMED_AT, None);
        }
        TaskStatus::InProgress => {}
    }

    if let Some(agent_id) = assignee {
        if status.is_terminal() || status == TaskStatus::Pending {
            update = update.remove(agent_id.as_str(), agent::WORKING_ON, Some(task_id.to_term()));
        }
    }
    update
}

/// Summary columns shared by the list queries. `extra` runs after the columns
/// are bound, so it may filter on `?type` and `?priority`.
fn summary_query(base: Group, extra: Group) -> Query {
    let mut pattern = base
        .triple(var("task"), task::NAME, var("name"))
        .triple(var("task"), task::TYPE, var("type"))
        .triple(var("task"), core::STATUS, var("status"))
        .triple(var("task"), core::PRIORITY, var("priority"))
        .optional(Group::new().triple(var("task"), core::DESCRIPTION, var("description")))
        .optional(Group::new().triple(var("task"), core::CREATED_AT, var("created")));
    pattern.elements.extend(extra.elements);
    let pattern =
        pattern.optional(Group::new().triple(var("task"), task::REQUIRES_CAPABILITY, var("cap")));

    Query::new(pattern)
        .group_by(&["task", "name", "type", "status", "priority", "description", "created"])
        .aggregate(Aggregate::concat("cap", LIST_SEPARATOR, "caps"))
}

fn summary_from_row(row: &Row) -> Option<TaskSummary> {
    let status = match row.str("status")?.parse() {
        Ok(status) => status,
        Err(e) => {
            warn!(task = ?row.str("task"), error = %e, "Skipping task with unreadable status");
            return None;
        }
    };
    Some(TaskSummary {
        task_id: TaskId::from_raw(row.str("task")?),
        name: row.str("name")?.to_string(),
        task_type: row.str("type")?.to_string(),
        description: row.str("description").unwrap_or_default().to_string(),
        priority: row.str("priority").and_then(|p| p.parse().ok()).unwrap_or_default(),
        status,
        created_at: row.timestamp("created"),
        required_capabilities: row.list("caps", LIST_SEPARATOR),
    })
}

fn sort_by_urgency(tasks: &mut [TaskSummary]) {
    tasks.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| created_key(a.created_at).cmp(&created_key(b.created_at)))
            .then_with(|| a.task_id.cmp(&b.task_id))
    });
}

fn created_key(created_at: Option<DateTime<Utc>>) -> DateTime<Utc> {
    created_at.unwrap_or(DateTime::<Utc>::MAX_UTC)
}
