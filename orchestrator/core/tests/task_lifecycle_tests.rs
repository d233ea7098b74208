// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end task lifecycle against the in-memory graph store:
//! create, discover, claim, complete, and the advisory dependency checks.

use aegis_fabric::domain::events::TaskEvent;
use aegis_fabric::domain::graph::{var, Group, Query};
use aegis_fabric::domain::ids::AgentId;
use aegis_fabric::domain::repository::GraphStore;
use aegis_fabric::domain::task::{DependencyState, NewTask, Priority, TaskFilter, TaskStatus};
use aegis_fabric::domain::vocabulary::core;
use aegis_fabric::infrastructure::event_bus::CoordinationEvent;
use aegis_fabric::{ErrorKind, EventBus, Fabric, InMemoryGraphStore};
use serde_json::json;
use std::sync::Arc;

fn setup() -> (Fabric, Arc<InMemoryGraphStore>) {
    let store = Arc::new(InMemoryGraphStore::new());
    (Fabric::new(store.clone(), EventBus::new(64)), store)
}

async fn status_values(store: &InMemoryGraphStore, subject: &str) -> usize {
    store
        .query(&Query::new(Group::new().triple(subject, core::STATUS, var("s"))))
        .await
        .unwrap()
        .len()
}

#[tokio::test]
async fn test_task_lifecycle_end_to_end() {
    let (fabric, store) = setup();
    let requester = AgentId::new();
    let worker = AgentId::new();
    let rival = AgentId::new();

    let task_id = fabric
        .tasks
        .create_task(
            &requester,
            NewTask::new("Analyze market data", "analysis")
                .with_priority(Priority::High)
                .with_capability("market_analysis"),
        )
        .await
        .unwrap();

    let available = fabric
        .tasks
        .query_available_tasks(&TaskFilter {
            capabilities: vec!["capability:market_analysis".into()],
            ..TaskFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].task_id, task_id);

    assert!(fabric.tasks.claim_task(&worker, &task_id).await.unwrap());
    assert!(!fabric.tasks.claim_task(&rival, &task_id).await.unwrap());

    // Claimed tasks are never offered again.
    let available = fabric.tasks.query_available_tasks(&TaskFilter::default()).await.unwrap();
    assert!(available.is_empty());

    let claimed = fabric.tasks.get_task(&task_id).await.unwrap();
    assert_eq!(claimed.status, TaskStatus::InProgress);
    assert_eq!(claimed.assigned_to, Some(worker.clone()));
    assert!(claimed.claimed_at.is_some());

    fabric
        .tasks
        .update_task_status(&task_id, TaskStatus::Completed, Some(json!({"trend": "up"})), None)
        .await
        .unwrap();

    let done = fabric.tasks.get_task(&task_id).await.unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.result, Some(json!({"trend": "up"})));
    assert!(done.completed_at.is_some());
    assert_eq!(status_values(&store, task_id.as_str()).await, 1);
}

#[tokio::test]
async fn test_failed_task_records_error_and_keeps_one_status() {
    let (fabric, store) = setup();
    let actor = AgentId::new();
    let task_id = fabric
        .tasks
        .create_task(&actor, NewTask::new("render", "media"))
        .await
        .unwrap();
    assert!(fabric.tasks.claim_task(&actor, &task_id).await.unwrap());

    fabric
        .tasks
        .update_task_status(&task_id, TaskStatus::Failed, None, Some("gpu out of memory".into()))
        .await
        .unwrap();

    let failed = fabric.tasks.get_task(&task_id).await.unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("gpu out of memory"));
    assert!(failed.failed_at.is_some());
    assert!(failed.result.is_none());
    assert_eq!(status_values(&store, task_id.as_str()).await, 1);
}

#[tokio::test]
async fn test_dependencies_are_advisory() {
    let (fabric, _) = setup();
    let actor = AgentId::new();
    let upstream = fabric
        .tasks
        .create_task(&actor, NewTask::new("fetch", "io"))
        .await
        .unwrap();
    let downstream = fabric
        .tasks
        .create_task(&actor, NewTask::new("parse", "cpu").with_dependency(&upstream))
        .await
        .unwrap();

    let state = fabric.tasks.are_dependencies_satisfied(&downstream).await.unwrap();
    assert_eq!(
        state,
        DependencyState::Waiting {
            pending: vec![upstream.clone()]
        }
    );

    fabric
        .tasks
        .update_task_status(&upstream, TaskStatus::Failed, None, Some("timeout".into()))
        .await
        .unwrap();
    let state = fabric.tasks.are_dependencies_satisfied(&downstream).await.unwrap();
    assert_eq!(
        state,
        DependencyState::Failed {
            failed: vec![upstream.clone()]
        }
    );

    // The dependent is still claimable; callers decide what to do with it.
    assert!(fabric.tasks.claim_task(&actor, &downstream).await.unwrap());

    let deps = fabric.tasks.get_task_dependencies(&downstream).await.unwrap();
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].name.as_deref(), Some("fetch"));
    assert_eq!(deps[0].status, Some(TaskStatus::Failed));
}

#[tokio::test]
async fn test_release_returns_task_to_pool() {
    let (fabric, _) = setup();
    let worker = AgentId::new();
    let task_id = fabric
        .tasks
        .create_task(&AgentId::new(), NewTask::new("summarise", "nlp"))
        .await
        .unwrap();
    assert!(fabric.tasks.claim_task(&worker, &task_id).await.unwrap());

    // Only the claimant can release.
    assert!(!fabric.tasks.release_task(&AgentId::new(), &task_id).await.unwrap());
    assert!(fabric.tasks.release_task(&worker, &task_id).await.unwrap());

    let task = fabric.tasks.get_task(&task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(task.assigned_to.is_none());
    assert_eq!(
        fabric.tasks.query_available_tasks(&TaskFilter::default()).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_requeued_task_goes_to_the_next_worker() {
    let (fabric, _) = setup();
    let first = AgentId::new();
    let second = AgentId::new();
    let task_id = fabric
        .tasks
        .create_task(&AgentId::new(), NewTask::new("render", "media"))
        .await
        .unwrap();
    let mut events = fabric.event_bus.subscribe();

    assert!(fabric.tasks.claim_task(&first, &task_id).await.unwrap());
    fabric
        .tasks
        .update_task_status(&task_id, TaskStatus::Pending, None, None)
        .await
        .unwrap();

    assert!(fabric.tasks.tasks_assigned_to(&first).await.unwrap().is_empty());
    let available = fabric.tasks.query_available_tasks(&TaskFilter::default()).await.unwrap();
    assert_eq!(available.len(), 1);
    assert!(fabric.tasks.claim_task(&second, &task_id).await.unwrap());
    assert_eq!(fabric.tasks.tasks_assigned_to(&second).await.unwrap().len(), 1);

    let mut seen = Vec::new();
    while let Ok(CoordinationEvent::Task(event)) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(seen[0], TaskEvent::TaskClaimed { ref agent_id, .. } if *agent_id == first));
    assert!(matches!(
        seen[1],
        TaskEvent::TaskStatusChanged { status: TaskStatus::Pending, .. }
    ));
    assert!(matches!(seen[2], TaskEvent::TaskClaimed { ref agent_id, .. } if *agent_id == second));
}

#[tokio::test]
async fn test_claiming_unknown_task_is_not_found() {
    let (fabric, _) = setup();
    let err = fabric
        .tasks
        .claim_task(&AgentId::new(), &aegis_fabric::domain::ids::TaskId::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_store_outage_is_retryable() {
    let (fabric, store) = setup();
    store.set_available(false);
    let err = fabric
        .tasks
        .create_task(&AgentId::new(), NewTask::new("x", "y"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    assert!(err.is_retryable());
}
