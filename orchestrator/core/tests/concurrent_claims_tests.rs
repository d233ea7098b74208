// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Many agents racing for the same task.

use aegis_fabric::domain::graph::{var, Group, Query};
use aegis_fabric::domain::ids::AgentId;
use aegis_fabric::domain::repository::GraphStore;
use aegis_fabric::domain::task::{NewTask, TaskFilter};
use aegis_fabric::domain::vocabulary::task;
use aegis_fabric::{EventBus, Fabric, InMemoryGraphStore};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exactly_one_concurrent_claim_wins() {
    let store = Arc::new(InMemoryGraphStore::new());
    let fabric = Fabric::new(store.clone(), EventBus::new(256));
    let task_id = fabric
        .tasks
        .create_task(&AgentId::new(), NewTask::new("contested", "generic"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let tasks = fabric.tasks.clone();
        let task_id = task_id.clone();
        handles.push(tokio::spawn(async move {
            let agent = AgentId::new();
            let won = tasks.claim_task(&agent, &task_id).await.unwrap();
            (agent, won)
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        let (agent, won) = handle.await.unwrap();
        if won {
            winners.push(agent);
        }
    }
    assert_eq!(winners.len(), 1);

    let assignees = store
        .query(&Query::new(
            Group::new().triple(task_id.as_str(), task::ASSIGNED_TO, var("agent")),
        ))
        .await
        .unwrap();
    assert_eq!(assignees.len(), 1);
    assert_eq!(assignees[0].str("agent"), Some(winners[0].as_str()));

    let task = fabric.tasks.get_task(&task_id).await.unwrap();
    assert_eq!(task.assigned_to.as_ref(), Some(&winners[0]));
    assert!(fabric
        .tasks
        .query_available_tasks(&TaskFilter::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_task_claimed_once_under_contention() {
    let fabric = Fabric::new(Arc::new(InMemoryGraphStore::new()), EventBus::new(256));
    let owner = AgentId::new();
    let mut task_ids = Vec::new();
    for i in 0..5 {
        task_ids.push(
            fabric
                .tasks
                .create_task(&owner, NewTask::new(format!("job-{}", i), "batch"))
                .await
                .unwrap(),
        );
    }

    // Every worker tries every task; each task must end up with one owner.
    let mut handles = Vec::new();
    for _ in 0..8 {
        let tasks = fabric.tasks.clone();
        let task_ids = task_ids.clone();
        handles.push(tokio::spawn(async move {
            let agent = AgentId::new();
            let mut won = 0usize;
            for task_id in &task_ids {
                if tasks.claim_task(&agent, task_id).await.unwrap() {
                    won += 1;
                }
            }
            won
        }));
    }

    let mut total = 0;
    for handle in handles {
        total += handle.await.unwrap();
    }
    assert_eq!(total, task_ids.len());
}
