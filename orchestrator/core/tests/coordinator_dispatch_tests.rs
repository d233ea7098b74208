// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! The JSON dispatch contract: every verb, error rendering, and the
//! guarantee that dispatch always answers with a response object.

use aegis_fabric::application::coordinator::MESSAGE_TYPES;
use aegis_fabric::domain::ids::AgentId;
use aegis_fabric::{Coordinator, ErrorKind, EventBus, Fabric, InMemoryGraphStore};
use serde_json::{json, Value};
use std::sync::Arc;

fn coordinator() -> (Coordinator, Arc<InMemoryGraphStore>) {
    let store = Arc::new(InMemoryGraphStore::new());
    let fabric = Fabric::new(store.clone(), EventBus::new(64));
    (Coordinator::new(fabric), store)
}

async fn ok(c: &Coordinator, actor: &AgentId, message: Value) -> Value {
    let response = c.dispatch(actor, message.clone()).await;
    match response.data() {
        Some(data) => data.clone(),
        None => panic!("dispatch of {} failed: {:?}", message, response.error()),
    }
}

#[tokio::test]
async fn test_agent_workflow_through_dispatch() {
    let (c, _) = coordinator();
    let owner = AgentId::new();

    let created = ok(
        &c,
        &owner,
        json!({
            "message_type": "orchestrate_agents",
            "payload": {
                "action": "create_agent",
                "name": "image bot",
                "type": "llm",
                "capabilities": ["image_generation"]
            }
        }),
    )
    .await;
    let bot = AgentId::parse(created["agent_id"].as_str().unwrap()).unwrap();

    let discovered = ok(
        &c,
        &owner,
        json!({
            "message_type": "orchestrate_agents",
            "payload": {"action": "discover", "capabilities": ["Image Generation"]}
        }),
    )
    .await;
    assert_eq!(discovered["count"], 1);
    assert_eq!(discovered["agents"][0]["name"], "image bot");

    let task = ok(
        &c,
        &owner,
        json!({
            "message_type": "create_task",
            "payload": {
                "name": "draw a cat",
                "type": "image",
                "priority": "critical",
                "required_capabilities": ["image_generation"],
                "metadata": {"size": "512x512"}
            }
        }),
    )
    .await;
    let task_id = task["task_id"].clone();

    let listed = ok(
        &c,
        &bot,
        json!({"message_type": "query_tasks", "payload": {"capabilities": ["image_generation"]}}),
    )
    .await;
    assert_eq!(listed["tasks"][0]["task_id"], task_id);

    let claimed = ok(
        &c,
        &bot,
        json!({
            "message_type": "tool_call",
            "payload": {"tool_name": "claim_task", "arguments": {"task_id": task_id}}
        }),
    )
    .await;
    assert_eq!(claimed["claimed"], true);

    ok(
        &c,
        &bot,
        json!({
            "message_type": "tool_call",
            "tool_name": "update_task_status",
            "arguments": {"task_id": task_id, "status": "completed", "result": {"url": "cat.png"}}
        }),
    )
    .await;
    let fetched = ok(
        &c,
        &bot,
        json!({
            "message_type": "tool_call",
            "tool_name": "get_task",
            "arguments": {"task_id": task_id}
        }),
    )
    .await;
    assert_eq!(fetched["status"], "completed");
    assert_eq!(fetched["metadata"]["size"], "512x512");
    assert_eq!(fetched["assigned_to"], json!(bot));
}

#[tokio::test]
async fn test_broadcast_reaches_inbox_via_tools() {
    let (c, _) = coordinator();
    let reader = AgentId::new();

    let sent = ok(
        &c,
        &AgentId::new(),
        json!({
            "message_type": "orchestrate_agents",
            "payload": {"action": "broadcast", "type": "maintenance", "content": {"at": "noon"}}
        }),
    )
    .await;

    let inbox = ok(
        &c,
        &reader,
        json!({"message_type": "tool_call", "tool_name": "query_messages"}),
    )
    .await;
    assert_eq!(inbox["count"], 1);
    assert_eq!(inbox["messages"][0]["id"], sent["message_id"]);
    assert_eq!(inbox["messages"][0]["content"]["at"], "noon");

    ok(
        &c,
        &reader,
        json!({
            "message_type": "tool_call",
            "tool_name": "mark_message_read",
            "arguments": {"message_id": sent["message_id"]}
        }),
    )
    .await;
    let inbox = ok(
        &c,
        &reader,
        json!({"message_type": "tool_call", "tool_name": "query_messages"}),
    )
    .await;
    assert_eq!(inbox["count"], 0);
}

#[tokio::test]
async fn test_errors_are_rendered_not_raised() {
    let (c, store) = coordinator();
    let actor = AgentId::new();

    let response = c.dispatch(&actor, json!({"message_type": "summon"})).await;
    let rendered = serde_json::to_value(&response).unwrap();
    assert_eq!(rendered["status"], "error");
    assert_eq!(rendered["error"]["kind"], "malformed_input");
    assert_eq!(
        rendered["error"]["known_keys"].as_array().unwrap().len(),
        MESSAGE_TYPES.len()
    );

    let response = c
        .dispatch(&actor, json!({"message_type": "tool_call", "tool_name": "teleport"}))
        .await;
    let known = response.error().unwrap().known_keys.clone().unwrap();
    assert!(known.contains(&"check_dependencies".to_string()));

    let response = c
        .dispatch(
            &actor,
            json!({"message_type": "execute_workflow", "workflow_id": "workflow:missing"}),
        )
        .await;
    assert_eq!(response.error().unwrap().kind, ErrorKind::NotFound);

    let response = c.dispatch(&actor, json!({"message_type": "create_task"})).await;
    assert_eq!(response.error().unwrap().kind, ErrorKind::MalformedInput);

    store.set_available(false);
    let response = c
        .dispatch(&actor, json!({"message_type": "query_tasks"}))
        .await;
    let error = response.error().unwrap();
    assert_eq!(error.kind, ErrorKind::StoreUnavailable);
    assert!(error.retryable);
}

#[tokio::test]
async fn test_execute_workflow_starts_then_reports() {
    let (c, _) = coordinator();
    let owner = AgentId::new();
    ok(
        &c,
        &owner,
        json!({
            "message_type": "orchestrate_agents",
            "payload": {"action": "create_agent", "name": "writer", "capabilities": ["writing"]}
        }),
    )
    .await;

    let created = ok(
        &c,
        &owner,
        json!({
            "message_type": "create_workflow",
            "payload": {
                "name": "blog post",
                "type": "sequential",
                "steps": [
                    {"name": "outline", "required_capabilities": ["writing"]},
                    {"name": "draft", "required_capabilities": ["writing"]},
                    {"name": "edit", "required_capabilities": ["editing"]}
                ]
            }
        }),
    )
    .await;
    let workflow_id = created["workflow_id"].clone();
    assert_eq!(created["task_ids"].as_array().unwrap().len(), 3);

    let started = ok(
        &c,
        &owner,
        json!({"message_type": "execute_workflow", "workflow_id": workflow_id}),
    )
    .await;
    assert_eq!(started["status"], "started");
    let assignments = started["assignments"].as_array().unwrap();
    assert_eq!(assignments.len(), 3);
    assert_eq!(assignments[0]["agents"].as_array().unwrap().len(), 1);
    assert_eq!(assignments[2]["agents"].as_array().unwrap().len(), 0);

    // Hints are advisory: nothing is claimed, so a second run starts again.
    let again = ok(
        &c,
        &owner,
        json!({"message_type": "execute_workflow", "workflow_id": workflow_id}),
    )
    .await;
    assert_eq!(again["status"], "started");

    let status = ok(
        &c,
        &owner,
        json!({
            "message_type": "tool_call",
            "tool_name": "query_workflow_status",
            "arguments": {"workflow_id": workflow_id}
        }),
    )
    .await;
    assert_eq!(status["status"], "in_progress");
    assert_eq!(status["total_tasks"], 3);
}
