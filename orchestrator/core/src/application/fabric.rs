// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;

use crate::application::agent_directory::AgentDirectory;
use crate::application::capability_registry::CapabilityRegistry;
use crate::application::message_bus::MessageBus;
use crate::application::task_registry::TaskRegistry;
use crate::application::workflow_registry::WorkflowRegistry;
use crate::domain::repository::GraphStore;
use crate::infrastructure::event_bus::EventBus;

/// The registries wired to one shared store and event bus.
#[derive(Clone)]
pub struct Fabric {
    pub tasks: TaskRegistry,
    pub workflows: WorkflowRegistry,
    pub capabilities: CapabilityRegistry,
    pub agents: AgentDirectory,
    pub messages: MessageBus,
    pub event_bus: EventBus,
}

impl Fabric {
    pub fn new(store: Arc<dyn GraphStore>, event_bus: EventBus) -> Self {
        let tasks = TaskRegistry::new(store.clone(), event_bus.clone());
        let workflows = WorkflowRegistry::new(store.clone(), tasks.clone(), event_bus.clone());
        let capabilities = CapabilityRegistry::new(store.clone(), event_bus.clone());
        let agents = AgentDirectory::new(store.clone(), event_bus.clone());
        let messages = MessageBus::new(store, agents.clone(), event_bus.clone());
        Self {
            tasks,
            workflows,
            capabilities,
            agents,
            messages,
            event_bus,
        }
    }
}
