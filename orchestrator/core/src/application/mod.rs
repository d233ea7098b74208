// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agent_directory;
pub mod capability_registry;
pub mod coordinator;
pub mod fabric;
pub(crate) mod facts;
pub mod message_bus;
pub mod task_registry;
pub mod tools;
pub mod workflow_registry;

// Re-export the services for convenience
pub use agent_directory::AgentDirectory;
pub use capability_registry::CapabilityRegistry;
pub use coordinator::{Coordinator, CoordinatorResponse, ErrorBody};
pub use fabric::Fabric;
pub use message_bus::MessageBus;
pub use task_registry::TaskRegistry;
pub use tools::{CoordinationTool, ToolMetadata, ToolRegistry};
pub use workflow_registry::WorkflowRegistry;
