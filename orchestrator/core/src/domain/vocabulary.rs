// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Fabric Predicate Vocabulary
//!
//! The wire contract shared by the graph store and every agent. Predicates are
//! namespace-qualified; generic attributes live under `core#`, entity-specific
//! ones under the entity namespace. `*` in the comments marks multi-valued
//! predicates.

/// Generic predicates shared by every entity.
pub mod core {
    pub const TYPE: &str = "fabric:core#type";
    pub const STATUS: &str = "fabric:core#status";
    pub const CREATED_AT: &str = "fabric:core#createdAt";
    pub const CREATED_BY: &str = "fabric:core#createdBy";
    pub const PRIORITY: &str = "fabric:core#priority";
    pub const METADATA: &str = "fabric:core#metadata";
    pub const DESCRIPTION: &str = "fabric:core#description";
    pub const LAST_UPDATED: &str = "fabric:core#lastUpdated";
}

/// Entity classes, the objects of `core#type`.
pub mod class {
    pub const TASK: &str = "fabric:core#Task";
    pub const WORKFLOW: &str = "fabric:core#Workflow";
    pub const AGENT: &str = "fabric:core#Agent";
    pub const CAPABILITY: &str = "fabric:core#Capability";
    pub const MESSAGE: &str = "fabric:core#Message";
}

pub mod task {
    pub const NAME: &str = "fabric:task#taskName";
    pub const TYPE: &str = "fabric:task#taskType";
    /// *
    pub const DEPENDS_ON: &str = "fabric:task#dependsOn";
    pub const ASSIGNED_TO: &str = "fabric:task#assignedTo";
    pub const CLAIMED_AT: &str = "fabric:task#claimedAt";
    pub const RESULT: &str = "fabric:task#result";
    pub const COMPLETED_AT: &str = "fabric:task#completedAt";
    pub const ERROR: &str = "fabric:task#error";
    pub const FAILED_AT: &str = "fabric:task#failedAt";
    /// *
    pub const REQUIRES_CAPABILITY: &str = "fabric:task#requiresCapability";
    pub const PART_OF_WORKFLOW: &str = "fabric:task#partOfWorkflow";
    pub const STEP_NUMBER: &str = "fabric:task#stepNumber";
}

pub mod workflow {
    pub const NAME: &str = "fabric:workflow#workflowName";
    pub const TYPE: &str = "fabric:workflow#workflowType";
    /// * ordered through the task's `stepNumber`
    pub const HAS_TASK: &str = "fabric:workflow#hasTask";
}

pub mod agent {
    pub const NAME: &str = "fabric:agent#agentName";
    pub const TYPE: &str = "fabric:agent#agentType";
    /// * capability id node or literal capability name
    pub const HAS_CAPABILITY: &str = "fabric:agent#hasCapability";
    /// *
    pub const HAS_ASSIGNED_TASK: &str = "fabric:agent#hasAssignedTask";
    pub const WORKING_ON: &str = "fabric:agent#workingOn";
}

pub mod capability {
    pub const NAME: &str = "fabric:capability#capabilityName";
    pub const TYPE: &str = "fabric:capability#capabilityType";
    /// *
    pub const REQUIRES: &str = "fabric:capability#requires";
}

pub mod message {
    pub const TYPE: &str = "fabric:message#messageType";
    pub const CONTENT: &str = "fabric:message#content";
    pub const SENDER: &str = "fabric:message#sender";
    pub const TIMESTAMP: &str = "fabric:message#timestamp";
    /// *
    pub const TARGET_CAPABILITY: &str = "fabric:message#targetCapability";
    /// *
    pub const READ_BY: &str = "fabric:message#readBy";
    pub const READ_AT: &str = "fabric:message#readAt";
}
