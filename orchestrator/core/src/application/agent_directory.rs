// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Agent Directory
//!
//! Agent identity, status and declared capabilities, plus capability-based
//! discovery.
//!
//! Capabilities are stored exactly as the agent declared them: a
//! `capability:` id becomes a node, anything else a literal name. Matching
//! always compares normalised [`CapabilityId`]s, so `"Image Generation"` on an
//! agent satisfies a request for `capability:image_generation` and vice versa.

use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::facts::{entity_facts, LIST_SEPARATOR};
use crate::domain::agent::{Agent, AgentQuery, AgentStatus, AgentSummary, NewAgent};
use crate::domain::capability::CapabilityRef;
use crate::domain::error::{CoordinationError, CoordinationResult};
use crate::domain::events::AgentEvent;
use crate::domain::graph::{
    var, Aggregate, Direction, Group, Guard, GuardedUpdate, Query, Term, Triple,
};
use crate::domain::ids::{AgentId, CapabilityId, TaskId};
use crate::domain::repository::GraphStore;
use crate::domain::task::{json_or_raw, metadata_to_json};
use crate::domain::vocabulary::{agent, class, core};
use crate::infrastructure::event_bus::EventBus;

#[derive(Clone)]
pub struct AgentDirectory {
    store: Arc<dyn GraphStore>,
    event_bus: EventBus,
}

impl AgentDirectory {
    pub fn new(store: Arc<dyn GraphStore>, event_bus: EventBus) -> Self {
        Self { store, event_bus }
    }

    /// Register a new, active agent.
    pub async fn create_agent_node(&self, new_agent: NewAgent) -> CoordinationResult<AgentId> {
        if new_agent.name.trim().is_empty() {
            return Err(CoordinationError::malformed("agent name must not be empty"));
        }
        let metadata = metadata_to_json(new_agent.metadata.as_ref())?;
        let capabilities = new_agent.capability_refs();

        let id = AgentId::new();
        let now = Utc::now();
        let a = id.as_str();
        let mut triples = vec![
            Triple::new(a, core::TYPE, Term::node(class::AGENT)),
            Triple::new(a, agent::NAME, Term::text(new_agent.name.trim())),
            Triple::new(a, agent::TYPE, Term::text(new_agent.agent_type.clone())),
            Triple::new(a, core::STATUS, AgentStatus::Active.to_term()),
            Triple::new(a, core::CREATED_AT, Term::Timestamp(now)),
            Triple::new(a, core::METADATA, Term::Text(metadata)),
        ];
        triples.extend(
            capabilities
                .iter()
                .map(|c| Triple::new(a, agent::HAS_CAPABILITY, c.to_term())),
        );
        self.store.add_all(triples).await?;

        info!(
            agent_id = %id,
            name = %new_agent.name,
            capabilities = capabilities.len(),
            "Agent registered"
        );
        self.event_bus.publish_agent_event(AgentEvent::AgentRegistered {
            agent_id: id.clone(),
            capabilities: capabilities.iter().map(CapabilityRef::id).collect(),
            registered_at: now,
        });
        Ok(id)
    }

    pub async fn get_agent(&self, agent_id: &AgentId) -> CoordinationResult<Agent> {
        let facts =
            entity_facts(self.store.as_ref(), "agent", agent_id.as_str(), class::AGENT).await?;

        let mut assigned_tasks: Vec<TaskId> = facts
            .all(agent::HAS_ASSIGNED_TASK)
            .iter()
            .filter_map(Term::as_str)
            .map(TaskId::from_raw)
            .collect();
        assigned_tasks.sort();

        Ok(Agent {
            id: agent_id.clone(),
            name: facts.str(agent::NAME).unwrap_or_default().to_string(),
            agent_type: facts.str(agent::TYPE).unwrap_or_default().to_string(),
            status: facts
                .str(core::STATUS)
                .and_then(|s| s.parse().ok())
                .unwrap_or(AgentStatus::Inactive),
            capabilities: facts
                .all(agent::HAS_CAPABILITY)
                .iter()
                .filter_map(CapabilityRef::from_term)
                .collect(),
            assigned_tasks,
            working_on: facts.str(agent::WORKING_ON).map(TaskId::from_raw),
            metadata: facts
                .str(core::METADATA)
                .map(json_or_raw)
                .unwrap_or(serde_json::Value::Null),
            created_at: facts.timestamp(core::CREATED_AT),
        })
    }

    /// Flip an agent between active and inactive.
    pub async fn set_agent_status(
        &self,
        agent_id: &AgentId,
        status: AgentStatus,
    ) -> CoordinationResult<()> {
        let a = agent_id.as_str();
        let update = GuardedUpdate::new()
            .guard(Guard::holds(a, core::TYPE, Term::node(class::AGENT)))
            .replace(a, core::STATUS, status.to_term());
        if !self.store.apply(update).await? {
            return Err(CoordinationError::not_found("agent", agent_id));
        }

        info!(agent_id = %agent_id, status = %status, "Agent status changed");
        self.event_bus.publish_agent_event(AgentEvent::AgentStatusChanged {
            agent_id: agent_id.clone(),
            active: status == AgentStatus::Active,
            changed_at: Utc::now(),
        });
        Ok(())
    }

    /// Capabilities declared by an agent, empty for unknown agents.
    pub async fn agent_capabilities(
        &self,
        agent_id: &AgentId,
    ) -> CoordinationResult<Vec<CapabilityRef>> {
        let query = Query::new(Group::new().triple(
            agent_id.as_str(),
            agent::HAS_CAPABILITY,
            var("cap"),
        ))
        .order_by("cap", Direction::Asc);
        let rows = self.store.query(&query).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("cap"))
            .filter_map(CapabilityRef::from_term)
            .collect())
    }

    /// Record advisory `hasAssignedTask` edges. Re-recording the same pair is
    /// a no-op under set semantics.
    pub async fn record_assignment_hints(
        &self,
        hints: &[(AgentId, TaskId)],
    ) -> CoordinationResult<()> {
        if hints.is_empty() {
            return Ok(());
        }
        let triples = hints
            .iter()
            .map(|(agent_id, task_id)| {
                Triple::new(agent_id.as_str(), agent::HAS_ASSIGNED_TASK, task_id.to_term())
            })
            .collect();
        self.store.add_all(triples).await?;
        debug!(hints = hints.len(), "Recorded assignment hints");
        Ok(())
    }

    /// Agents with the requested status holding at least one of the requested
    /// capabilities (any capability when none are requested).
    pub async fn discover_agents(
        &self,
        filter: &AgentQuery,
    ) -> CoordinationResult<Vec<AgentSummary>> {
        let wanted: BTreeSet<CapabilityId> = filter
            .capabilities
            .iter()
            .filter(|c| !c.trim().is_empty())
            .map(|c| CapabilityRef::parse(c).id())
            .collect();

        let query = Query::new(
            Group::new()
                .triple(var("agent"), core::TYPE, Term::node(class::AGENT))
                .triple(var("agent"), core::STATUS, filter.status.to_term())
                .triple(var("agent"), agent::NAME, var("name"))
                .optional(Group::new().triple(var("agent"), agent::TYPE, var("type")))
                .optional(Group::new().triple(var("agent"), agent::HAS_CAPABILITY, var("cap"))),
        )
        .group_by(&["agent", "name", "type"])
        .aggregate(Aggregate::concat("cap", LIST_SEPARATOR, "caps"))
        .order_by("name", Direction::Asc)
        .order_by("agent", Direction::Asc);

        let rows = self.store.query(&query).await?;
        let agents: Vec<AgentSummary> = rows
            .iter()
            .filter_map(|row| {
                let capabilities = row.list("caps", LIST_SEPARATOR);
                let matches = wanted.is_empty()
                    || capabilities
                        .iter()
                        .any(|c| wanted.contains(&CapabilityRef::parse(c).id()));
                if !matches {
                    return None;
                }
                Some(AgentSummary {
                    agent: AgentId::from_raw(row.str("agent")?),
                    name: row.str("name")?.to_string(),
                    agent_type: row.str("type").unwrap_or_default().to_string(),
                    capabilities,
                })
            })
            .collect();

        debug!(count = agents.len(), wanted = wanted.len(), "Discovered agents");
        Ok(agents)
    }
}
