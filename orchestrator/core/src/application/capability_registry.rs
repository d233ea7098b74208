// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::application::facts::entity_facts;
use crate::domain::capability::{Capability, NewCapability};
use crate::domain::error::{CoordinationError, CoordinationResult};
use crate::domain::events::AgentEvent;
use crate::domain::graph::{GuardedUpdate, Term};
use crate::domain::ids::CapabilityId;
use crate::domain::repository::GraphStore;
use crate::domain::vocabulary::{capability, class, core};
use crate::infrastructure::event_bus::EventBus;

/// Capability records, upserted by their name-derived id.
#[derive(Clone)]
pub struct CapabilityRegistry {
    store: Arc<dyn GraphStore>,
    event_bus: EventBus,
}

impl CapabilityRegistry {
    pub fn new(store: Arc<dyn GraphStore>, event_bus: EventBus) -> Self {
        Self { store, event_bus }
    }

    /// Create or overwrite a capability. Scalars are replaced and the
    /// prerequisite set is rewritten, so repeated calls never accumulate.
    pub async fn create_capability_node(
        &self,
        new_capability: NewCapability,
    ) -> CoordinationResult<CapabilityId> {
        if new_capability.name.trim().is_empty() {
            return Err(CoordinationError::malformed("capability name must not be empty"));
        }
        let id = CapabilityId::from_name(&new_capability.name);
        let c = id.as_str();

        let mut update = GuardedUpdate::new()
            .replace(c, core::TYPE, Term::node(class::CAPABILITY))
            .replace(c, capability::NAME, Term::text(new_capability.name.trim()))
            .replace(c, capability::TYPE, Term::text(new_capability.capability_type.clone()))
            .replace(c, core::DESCRIPTION, Term::text(new_capability.description.clone()))
            .replace(c, core::LAST_UPDATED, Term::Timestamp(Utc::now()))
            .remove(c, capability::REQUIRES, None);
        for requirement in new_capability.requirements.iter().filter(|r| !r.trim().is_empty()) {
            let required = CapabilityId::from_any(requirement);
            if required != id {
                update = update.add(c, capability::REQUIRES, required.to_term());
            }
        }
        self.store.apply(update).await?;

        info!(capability_id = %id, "Capability defined");
        self.event_bus.publish_agent_event(AgentEvent::CapabilityDefined {
            capability_id: id.clone(),
            defined_at: Utc::now(),
        });
        Ok(id)
    }

    /// Look up by id or by name.
    pub async fn get_capability(&self, id_or_name: &str) -> CoordinationResult<Capability> {
        let id = CapabilityId::from_any(id_or_name);
        let facts =
            entity_facts(self.store.as_ref(), "capability", id.as_str(), class::CAPABILITY)
                .await?;

        let mut requirements: Vec<CapabilityId> = facts
            .all(capability::REQUIRES)
            .iter()
            .filter_map(Term::as_str)
            .map(CapabilityId::from_any)
            .collect();
        requirements.sort();

        Ok(Capability {
            name: facts.str(capability::NAME).unwrap_or(id.name()).to_string(),
            capability_type: facts.str(capability::TYPE).unwrap_or_default().to_string(),
            description: facts.str(core::DESCRIPTION).unwrap_or_default().to_string(),
            requirements,
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::graph_store::InMemoryGraphStore;

    #[tokio::test]
    async fn test_upsert_replaces_instead_of_accumulating() {
        let store = Arc::new(InMemoryGraphStore::new());
        let registry = CapabilityRegistry::new(store.clone(), EventBus::new(4));

        let first = registry
            .create_capability_node(NewCapability {
                name: "Image Generation".into(),
                capability_type: "media".into(),
                description: "draw".into(),
                requirements: vec!["gpu".into()],
            })
            .await
            .unwrap();
        let facts_after_first = store.len();

        let second = registry
            .create_capability_node(NewCapability {
                name: "image-generation".into(),
                capability_type: "media".into(),
                description: "draw better".into(),
                requirements: vec!["capability:gpu".into(), "vram".into()],
            })
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(store.len(), facts_after_first + 1);

        let cap = registry.get_capability("Image Generation").await.unwrap();
        assert_eq!(cap.description, "draw better");
        assert_eq!(
            cap.requirements,
            vec![CapabilityId::from_name("gpu"), CapabilityId::from_name("vram")]
        );
    }

    #[tokio::test]
    async fn test_missing_capability_is_not_found() {
        let registry =
            CapabilityRegistry::new(Arc::new(InMemoryGraphStore::new()), EventBus::new(4));
        assert!(registry.get_capability("telepathy").await.is_err());
    }
}
