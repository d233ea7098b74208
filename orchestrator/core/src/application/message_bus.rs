// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Message Bus
//!
//! Inbox-style notifications stored in the graph. Visibility is decided by
//! the store query itself: a reader sees every broadcast (no targets) and any
//! targeted message sharing at least one capability with the reader.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::agent_directory::AgentDirectory;
use crate::application::facts::LIST_SEPARATOR;
use crate::domain::capability::CapabilityRef;
use crate::domain::error::{CoordinationError, CoordinationResult};
use crate::domain::events::MessageEvent;
use crate::domain::graph::{
    var, Aggregate, Direction, Filter, Group, Guard, GuardedUpdate, Query, Row, Term, Triple,
};
use crate::domain::ids::{AgentId, CapabilityId, MessageId};
use crate::domain::message::{Message, MessageFilter, MessageStatus};
use crate::domain::repository::GraphStore;
use crate::domain::task::json_or_raw;
use crate::domain::vocabulary::{class, core, message};
use crate::infrastructure::event_bus::EventBus;

#[derive(Clone)]
pub struct MessageBus {
    store: Arc<dyn GraphStore>,
    agents: AgentDirectory,
    event_bus: EventBus,
}

impl MessageBus {
    pub fn new(store: Arc<dyn GraphStore>, agents: AgentDirectory, event_bus: EventBus) -> Self {
        Self {
            store,
            agents,
            event_bus,
        }
    }

    /// Store an unread message. An empty target list makes it a broadcast.
    pub async fn broadcast_message(
        &self,
        actor: &AgentId,
        message_type: &str,
        content: &Value,
        target_capabilities: &[String],
    ) -> CoordinationResult<MessageId> {
        if message_type.trim().is_empty() {
            return Err(CoordinationError::malformed("message type must not be empty"));
        }
        let mut targets: Vec<CapabilityId> = target_capabilities
            .iter()
            .filter(|c| !c.trim().is_empty())
            .map(|c| CapabilityId::from_any(c))
            .collect();
        targets.sort();
        targets.dedup();

        let id = MessageId::new();
        let now = Utc::now();
        let m = id.as_str();
        let mut triples = vec![
            Triple::new(m, core::TYPE, Term::node(class::MESSAGE)),
            Triple::new(m, message::TYPE, Term::text(message_type.trim())),
            Triple::new(m, message::CONTENT, Term::text(content.to_string())),
            Triple::new(m, message::SENDER, actor.to_term()),
            Triple::new(m, message::TIMESTAMP, Term::Timestamp(now)),
            Triple::new(m, core::STATUS, MessageStatus::Unread.to_term()),
        ];
        triples.extend(
            targets
                .iter()
                .map(|t| Triple::new(m, message::TARGET_CAPABILITY, t.to_term())),
        );
        self.store.add_all(triples).await?;

        info!(
            message_id = %id,
            message_type = message_type.trim(),
            sender = %actor,
            targets = targets.len(),
            "Message broadcast"
        );
        self.event_bus.publish_message_event(MessageEvent::MessageBroadcast {
            message_id: id.clone(),
            message_type: message_type.trim().to_string(),
            sender: actor.clone(),
            targets,
            sent_at: now,
        });
        Ok(id)
    }

    /// Messages visible to `actor`, oldest first.
    pub async fn query_messages(
        &self,
        actor: &AgentId,
        filter: &MessageFilter,
    ) -> CoordinationResult<Vec<Message>> {
        let mine: Vec<Term> = self
            .agents
            .agent_capabilities(actor)
            .await?
            .iter()
            .map(|c| CapabilityRef::id(c).to_term())
            .collect();
        let types: Vec<Term> = filter.types.iter().map(|t| Term::text(t.trim())).collect();

        let pattern = Group::new()
            .triple(var("msg"), core::TYPE, Term::node(class::MESSAGE))
            .triple(var("msg"), core::STATUS, filter.status.to_term())
            .triple(var("msg"), message::TYPE, var("type"))
            .triple(var("msg"), message::TIMESTAMP, var("ts"))
            .union(vec![
                Group::new().not_exists(
                    Group::new().triple(var("msg"), message::TARGET_CAPABILITY, var("any")),
                ),
                Group::new().exists(
                    Group::new()
                        .triple(var("msg"), message::TARGET_CAPABILITY, var("mine"))
                        .filter(Filter::is_in("mine", mine)),
                ),
            ])
            .when(!types.is_empty(), |g| g.filter(Filter::is_in("type", types)));
        let pattern = match filter.since {
            Some(since) => pattern.filter(Filter::gt("ts", Term::Timestamp(since))),
            None => pattern,
        };
        let pattern = pattern
            .optional(Group::new().triple(var("msg"), message::CONTENT, var("content")))
            .optional(Group::new().triple(var("msg"), message::SENDER, var("sender")))
            .optional(Group::new().triple(var("msg"), message::TARGET_CAPABILITY, var("target")));

        let query = Query::new(pattern)
            .group_by(&["msg", "type", "ts", "content", "sender"])
            .aggregate(Aggregate::concat("target", LIST_SEPARATOR, "targets"))
            .order_by("ts", Direction::Asc)
            .order_by("msg", Direction::Asc);

        let rows = self.store.query(&query).await?;
        let messages: Vec<Message> = rows
            .iter()
            .filter_map(|row| message_from_row(row, filter.status))
            .collect();
        debug!(reader = %actor, count = messages.len(), "Queried messages");
        Ok(messages)
    }

    /// Mark a message read and record who read it.
    pub async fn mark_message_read(
        &self,
        actor: &AgentId,
        message_id: &MessageId,
    ) -> CoordinationResult<()> {
        let now = Utc::now();
        let m = message_id.as_str();
        let update = GuardedUpdate::new()
            .guard(Guard::holds(m, core::TYPE, Term::node(class::MESSAGE)))
            .replace(m, core::STATUS, MessageStatus::Read.to_term())
            .add(m, message::READ_BY, actor.to_term())
            .replace(m, message::READ_AT, Term::Timestamp(now));
        if !self.store.apply(update).await? {
            return Err(CoordinationError::not_found("message", message_id));
        }

        debug!(message_id = %message_id, reader = %actor, "Message marked read");
        self.event_bus.publish_message_event(MessageEvent::MessageRead {
            message_id: message_id.clone(),
            reader: actor.clone(),
            read_at: now,
        });
        Ok(())
    }
}

fn message_from_row(row: &Row, status: MessageStatus) -> Option<Message> {
    let mut target_capabilities: Vec<CapabilityId> = row
        .list("targets", LIST_SEPARATOR)
        .iter()
        .map(|t| CapabilityId::from_any(t))
        .collect();
    target_capabilities.sort();

    Some(Message {
        id: MessageId::from_raw(row.str("msg")?),
        message_type: row.str("type")?.to_string(),
        content: row.str("content").map(json_or_raw).unwrap_or(Value::Null),
        sender: row.str("sender").map(AgentId::from_raw),
        timestamp: row.timestamp("ts"),
        status,
        target_capabilities,
    })
}
