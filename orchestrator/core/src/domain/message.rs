// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Message Domain Model
//!
//! Messages are inbox-style notifications stored in the graph. A message with
//! no target capabilities is a broadcast and matches every reader; a targeted
//! message matches only readers that share at least one capability with it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::CoordinationError;
use crate::domain::graph::Term;
use crate::domain::ids::{AgentId, CapabilityId, MessageId};

/// Message type used by `execute_workflow` announcements.
pub const TASK_AVAILABLE: &str = "task_available";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Unread,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unread => "unread",
            Self::Read => "read",
        }
    }

    pub fn to_term(self) -> Term {
        Term::text(self.as_str())
    }
}

impl Default for MessageStatus {
    fn default() -> Self {
        Self::Unread
    }
}

impl FromStr for MessageStatus {
    type Err = CoordinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "unread" => Ok(Self::Unread),
            "read" => Ok(Self::Read),
            other => Err(CoordinationError::malformed(format!(
                "unknown message status '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    #[serde(rename = "type")]
    pub message_type: String,
    /// Decoded JSON, or the raw stored string when it does not parse.
    pub content: Value,
    pub sender: Option<AgentId>,
    pub timestamp: Option<DateTime<Utc>>,
    pub status: MessageStatus,
    pub target_capabilities: Vec<CapabilityId>,
}

impl Message {
    pub fn is_broadcast(&self) -> bool {
        self.target_capabilities.is_empty()
    }
}

/// Inbox filter for `query_messages`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageFilter {
    #[serde(default, alias = "message_types")]
    pub types: Vec<String>,
    #[serde(default)]
    pub status: MessageStatus,
    /// Only messages strictly newer than this instant.
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
}

impl MessageFilter {
    pub fn unread() -> Self {
        Self::default()
    }

    pub fn of_type(mut self, message_type: impl Into<String>) -> Self {
        self.types.push(message_type.into());
        self
    }
}
