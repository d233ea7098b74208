// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Entity Identifiers
//!
//! Every record in the fabric graph is addressed by a prefixed, UUID-suffixed
//! id (`task:<uuid>`, `workflow:<uuid>`, ...). Ids are minted once at creation
//! and never reused; records are never deleted.
//!
//! Capability ids are the exception: they are derived deterministically from
//! the capability name (see [`CapabilityId::from_name`]) so that independent
//! agents declaring the same skill converge on the same node.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Typed identifiers for graph subjects

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::error::CoordinationError;
use crate::domain::graph::Term;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal, $entity:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Mint a fresh id with a random UUID suffix.
            pub fn new() -> Self {
                Self(format!("{}:{}", Self::PREFIX, Uuid::new_v4()))
            }

            /// Parse caller-supplied input, rejecting anything without the entity prefix.
            pub fn parse(raw: &str) -> Result<Self, CoordinationError> {
                let raw = raw.trim();
                match raw.strip_prefix(Self::PREFIX).and_then(|rest| rest.strip_prefix(':')) {
                    Some(suffix) if !suffix.is_empty() => Ok(Self(raw.to_string())),
                    _ => Err(CoordinationError::MalformedInput(format!(
                        "invalid {} id '{}': expected '{}:<id>'",
                        $entity,
                        raw,
                        Self::PREFIX
                    ))),
                }
            }

            /// Wrap a value read back from the store without validation.
            pub(crate) fn from_raw(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn to_term(&self) -> Term {
                Term::node(self.0.clone())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a task record.
    TaskId,
    "task",
    "task"
);
entity_id!(
    /// Identifier of a workflow record.
    WorkflowId,
    "workflow",
    "workflow"
);
entity_id!(
    /// Identifier of an agent. Also used as the acting identity of every
    /// coordinator call (createdBy, sender, claimant, reader).
    AgentId,
    "agent",
    "agent"
);
entity_id!(
    /// Identifier of a message record.
    MessageId,
    "message",
    "message"
);

impl AgentId {
    /// Identity used for requests that do not name an agent.
    pub fn anonymous() -> Self {
        Self(format!("{}:anonymous", Self::PREFIX))
    }
}

/// Deterministic capability identifier (`capability:<normalised-name>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityId(String);

impl CapabilityId {
    pub const PREFIX: &'static str = "capability";

    /// Derive the id for a capability name.
    pub fn from_name(name: &str) -> Self {
        Self(format!("{}:{}", Self::PREFIX, normalize_capability_name(name)))
    }

    /// Accept either a capability id or a bare capability name.
    pub fn from_any(raw: &str) -> Self {
        match raw.trim().strip_prefix("capability:") {
            Some(name) => Self::from_name(name),
            None => Self::from_name(raw),
        }
    }

    /// The normalised name part of the id.
    pub fn name(&self) -> &str {
        self.0
            .strip_prefix("capability:")
            .unwrap_or(self.0.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_term(&self) -> Term {
        Term::node(self.0.clone())
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trim, lowercase, and collapse runs of whitespace, `-` and `_` into a single `_`.
pub fn normalize_capability_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.trim().chars() {
        if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_sep = !out.is_empty();
            continue;
        }
        if pending_sep {
            out.push('_');
            pending_sep = false;
        }
        out.extend(ch.to_lowercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_ids_carry_prefix_and_are_unique() {
        let a = TaskId::new();
        let b = TaskId::new();
        assert!(a.as_str().starts_with("task:"));
        assert_ne!(a, b);
    }

    #[test]
    fn parse_rejects_foreign_prefix() {
        assert!(TaskId::parse("workflow:123").is_err());
        assert!(TaskId::parse("task:").is_err());
        assert!(TaskId::parse("taskish:1").is_err());
        assert_eq!(TaskId::parse(" task:abc ").unwrap().as_str(), "task:abc");
    }

    #[test]
    fn capability_ids_are_derived_from_normalised_names() {
        assert_eq!(
            CapabilityId::from_name("  Image Generation ").as_str(),
            "capability:image_generation"
        );
        assert_eq!(
            CapabilityId::from_name("market--analysis"),
            CapabilityId::from_any("capability:Market Analysis")
        );
        assert_eq!(CapabilityId::from_any("nlp").name(), "nlp");
    }
}
