// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Capability Domain Model
//!
//! A capability is a named skill an agent declares and a task may require; it
//! is the matching key between supply and demand. Capability records are
//! addressed by an id derived from the normalised name, so creating the same
//! capability twice converges on one node.

use serde::{Deserialize, Serialize};

use crate::domain::graph::Term;
use crate::domain::ids::CapabilityId;

/// Payload of `create_capability`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewCapability {
    pub name: String,
    #[serde(rename = "type", alias = "category", default = "default_category")]
    pub capability_type: String,
    #[serde(default)]
    pub description: String,
    /// Prerequisite capabilities, names or ids. Not resolved transitively.
    #[serde(default, alias = "requires")]
    pub requirements: Vec<String>,
}

fn default_category() -> String {
    "general".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub id: CapabilityId,
    pub name: String,
    #[serde(rename = "type")]
    pub capability_type: String,
    pub description: String,
    pub requirements: Vec<CapabilityId>,
}

/// A capability value as written on an agent: either an id node or a literal
/// name. Both forms refer to the same [`CapabilityId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapabilityRef {
    Id(CapabilityId),
    Name(String),
}

impl CapabilityRef {
    /// Interpret caller input: `capability:` prefixed strings are ids.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().starts_with("capability:") {
            Self::Id(CapabilityId::from_any(raw))
        } else {
            Self::Name(raw.trim().to_string())
        }
    }

    /// Interpret a stored term: nodes are ids, literals are names.
    pub fn from_term(term: &Term) -> Option<Self> {
        match term {
            Term::Node(id) => Some(Self::Id(CapabilityId::from_any(id))),
            Term::Text(name) => Some(Self::Name(name.clone())),
            _ => None,
        }
    }

    pub fn id(&self) -> CapabilityId {
        match self {
            Self::Id(id) => id.clone(),
            Self::Name(name) => CapabilityId::from_name(name),
        }
    }

    pub fn to_term(&self) -> Term {
        match self {
            Self::Id(id) => id.to_term(),
            Self::Name(name) => Term::text(name.clone()),
        }
    }

    /// Every stored form that denotes this capability, for `IN` filters.
    pub fn match_terms(&self) -> Vec<Term> {
        let id = self.id();
        let mut terms = vec![id.to_term(), Term::text(id.name())];
        if let Self::Name(name) = self {
            if name != id.name() {
                terms.push(Term::text(name.clone()));
            }
        }
        terms
    }

    pub fn display(&self) -> String {
        match self {
            Self::Id(id) => id.to_string(),
            Self::Name(name) => name.clone(),
        }
    }
}
