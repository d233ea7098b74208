// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared read helpers for the registries.

use crate::domain::error::{CoordinationError, CoordinationResult};
use crate::domain::graph::{var, Facts, Group, Query, Term};
use crate::domain::repository::GraphStore;
use crate::domain::vocabulary::core;

/// Separator for `concat` aggregates. Never appears in ids or names.
pub(crate) const LIST_SEPARATOR: &str = "\u{1f}";

/// Every `predicate object` pair of a subject.
pub(crate) async fn facts_of(store: &dyn GraphStore, subject: &str) -> CoordinationResult<Facts> {
    let query = Query::new(Group::new().triple(subject, var("p"), var("o")));
    let rows = store.query(&query).await?;
    Ok(Facts::from_rows(&rows, "p", "o"))
}

/// Facts of a subject that must be an instance of `class`.
pub(crate) async fn entity_facts(
    store: &dyn GraphStore,
    entity: &'static str,
    subject: &str,
    class: &str,
) -> CoordinationResult<Facts> {
    let facts = facts_of(store, subject).await?;
    if facts.has(core::TYPE, &Term::node(class)) {
        Ok(facts)
    } else {
        Err(CoordinationError::not_found(entity, subject))
    }
}

/// Whether `subject` is typed as `class`.
pub(crate) async fn is_instance(
    store: &dyn GraphStore,
    subject: &str,
    class: &str,
) -> CoordinationResult<bool> {
    let query = Query::new(Group::new().triple(subject, core::TYPE, Term::node(class))).limit(1);
    Ok(!store.query(&query).await?.is_empty())
}
