// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Graph Store Interface
//!
//! Persistence contract for the shared fact graph. The interface is defined in
//! the domain layer and implemented in `crate::infrastructure::graph_store`;
//! every registry receives it as an injected `Arc<dyn GraphStore>` so tests
//! (and the single-node daemon) can substitute the in-memory implementation.
//!
//! | Operation | Contract |
//! |-----------|----------|
//! | `add` / `add_all` | insert facts; `add_all` is visible all-or-nothing |
//! | `remove` | delete one value or every value of a predicate |
//! | `query` | read-only [`Query`] evaluation |
//! | `apply` | [`GuardedUpdate`]: check guards and write as one step |
//!
//! `apply` is the only primitive allowed to implement check-then-act
//! sequences (claiming, status replacement). Implementations backed by a
//! remote store must map it onto a native conditional write.

use async_trait::async_trait;

use crate::domain::graph::{GuardedUpdate, Query, Row, Term, Triple};

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Insert a single fact.
    async fn add(&self, triple: Triple) -> Result<(), StoreError>;

    /// Insert a batch of facts atomically.
    async fn add_all(&self, triples: Vec<Triple>) -> Result<(), StoreError>;

    /// Remove `subject predicate object`, or every value of the predicate when
    /// `object` is `None`. Returns the number of facts removed.
    async fn remove(
        &self,
        subject: &str,
        predicate: &str,
        object: Option<&Term>,
    ) -> Result<usize, StoreError>;

    /// Evaluate a read-only pattern query.
    async fn query(&self, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// Apply a guarded update. `Ok(false)` means a guard failed and nothing
    /// was written.
    async fn apply(&self, update: GuardedUpdate) -> Result<bool, StoreError>;
}

/// Graph store errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}
