// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! AEGIS Fabric
//!
//! Capability-addressed task and workflow coordination over a shared graph
//! store. Agents create tasks and workflows, discover and claim work that
//! matches their declared capabilities, and exchange targeted or broadcast
//! notifications. All state lives in the graph.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, registries, coordinator and HTTP surface

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use application::{Coordinator, CoordinatorResponse, Fabric};
pub use domain::error::{CoordinationError, CoordinationResult, ErrorKind};
pub use infrastructure::{EventBus, InMemoryGraphStore};
