// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Entities, value objects and the graph-store contract of the coordination
//! fabric. Nothing in this layer performs I/O.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Task, workflow, agent, capability and message models

pub mod agent;
pub mod capability;
pub mod config;
pub mod error;
pub mod events;
pub mod graph;
pub mod ids;
pub mod message;
pub mod repository;
pub mod task;
pub mod vocabulary;
pub mod workflow;
