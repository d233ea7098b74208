// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`aegis-fabric-core`)
//!
//! HTTP surface that translates external requests into coordinator calls.
//! No coordination logic lives here; every request is handed to
//! `crate::application::Coordinator`.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP/SSE (Axum) | Dispatch endpoint, event stream, health probe |

pub mod api;
