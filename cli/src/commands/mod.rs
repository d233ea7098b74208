// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the fabric CLI

pub mod config;
pub mod dispatch;
pub mod serve;

pub use self::config::ConfigCommand;
pub use self::dispatch::DispatchArgs;
pub use self::serve::ServeArgs;
