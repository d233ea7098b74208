// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Coordination Errors
//!
//! A single error type for every registry and coordinator operation. Each
//! variant maps to an [`ErrorKind`] so callers can decide what to do next:
//!
//! | Kind | Caller reaction |
//! |------|-----------------|
//! | `not_found` | give up |
//! | `precondition_failed` | re-query and pick another task |
//! | `malformed_input` | fix the request |
//! | `store_unavailable` | retry later |
//! | `internal` | report |
//!
//! Retries are never attempted inside this crate.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::repository::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    PreconditionFailed,
    MalformedInput,
    StoreUnavailable,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::PreconditionFailed => "precondition_failed",
            Self::MalformedInput => "malformed_input",
            Self::StoreUnavailable => "store_unavailable",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinationError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Unknown {field} '{value}'")]
    UnknownKey {
        field: &'static str,
        value: String,
        known: Vec<String>,
    },

    #[error("Graph store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoordinationError {
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            Self::MalformedInput(_) | Self::UnknownKey { .. } => ErrorKind::MalformedInput,
            Self::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Only store outages are worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    pub fn known_keys(&self) -> Option<&[String]> {
        match self {
            Self::UnknownKey { known, .. } => Some(known),
            _ => None,
        }
    }
}

impl From<StoreError> for CoordinationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
            StoreError::InvalidQuery(msg) => Self::Internal(format!("invalid query: {}", msg)),
        }
    }
}

impl From<serde_json::Error> for CoordinationError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedInput(err.to_string())
    }
}

pub type CoordinationResult<T> = Result<T, CoordinationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_keep_a_distinguishable_kind() {
        let err: CoordinationError = StoreError::Unavailable("connection refused".into()).into();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        assert!(err.is_retryable());

        let err = CoordinationError::not_found("task", "task:1");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "task not found: task:1");
    }

    #[test]
    fn unknown_keys_are_malformed_input_with_known_list() {
        let err = CoordinationError::UnknownKey {
            field: "message_type",
            value: "launch".into(),
            known: vec!["create_task".into()],
        };
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert_eq!(err.known_keys(), Some(&["create_task".to_string()][..]));
    }
}
