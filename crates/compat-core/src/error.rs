//! Error types and handling for the compatibility layer
//!
//! This module defines every error the legacy surface can produce and the
//! policy behind each one.
//!
//! # Error Categories
//!
//! - **Capability gaps** - legacy methods with no engine equivalent; a
//!   deliberate, permanent fail-fast. Never silently ignored.
//! - **Precondition failures** - missing call object, missing target
//!   element, an operation attempted in the wrong state. Caller contract
//!   violations; never retried.
//! - **Transport failures** - join/leave/control rejections from the
//!   engine, propagated with the engine's reason attached.
//!
//! Everything recoverable is NOT an error: device denial surfaces as the
//! `accessDenied` publisher event and engine exceptions surface as the
//! session `exception` event. Nothing is retried by this layer; retry, if
//! any, belongs to the engine.
//!
//! # Basic Pattern
//!
//! ```rust,no_run
//! # use roomlink_compat_core::{CompatError, Session};
//! # use std::sync::Arc;
//! # async fn example(session: Arc<Session>) {
//! match session.connect("token").await {
//!     Ok(()) => println!("connected"),
//!     Err(CompatError::JoinFailed { reason }) => {
//!         eprintln!("engine refused the join: {}", reason);
//!     }
//!     Err(e) if e.is_precondition() => {
//!         eprintln!("caller bug: {}", e);
//!     }
//!     Err(e) => eprintln!("unexpected error: {}", e),
//! }
//! # }
//! ```

use thiserror::Error;

/// Result type alias for compatibility-layer operations
pub type CompatResult<T> = Result<T, CompatError>;

/// Errors produced by the legacy-compatible surface
#[derive(Error, Debug, Clone)]
pub enum CompatError {
    /// Deliberate capability gaps
    #[error("Not implemented: {feature}")]
    NotImplemented { feature: String },

    /// Precondition failures
    #[error("Call object not initialized")]
    CallObjectNotInitialized,

    #[error("No target element provided")]
    MissingTargetElement,

    #[error("Target element not found: {target}")]
    TargetElementNotFound { target: String },

    #[error("Invalid stream: {reason}")]
    InvalidStream { reason: String },

    #[error("Invalid session state: expected {expected}, got {actual}")]
    InvalidSessionState { expected: String, actual: String },

    /// Transport failures from the engine
    #[error("Join failed: {reason}")]
    JoinFailed { reason: String },

    #[error("Engine operation failed: {operation}: {reason}")]
    EngineOperationFailed { operation: String, reason: String },
}

impl CompatError {
    /// Create a not-implemented error for a named legacy feature
    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::NotImplemented { feature: feature.into() }
    }

    /// Create a join-failed error
    pub fn join_failed(reason: impl std::fmt::Display) -> Self {
        Self::JoinFailed { reason: reason.to_string() }
    }

    /// Create an engine-operation-failed error
    pub fn engine_op(operation: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::EngineOperationFailed {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid-session-state error
    pub fn invalid_state(expected: impl Into<String>, actual: impl std::fmt::Debug) -> Self {
        Self::InvalidSessionState {
            expected: expected.into(),
            actual: format!("{actual:?}"),
        }
    }

    /// Check if this error is a caller contract violation
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            CompatError::CallObjectNotInitialized
                | CompatError::MissingTargetElement
                | CompatError::TargetElementNotFound { .. }
                | CompatError::InvalidStream { .. }
                | CompatError::InvalidSessionState { .. }
        )
    }

    /// Check if this error is a permanent capability gap
    pub fn is_capability_gap(&self) -> bool {
        matches!(self, CompatError::NotImplemented { .. })
    }

    /// Check if retrying (by the caller) could ever succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CompatError::JoinFailed { .. } | CompatError::EngineOperationFailed { .. }
        )
    }

    /// Get error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            CompatError::NotImplemented { .. } => "capability",

            CompatError::CallObjectNotInitialized
            | CompatError::MissingTargetElement
            | CompatError::TargetElementNotFound { .. }
            | CompatError::InvalidStream { .. }
            | CompatError::InvalidSessionState { .. } => "precondition",

            CompatError::JoinFailed { .. }
            | CompatError::EngineOperationFailed { .. } => "transport",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_partition_the_taxonomy() {
        assert_eq!(CompatError::not_implemented("forceDisconnect").category(), "capability");
        assert_eq!(CompatError::CallObjectNotInitialized.category(), "precondition");
        assert_eq!(CompatError::join_failed("room full").category(), "transport");
    }

    #[test]
    fn only_transport_errors_are_recoverable() {
        assert!(CompatError::join_failed("timeout").is_recoverable());
        assert!(CompatError::engine_op("leave", "socket closed").is_recoverable());
        assert!(!CompatError::MissingTargetElement.is_recoverable());
        assert!(!CompatError::not_implemented("getStats").is_recoverable());
    }

    #[test]
    fn precondition_predicate_matches_contract_violations() {
        assert!(CompatError::MissingTargetElement.is_precondition());
        assert!(
            CompatError::TargetElementNotFound { target: "root".into() }.is_precondition()
        );
        assert!(!CompatError::join_failed("nope").is_precondition());
    }
}
