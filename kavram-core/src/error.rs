//! # Error Types for Kavram
//!
//! Unified error handling across all Kavram crates.
//!
//! Almost every failure here is absorbed locally: the engine degrades to
//! an empty result or a low-confidence fallback answer instead of failing
//! the caller. The variants exist so that callers and diagnostics can see
//! *why* something was a no-op.

use thiserror::Error;

use crate::association::AssociationId;
use crate::node::Side;

/// Main error type for Kavram operations
#[derive(Error, Debug)]
pub enum KavramError {
    /// A training pair where one side trims to nothing
    #[error("Empty input: both query and response must contain text")]
    EmptyInput,

    /// Reinforcement or lookup of something that does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A grid layer ran out of free coordinates (resolved by eviction)
    #[error("Capacity exceeded on {side:?} layer {layer}, evicting")]
    CapacityExceeded { side: Side, layer: u16 },

    /// A query had no token that could seed activation
    #[error("No seed token could be resolved")]
    NoSeedResolved,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Snapshot encoding/decoding error
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Kavram operations
pub type KavramResult<T> = Result<T, KavramError>;

impl KavramError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a snapshot error
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot(msg.into())
    }

    /// Unknown association id
    pub fn association_not_found(id: AssociationId) -> Self {
        Self::NotFound(format!("association #{}", id.0))
    }

    /// Unknown (query, response) token pair
    pub fn pair_not_found(query: &str, response: &str) -> Self {
        Self::NotFound(format!("association '{}' -> '{}'", query, response))
    }

    /// Whether this error is one the engine absorbs as a no-op
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Self::EmptyInput
                | Self::NotFound(_)
                | Self::CapacityExceeded { .. }
                | Self::NoSeedResolved
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_errors() {
        assert!(KavramError::EmptyInput.is_soft());
        assert!(KavramError::association_not_found(AssociationId(3)).is_soft());
        assert!(!KavramError::snapshot("truncated").is_soft());
    }

    #[test]
    fn test_messages() {
        let err = KavramError::CapacityExceeded { side: Side::Query, layer: 2 };
        assert_eq!(err.to_string(), "Capacity exceeded on Query layer 2, evicting");
        assert_eq!(
            KavramError::association_not_found(AssociationId(7)).to_string(),
            "Not found: association #7"
        );
    }
}
