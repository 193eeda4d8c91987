//! Error types for the public simulation API.
//!
//! Nothing inside the tick loop returns these: systems skip and log instead.
//! They surface only where a caller addresses the world from outside
//! (issuing commands to an entity id, loading configuration, persistence).

use thiserror::Error;

use crate::components::{ComponentKind, EntityId};

/// Errors returned by [`SimWorld`](crate::SimWorld) and its collaborators.
#[derive(Debug, Error)]
pub enum SimError {
    /// No live entity carries this id.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    /// The entity exists but lacks the component an operation needs.
    #[error("entity {id} has no {kind} component")]
    MissingComponent {
        /// Target entity.
        id: EntityId,
        /// The component that was required.
        kind: ComponentKind,
    },

    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The layout store failed to read or write.
    #[error("layout store error: {0}")]
    Store(String),

    /// JSON (de)serialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used across the crate.
pub type SimResult<T> = Result<T, SimError>;
