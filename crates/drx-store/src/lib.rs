// SPDX-License-Identifier: MIT OR Apache-2.0
//! drx-store
//!
//! Artifact object-store gateway and result DAO.
//!
//! Both edges are narrow traits — [`ObjectStore`] and [`ResultStore`] —
//! with an S3-backed and an in-memory implementation each. Key naming is
//! deterministic from `(mawb, airport, customer, template)`, so an artifact
//! can always be re-signed or re-fetched without the original filename.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Deterministic artifact key naming.
pub mod keys;
/// Object-store trait, S3 and in-memory implementations, artifact gateway.
pub mod object;
/// Result DAO trait, retrying wrapper, in-memory implementation.
pub mod results;

pub use keys::ArtifactKeys;
pub use object::{ArtifactGateway, MemoryStore, ObjectStore, S3Store};
pub use results::{MemoryResultStore, ResultStore, RetryingResultStore};

use drx_retry::Transient;
use thiserror::Error;

/// Errors from either persistence edge.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object store rejected or failed an operation.
    #[error("object store operation failed: {message}")]
    Object {
        /// Provider error text.
        message: String,
    },

    /// The requested key does not exist.
    #[error("object not found: {key}")]
    NotFound {
        /// Key that was requested.
        key: String,
    },

    /// The result datastore failed an operation.
    #[error("result datastore operation failed: {message}")]
    Datastore {
        /// Driver error text.
        message: String,
    },
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            StoreError::NotFound { .. } => false,
            StoreError::Object { message } | StoreError::Datastore { message } => {
                drx_retry::is_transient_message(message)
            }
        }
    }

    fn is_connection_error(&self) -> bool {
        match self {
            StoreError::NotFound { .. } => false,
            StoreError::Object { message } | StoreError::Datastore { message } => {
                drx_retry::is_connection_message(message)
            }
        }
    }
}
