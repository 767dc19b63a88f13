// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the adapter host.

use thiserror::Error;

/// The primary error type used across feature contracts, registries, and
/// subscription managers.
///
/// Resolution misses and authorization denials are normally reported as data
/// (see `ResolvedAdapterFeature` in the runtime crate); the `AdapterNotFound`,
/// `FeatureNotFound` and `Forbidden` variants exist for callers that convert
/// such a result into an error.
#[derive(Debug, Error)]
pub enum HostError {
    /// An argument failed validation at the API boundary.
    #[error("invalid argument `{name}`: {message}")]
    InvalidArgument { name: String, message: String },

    /// A feature implementation does not implement the contract named by its key,
    /// or the key itself is not a valid feature URI.
    #[error("invalid feature `{uri}`: {message}")]
    InvalidFeature { uri: String, message: String },

    /// A feature key is already registered.
    #[error("feature `{uri}` is already registered")]
    DuplicateFeature { uri: String },

    /// No adapter with the given id is visible to the caller.
    #[error("adapter not found: {adapter_id}")]
    AdapterNotFound { adapter_id: String },

    /// The adapter does not expose the requested feature.
    #[error("feature `{uri}` not found on adapter {adapter_id}")]
    FeatureNotFound { adapter_id: String, uri: String },

    /// The caller is not authorized to use the feature.
    #[error("caller is not authorized to use feature `{uri}` on adapter {adapter_id}")]
    Forbidden { adapter_id: String, uri: String },

    /// A configured capacity limit would be exceeded.
    #[error("capacity exceeded: {resource} limit is {limit}")]
    CapacityExceeded { resource: String, limit: usize },

    /// The object has been disposed.
    #[error("{object} has been disposed")]
    Disposed { object: String },

    /// The operation is not valid in the current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The adapter is disabled and cannot be started.
    #[error("adapter {adapter_id} is disabled")]
    AdapterDisabled { adapter_id: String },

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Key-value store failures (serialization, backend I/O).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Options failed validation.
    #[error("invalid options: {0}")]
    Options(String),

    /// A feature implementation failed.
    #[error("feature error: {message}")]
    Feature {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HostError {
    /// Shorthand for [`HostError::InvalidArgument`].
    pub fn invalid_argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Shorthand for [`HostError::Disposed`].
    pub fn disposed(object: impl Into<String>) -> Self {
        Self::Disposed {
            object: object.into(),
        }
    }

    /// Returns true for the "not found" family (adapter or feature).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::AdapterNotFound { .. } | Self::FeatureNotFound { .. }
        )
    }

    /// Returns true when the error represents cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<serde_json::Error> for HostError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage {
            source: Box::new(err),
        }
    }
}
