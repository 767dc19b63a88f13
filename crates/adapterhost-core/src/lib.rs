// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the adapter host.
//!
//! This crate provides the feature contracts, feature identifiers, error
//! taxonomy, and common types used throughout the workspace. Adapters expose
//! their capabilities by implementing the traits defined here.

pub mod error;
pub mod feature;
pub mod kvstore;
pub mod retry;
pub mod scheduler;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::HostError;
pub use feature::{
    EXTENSION_FEATURE_PREFIX, FeatureContract, FeatureHandle, FeatureKind, FeatureObject,
    FeatureUri, STANDARD_FEATURE_PREFIX, StandardFeature,
};
pub use kvstore::{InMemoryKeyValueStore, KeyValueStoreExt, ScopedKeyValueStore};
pub use retry::{ExponentialBackoff, FixedDelay, NoRetry, RetryContext, RetryPolicy, retry_with_policy};
pub use scheduler::{TaskScheduler, TokioTaskScheduler};
pub use types::{
    AdapterDescriptor, AdapterDescriptorExtended, AdapterState, AdapterTypeDescriptor,
    CallerContext, EventMessage, EventPriority, FindTagsRequest, HealthCheckResult, HealthStatus,
    Principal, TagDefinition, TagIdentifier, TagValue, TagValueQuality, TagValueQueryResult,
    TopicAction, TopicSubscriptionUpdate,
};

// Re-export all feature contracts at crate root.
pub use traits::{
    AllowAll, AuthorizationPolicy, CreateEventMessageSubscriptionRequest,
    CreateSnapshotTagValueSubscriptionRequest, EventMessagePush, ExtensionFeature,
    ExtensionOperation, Feature, FeatureProvider, FnAuthorizationPolicy, HealthCheck,
    KeyValueStore, ReadSnapshotTagValues, SnapshotTagValuePush, TagInfo, TagSearch,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_error_has_all_variants() {
        let _ = HostError::invalid_argument("name", "too long");
        let _ = HostError::InvalidFeature {
            uri: "asc:features/x/".into(),
            message: "test".into(),
        };
        let _ = HostError::DuplicateFeature {
            uri: "asc:features/x/".into(),
        };
        let _ = HostError::CapacityExceeded {
            resource: "subscriptions".into(),
            limit: 2,
        };
        let _ = HostError::disposed("registry");
        let _ = HostError::InvalidState("starting".into());
        let _ = HostError::AdapterDisabled {
            adapter_id: "a1".into(),
        };
        let _ = HostError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _ = HostError::Options("bad".into());
        let _ = HostError::Feature {
            message: "test".into(),
            source: None,
        };
        let _ = HostError::Internal("test".into());
    }

    #[test]
    fn not_found_predicate() {
        assert!(
            HostError::AdapterNotFound {
                adapter_id: "a".into()
            }
            .is_not_found()
        );
        assert!(
            HostError::FeatureNotFound {
                adapter_id: "a".into(),
                uri: "asc:features/x/".into()
            }
            .is_not_found()
        );
        assert!(
            !HostError::Forbidden {
                adapter_id: "a".into(),
                uri: "asc:features/x/".into()
            }
            .is_not_found()
        );
        assert!(HostError::Cancelled.is_cancelled());
    }

    #[test]
    fn adapter_state_display_round_trip() {
        use std::str::FromStr;

        for state in [
            AdapterState::Created,
            AdapterState::Starting,
            AdapterState::Running,
            AdapterState::Stopping,
            AdapterState::Stopped,
        ] {
            let parsed = AdapterState::from_str(&state.to_string()).expect("should parse back");
            assert_eq!(state, parsed);
        }
    }

    #[test]
    fn error_display_includes_context() {
        let err = HostError::FeatureNotFound {
            adapter_id: "historian".into(),
            uri: StandardFeature::TagSearch.uri_str().into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("historian"));
        assert!(msg.contains("tags/search"));
    }
}
