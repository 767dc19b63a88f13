// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Feature contracts and host collaborator traits.
//!
//! Every feature contract extends the [`Feature`] base trait and uses
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod auth;
pub mod feature;
pub mod health;
pub mod push;
pub mod storage;
pub mod tags;

pub use auth::{AllowAll, AuthorizationPolicy, FnAuthorizationPolicy};
pub use feature::{ExtensionFeature, ExtensionOperation, Feature, FeatureProvider};
pub use health::HealthCheck;
pub use push::{
    CreateEventMessageSubscriptionRequest, CreateSnapshotTagValueSubscriptionRequest,
    EventMessagePush, SnapshotTagValuePush,
};
pub use storage::KeyValueStore;
pub use tags::{ReadSnapshotTagValues, TagInfo, TagSearch};
