// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscription engine for the adapter host.
//!
//! A [`SubscriptionManager`] fans one upstream value stream out to many
//! [`SubscriptionChannel`]s. Behaviors decide which subscriptions a value goes
//! to; [`TopicBehavior`] routes by a per-subscription topic set that can change
//! while the subscription runs. The snapshot and event push features are
//! built on top.

pub mod channel;
pub mod events;
pub mod manager;
pub mod snapshot;
pub mod topic;

pub use channel::{ChannelConfig, ChannelState, SubscriptionChannel, SubscriptionStream};
pub use events::{EventFilter, EventMessageManager};
pub use manager::{
    BroadcastBehavior, Subscription, SubscriptionBehavior, SubscriptionEvent, SubscriptionInfo,
    SubscriptionManager, SubscriptionOptions,
};
pub use snapshot::{SnapshotTagValueManager, TagResolver, TagTopics};
pub use topic::{
    StringTopics, TopicBehavior, TopicResolver, TopicState, TopicSubscriptionManager, Topical,
};
