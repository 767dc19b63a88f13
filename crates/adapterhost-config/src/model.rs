// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the adapter host.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Maximum length of an adapter or subscription name.
pub const MAX_NAME_LENGTH: usize = 200;

/// Upper bound for the page size accepted by adapter queries.
pub const MAX_PAGE_SIZE: usize = 500;

/// Top-level host configuration.
///
/// Loaded from TOML files with environment variable overrides. All sections
/// are optional and default to sensible values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Host-wide settings.
    #[serde(default)]
    pub host: HostSection,

    /// Defaults applied to every subscription manager.
    #[serde(default)]
    pub subscriptions: SubscriptionManagerOptions,

    /// Adapters hosted by this process, keyed by adapter id.
    #[serde(default)]
    pub adapters: BTreeMap<String, AdapterOptions>,
}

/// Host-wide settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HostSection {
    /// Display name of the host, used in log events.
    #[serde(default = "default_host_name")]
    pub name: String,

    /// Page size used by `find_adapters` when the caller does not pass one.
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            name: default_host_name(),
            default_page_size: default_page_size(),
        }
    }
}

fn default_host_name() -> String {
    "adapterhost".to_string()
}

fn default_page_size() -> usize {
    10
}

/// Options for a single adapter.
///
/// The adapter id is fixed when the adapter is built; everything here can be
/// replaced at runtime through a live options source.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AdapterOptions {
    /// Adapter display name.
    #[serde(default)]
    pub name: String,

    /// Optional adapter description.
    #[serde(default)]
    pub description: Option<String>,

    /// Disabled adapters cannot be started and are hidden from callers.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            enabled: true,
        }
    }
}

impl AdapterOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

fn default_true() -> bool {
    true
}

/// Limits and buffer sizes for a subscription manager.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionManagerOptions {
    /// Maximum number of concurrent subscriptions. Zero means unlimited.
    #[serde(default)]
    pub max_subscriptions: usize,

    /// Per-subscription buffer size, used for both ingress and egress.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Size of the manager's dispatch queue.
    #[serde(default = "default_dispatch_capacity")]
    pub dispatch_capacity: usize,
}

impl Default for SubscriptionManagerOptions {
    fn default() -> Self {
        Self {
            max_subscriptions: 0,
            channel_capacity: default_channel_capacity(),
            dispatch_capacity: default_dispatch_capacity(),
        }
    }
}

impl SubscriptionManagerOptions {
    pub fn with_max_subscriptions(mut self, max_subscriptions: usize) -> Self {
        self.max_subscriptions = max_subscriptions;
        self
    }
}

fn default_channel_capacity() -> usize {
    100
}

fn default_dispatch_capacity() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = HostConfig::default();
        assert_eq!(config.host.name, "adapterhost");
        assert_eq!(config.host.default_page_size, 10);
        assert_eq!(config.subscriptions.max_subscriptions, 0);
        assert!(config.adapters.is_empty());
        assert!(AdapterOptions::default().enabled);
    }

    #[test]
    fn adapter_options_builders() {
        let options = AdapterOptions::named("historian")
            .with_description("plant historian")
            .with_enabled(false);
        assert_eq!(options.name, "historian");
        assert_eq!(options.description.as_deref(), Some("plant historian"));
        assert!(!options.enabled);
    }
}
