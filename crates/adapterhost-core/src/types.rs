// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across feature contracts and the adapter host.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::HostError;

/// The principal making a call, as established by the (external) authentication layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Display name of the principal. Empty for anonymous callers.
    pub name: String,
    /// Claims attached to the principal as `(type, value)` pairs.
    pub claims: Vec<(String, String)>,
}

impl Principal {
    /// Create a principal with no claims.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            claims: Vec::new(),
        }
    }

    /// Add a claim.
    pub fn with_claim(mut self, claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.push((claim_type.into(), value.into()));
        self
    }

    /// Returns true if the principal holds a claim with the given type and value.
    pub fn has_claim(&self, claim_type: &str, value: &str) -> bool {
        self.claims
            .iter()
            .any(|(t, v)| t == claim_type && v == value)
    }
}

/// Identity of the caller, passed through every public entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    principal: Principal,
    connection_id: String,
    correlation_id: String,
}

impl CallerContext {
    /// Create a caller context. The connection id must not be empty.
    pub fn new(principal: Principal, connection_id: impl Into<String>) -> Result<Self, HostError> {
        let connection_id = connection_id.into();
        if connection_id.trim().is_empty() {
            return Err(HostError::invalid_argument(
                "connection_id",
                "connection id must not be empty",
            ));
        }
        Ok(Self {
            principal,
            connection_id,
            correlation_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Per-context id for correlating log events.
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

// --- Adapter descriptors ---

/// Public description of an adapter instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterDescriptor {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// Describes the implementation type behind an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterTypeDescriptor {
    pub type_name: String,
    pub version: semver::Version,
    pub vendor: Option<String>,
}

/// Adapter descriptor plus the features it currently exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterDescriptorExtended {
    pub descriptor: AdapterDescriptor,
    pub adapter_type: AdapterTypeDescriptor,
    pub features: Vec<String>,
    pub extensions: Vec<String>,
}

/// Lifecycle state of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum AdapterState {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
}

// --- Health ---

/// Health status reported by health checks, ordered from best to worst.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// A structured health check result with optional nested results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub description: Option<String>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inner_results: Vec<HealthCheckResult>,
}

impl HealthCheckResult {
    fn with_status(status: HealthStatus, description: Option<String>) -> Self {
        Self {
            status,
            description,
            error: None,
            data: BTreeMap::new(),
            inner_results: Vec::new(),
        }
    }

    pub fn healthy(description: impl Into<String>) -> Self {
        Self::with_status(HealthStatus::Healthy, Some(description.into()))
    }

    pub fn degraded(description: impl Into<String>) -> Self {
        Self::with_status(HealthStatus::Degraded, Some(description.into()))
    }

    pub fn unhealthy(description: impl Into<String>) -> Self {
        Self::with_status(HealthStatus::Unhealthy, Some(description.into()))
    }

    /// Build a composite result whose status is the worst of its inner results.
    ///
    /// A composite with no inner results is healthy.
    pub fn composite(description: impl Into<String>, inner_results: Vec<HealthCheckResult>) -> Self {
        let status = inner_results
            .iter()
            .map(|r| r.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);
        Self {
            inner_results,
            ..Self::with_status(status, Some(description.into()))
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

// --- Tag value types ---

/// Identifies a tag on a data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagIdentifier {
    pub id: String,
    pub name: String,
}

/// A tag definition returned by tag search and tag info features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagDefinition {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub units: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl TagDefinition {
    pub fn identifier(&self) -> TagIdentifier {
        TagIdentifier {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Quality of a tag value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum TagValueQuality {
    Good,
    Uncertain,
    Bad,
}

/// A single timestamped tag value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagValue {
    pub timestamp: DateTime<Utc>,
    pub value: serde_json::Value,
    pub quality: TagValueQuality,
}

/// A tag value tagged with the tag it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagValueQueryResult {
    pub tag_id: String,
    pub tag_name: String,
    pub value: TagValue,
}

/// Request for finding tags by name pattern with 1-based paging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindTagsRequest {
    pub name: Option<String>,
    pub page_size: usize,
    pub page: usize,
}

impl Default for FindTagsRequest {
    fn default() -> Self {
        Self {
            name: None,
            page_size: 10,
            page: 1,
        }
    }
}

// --- Event types ---

/// Priority of an event message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum EventPriority {
    Low,
    Normal,
    High,
    Critical,
}

/// An event message published by a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub topic: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub priority: EventPriority,
    pub message: String,
}

// --- Topic subscription updates ---

/// Whether a topic update adds or removes topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum TopicAction {
    Subscribe,
    Unsubscribe,
}

/// A change to the set of topics a subscription is interested in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSubscriptionUpdate {
    pub action: TopicAction,
    pub topics: Vec<String>,
}
