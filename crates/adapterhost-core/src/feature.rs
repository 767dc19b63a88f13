// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Feature identifiers and type-erased feature handles.
//!
//! A feature is identified by a [`FeatureUri`]. Standard features live under
//! [`STANDARD_FEATURE_PREFIX`] and map onto the closed [`StandardFeature`]
//! enum; anything under [`EXTENSION_FEATURE_PREFIX`] is an extension that
//! carries its URI in [`FeatureKind::Extension`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::error::HostError;
use crate::traits::{
    EventMessagePush, ExtensionFeature, Feature, HealthCheck, ReadSnapshotTagValues,
    SnapshotTagValuePush, TagInfo, TagSearch,
};

/// URI prefix shared by all standard features.
pub const STANDARD_FEATURE_PREFIX: &str = "asc:features/";

/// URI prefix shared by all extension features.
pub const EXTENSION_FEATURE_PREFIX: &str = "asc:extensions/";

/// A normalized feature URI.
///
/// Parsing trims whitespace, lowercases the scheme, and appends a trailing `/`
/// so that `asc:features/x` and `asc:features/x/` are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeatureUri(String);

impl FeatureUri {
    /// Parse and normalize a feature URI.
    pub fn parse(value: &str) -> Result<Self, HostError> {
        let trimmed = value.trim();
        let invalid = |message: &str| HostError::InvalidFeature {
            uri: value.to_string(),
            message: message.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid("feature URI must not be empty"));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(invalid("feature URI must not contain whitespace"));
        }
        let Some((scheme, rest)) = trimmed.split_once(':') else {
            return Err(invalid("feature URI must be absolute"));
        };
        let scheme_valid = scheme
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !scheme_valid {
            return Err(invalid("feature URI has an invalid scheme"));
        }
        if rest.trim_matches('/').is_empty() {
            return Err(invalid("feature URI must have a path"));
        }

        let mut normalized = format!("{}:{rest}", scheme.to_ascii_lowercase());
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for URIs under [`STANDARD_FEATURE_PREFIX`].
    pub fn is_standard(&self) -> bool {
        self.0.starts_with(STANDARD_FEATURE_PREFIX)
    }

    /// True for URIs under [`EXTENSION_FEATURE_PREFIX`].
    pub fn is_extension(&self) -> bool {
        self.0.starts_with(EXTENSION_FEATURE_PREFIX)
    }
}

impl fmt::Display for FeatureUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FeatureUri {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FeatureUri {
    type Error = HostError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FeatureUri> for String {
    fn from(uri: FeatureUri) -> Self {
        uri.0
    }
}

/// The standard feature contracts known to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum StandardFeature {
    HealthCheck,
    TagInfo,
    TagSearch,
    ReadSnapshotTagValues,
    SnapshotTagValuePush,
    EventMessagePush,
}

impl StandardFeature {
    /// The stable URI string of this feature.
    pub fn uri_str(self) -> &'static str {
        match self {
            Self::HealthCheck => "asc:features/diagnostics/health-check/",
            Self::TagInfo => "asc:features/real-time-data/tags/info/",
            Self::TagSearch => "asc:features/real-time-data/tags/search/",
            Self::ReadSnapshotTagValues => "asc:features/real-time-data/values/read/snapshot/",
            Self::SnapshotTagValuePush => "asc:features/real-time-data/values/push/",
            Self::EventMessagePush => "asc:features/events/push/",
        }
    }

    pub fn uri(self) -> FeatureUri {
        FeatureUri(self.uri_str().to_string())
    }

    /// Human-readable name used in health results and descriptors.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::HealthCheck => "Health Check",
            Self::TagInfo => "Tag Info",
            Self::TagSearch => "Tag Search",
            Self::ReadSnapshotTagValues => "Read Snapshot Tag Values",
            Self::SnapshotTagValuePush => "Snapshot Tag Value Push",
            Self::EventMessagePush => "Event Message Push",
        }
    }

    /// Looks up the standard feature for a URI.
    pub fn from_uri(uri: &FeatureUri) -> Option<Self> {
        Self::iter().find(|f| f.uri_str() == uri.as_str())
    }
}

/// Runtime tag identifying which contract a feature key denotes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    Standard(StandardFeature),
    Extension(FeatureUri),
}

impl FeatureKind {
    /// Classifies a URI. Fails for standard-prefixed URIs that name no known
    /// feature and for URIs outside both prefixes.
    pub fn from_uri(uri: &FeatureUri) -> Result<Self, HostError> {
        if let Some(standard) = StandardFeature::from_uri(uri) {
            return Ok(Self::Standard(standard));
        }
        if uri.is_extension() {
            return Ok(Self::Extension(uri.clone()));
        }
        let message = if uri.is_standard() {
            "unknown standard feature"
        } else {
            "feature URI is neither a standard feature nor an extension"
        };
        Err(HostError::InvalidFeature {
            uri: uri.to_string(),
            message: message.to_string(),
        })
    }

    pub fn uri(&self) -> FeatureUri {
        match self {
            Self::Standard(f) => f.uri(),
            Self::Extension(uri) => uri.clone(),
        }
    }

    pub fn is_extension(&self) -> bool {
        matches!(self, Self::Extension(_))
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard(standard) => write!(f, "{standard}"),
            Self::Extension(uri) => write!(f, "Extension({uri})"),
        }
    }
}

/// The typed contract object behind a [`FeatureHandle`].
#[derive(Clone)]
pub enum FeatureObject {
    HealthCheck(Arc<dyn HealthCheck>),
    TagInfo(Arc<dyn TagInfo>),
    TagSearch(Arc<dyn TagSearch>),
    ReadSnapshotTagValues(Arc<dyn ReadSnapshotTagValues>),
    SnapshotTagValuePush(Arc<dyn SnapshotTagValuePush>),
    EventMessagePush(Arc<dyn EventMessagePush>),
    Extension(Arc<dyn ExtensionFeature>),
}

/// A feature implementation together with its base [`Feature`] view.
///
/// Handles are built from concrete `Arc<T>` values, so both views point at the
/// same allocation and [`FeatureHandle::identity`] can deduplicate objects
/// registered under several keys.
#[derive(Clone)]
pub struct FeatureHandle {
    object: FeatureObject,
    base: Arc<dyn Feature>,
}

impl FeatureHandle {
    pub fn health_check<T: HealthCheck>(feature: Arc<T>) -> Self {
        Self {
            base: feature.clone(),
            object: FeatureObject::HealthCheck(feature),
        }
    }

    pub fn tag_info<T: TagInfo>(feature: Arc<T>) -> Self {
        Self {
            base: feature.clone(),
            object: FeatureObject::TagInfo(feature),
        }
    }

    pub fn tag_search<T: TagSearch>(feature: Arc<T>) -> Self {
        Self {
            base: feature.clone(),
            object: FeatureObject::TagSearch(feature),
        }
    }

    pub fn read_snapshot_tag_values<T: ReadSnapshotTagValues>(feature: Arc<T>) -> Self {
        Self {
            base: feature.clone(),
            object: FeatureObject::ReadSnapshotTagValues(feature),
        }
    }

    pub fn snapshot_tag_value_push<T: SnapshotTagValuePush>(feature: Arc<T>) -> Self {
        Self {
            base: feature.clone(),
            object: FeatureObject::SnapshotTagValuePush(feature),
        }
    }

    pub fn event_message_push<T: EventMessagePush>(feature: Arc<T>) -> Self {
        Self {
            base: feature.clone(),
            object: FeatureObject::EventMessagePush(feature),
        }
    }

    pub fn extension<T: ExtensionFeature>(feature: Arc<T>) -> Self {
        Self {
            base: feature.clone(),
            object: FeatureObject::Extension(feature),
        }
    }

    pub fn object(&self) -> &FeatureObject {
        &self.object
    }

    /// The base view used for disposal and health checks.
    pub fn as_feature(&self) -> &Arc<dyn Feature> {
        &self.base
    }

    /// The standard feature this handle implements, if it is not an extension.
    pub fn standard_feature(&self) -> Option<StandardFeature> {
        match &self.object {
            FeatureObject::HealthCheck(_) => Some(StandardFeature::HealthCheck),
            FeatureObject::TagInfo(_) => Some(StandardFeature::TagInfo),
            FeatureObject::TagSearch(_) => Some(StandardFeature::TagSearch),
            FeatureObject::ReadSnapshotTagValues(_) => Some(StandardFeature::ReadSnapshotTagValues),
            FeatureObject::SnapshotTagValuePush(_) => Some(StandardFeature::SnapshotTagValuePush),
            FeatureObject::EventMessagePush(_) => Some(StandardFeature::EventMessagePush),
            FeatureObject::Extension(_) => None,
        }
    }

    pub fn as_extension(&self) -> Option<&Arc<dyn ExtensionFeature>> {
        match &self.object {
            FeatureObject::Extension(ext) => Some(ext),
            _ => None,
        }
    }

    /// Every URI this handle can be registered under.
    pub fn uris(&self) -> Vec<FeatureUri> {
        match (&self.object, self.standard_feature()) {
            (_, Some(standard)) => vec![standard.uri()],
            (FeatureObject::Extension(ext), None) => ext.extension_uris(),
            _ => Vec::new(),
        }
    }

    /// True when this handle implements the contract denoted by `uri`.
    pub fn implements(&self, uri: &FeatureUri) -> bool {
        match self.standard_feature() {
            Some(standard) => standard.uri_str() == uri.as_str(),
            None => uri.is_extension() && self.uris().contains(uri),
        }
    }

    /// Address of the underlying object, equal for handles built from the same `Arc`.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.base) as *const () as usize
    }

    /// Human-readable name for the contract registered under `uri`.
    pub fn display_name(&self, uri: &FeatureUri) -> String {
        match (StandardFeature::from_uri(uri), &self.object) {
            (Some(standard), _) => standard.display_name().to_string(),
            (None, FeatureObject::Extension(ext)) => ext.display_name(),
            (None, _) => uri.to_string(),
        }
    }
}

impl fmt::Debug for FeatureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureHandle")
            .field("standard_feature", &self.standard_feature())
            .field("uris", &self.uris())
            .field("identity", &format_args!("{:#x}", self.identity()))
            .finish()
    }
}

/// A standard feature contract that can be recovered from a [`FeatureHandle`].
///
/// Implemented for the `dyn` contract types, e.g. `dyn TagSearch`.
pub trait FeatureContract: Send + Sync + 'static {
    const FEATURE: StandardFeature;

    fn from_object(object: &FeatureObject) -> Option<Arc<Self>>;
}

macro_rules! feature_contract {
    ($contract:ident) => {
        impl FeatureContract for dyn $contract {
            const FEATURE: StandardFeature = StandardFeature::$contract;

            fn from_object(object: &FeatureObject) -> Option<Arc<Self>> {
                match object {
                    FeatureObject::$contract(feature) => Some(feature.clone()),
                    _ => None,
                }
            }
        }
    };
}

feature_contract!(HealthCheck);
feature_contract!(TagInfo);
feature_contract!(TagSearch);
feature_contract!(ReadSnapshotTagValues);
feature_contract!(SnapshotTagValuePush);
feature_contract!(EventMessagePush);
