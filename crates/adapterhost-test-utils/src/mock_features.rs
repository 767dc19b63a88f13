// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory feature implementations for tests.
//!
//! `MockTagSource` backs the tag features with a fixed tag list and pushes
//! values through a real [`SnapshotTagValueManager`]. `MockExtension` echoes
//! its payloads.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use adapterhost_config::SubscriptionManagerOptions;
use adapterhost_core::{
    CallerContext, ExtensionFeature, ExtensionOperation, Feature, FeatureHandle, FeatureProvider,
    FeatureUri, FindTagsRequest, HealthCheckResult, HostError, ReadSnapshotTagValues,
    TagDefinition, TagIdentifier, TagInfo, TagSearch, TagValue, TagValueQuality,
    TagValueQueryResult, TaskScheduler,
};
use adapterhost_subscriptions::{SnapshotTagValueManager, TagResolver};
use async_trait::async_trait;

/// Fixed set of tags with mutable current values.
pub struct MockTagSource {
    tags: Vec<TagDefinition>,
    values: Mutex<HashMap<String, TagValue>>,
    health: Mutex<Option<HealthCheckResult>>,
    disposals: AtomicUsize,
}

impl MockTagSource {
    /// Tags named `name` get the id `name` lowercased with spaces replaced by dashes.
    pub fn with_tags<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let tags = names
            .into_iter()
            .map(|name| TagDefinition {
                id: name.to_lowercase().replace(' ', "-"),
                name: name.to_string(),
                description: None,
                units: None,
                properties: Default::default(),
            })
            .collect();
        Self {
            tags,
            values: Mutex::new(HashMap::new()),
            health: Mutex::new(None),
            disposals: AtomicUsize::new(0),
        }
    }

    fn find(&self, tag: &str) -> Option<&TagDefinition> {
        self.tags
            .iter()
            .find(|t| t.id.eq_ignore_ascii_case(tag) || t.name.eq_ignore_ascii_case(tag))
    }

    /// Set the current value of a tag and return it as a query result.
    pub fn set_value(&self, tag: &str, value: serde_json::Value) -> Option<TagValueQueryResult> {
        let definition = self.find(tag)?;
        let value = TagValue {
            timestamp: chrono::Utc::now(),
            value,
            quality: TagValueQuality::Good,
        };
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(definition.id.clone(), value.clone());
        Some(TagValueQueryResult {
            tag_id: definition.id.clone(),
            tag_name: definition.name.clone(),
            value,
        })
    }

    /// Make the source report `result` as its feature health.
    pub fn set_health(&self, result: Option<HealthCheckResult>) {
        *self
            .health
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = result;
    }

    /// Number of times the source was disposed.
    pub fn disposals(&self) -> usize {
        self.disposals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Feature for MockTagSource {
    fn dispose(&self) -> Option<Result<(), HostError>> {
        self.disposals.fetch_add(1, Ordering::SeqCst);
        Some(Ok(()))
    }

    async fn check_feature_health(&self) -> Option<HealthCheckResult> {
        self.health
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TagInfo for MockTagSource {
    async fn get_tags(
        &self,
        _context: &CallerContext,
        tags: &[String],
    ) -> Result<Vec<TagDefinition>, HostError> {
        Ok(tags.iter().filter_map(|t| self.find(t).cloned()).collect())
    }
}

#[async_trait]
impl TagSearch for MockTagSource {
    async fn find_tags(
        &self,
        _context: &CallerContext,
        request: &FindTagsRequest,
    ) -> Result<Vec<TagDefinition>, HostError> {
        let pattern = request.name.as_deref().map(str::to_lowercase);
        let page_size = request.page_size.max(1);
        Ok(self
            .tags
            .iter()
            .filter(|t| {
                pattern
                    .as_deref()
                    .is_none_or(|p| t.name.to_lowercase().contains(p))
            })
            .skip(request.page.max(1).saturating_sub(1) * page_size)
            .take(page_size)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReadSnapshotTagValues for MockTagSource {
    async fn read_snapshot_tag_values(
        &self,
        _context: &CallerContext,
        tags: &[String],
    ) -> Result<Vec<TagValueQueryResult>, HostError> {
        let values = self
            .values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(tags
            .iter()
            .filter_map(|tag| {
                let definition = self.find(tag)?;
                let value = values.get(&definition.id)?;
                Some(TagValueQueryResult {
                    tag_id: definition.id.clone(),
                    tag_name: definition.name.clone(),
                    value: value.clone(),
                })
            })
            .collect())
    }
}

#[async_trait]
impl TagResolver for MockTagSource {
    async fn resolve_tag(
        &self,
        _context: &CallerContext,
        tag: &str,
    ) -> Result<Option<TagIdentifier>, HostError> {
        Ok(self.find(tag).map(TagDefinition::identifier))
    }
}

impl FeatureProvider for MockTagSource {
    fn declare_features(self: Arc<Self>) -> Vec<FeatureHandle> {
        vec![
            FeatureHandle::tag_info(Arc::clone(&self)),
            FeatureHandle::tag_search(Arc::clone(&self)),
            FeatureHandle::read_snapshot_tag_values(self),
        ]
    }
}

/// Build a snapshot push feature backed by `source`.
pub fn snapshot_push(
    source: Arc<MockTagSource>,
    scheduler: Arc<dyn TaskScheduler>,
) -> Result<Arc<SnapshotTagValueManager<MockTagSource>>, HostError> {
    Ok(Arc::new(SnapshotTagValueManager::new(
        source,
        SubscriptionManagerOptions::default(),
        scheduler,
    )?))
}

/// Extension feature that echoes its payload back.
pub struct MockExtension {
    uris: Vec<FeatureUri>,
    invocations: AtomicUsize,
}

impl MockExtension {
    pub fn new(uris: &[&str]) -> Result<Self, HostError> {
        Ok(Self {
            uris: uris
                .iter()
                .map(|u| FeatureUri::parse(u))
                .collect::<Result<_, _>>()?,
            invocations: AtomicUsize::new(0),
        })
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Feature for MockExtension {}

#[async_trait]
impl ExtensionFeature for MockExtension {
    fn extension_uris(&self) -> Vec<FeatureUri> {
        self.uris.clone()
    }

    fn display_name(&self) -> String {
        "Echo".to_string()
    }

    fn operations(&self) -> Vec<ExtensionOperation> {
        vec![ExtensionOperation {
            name: "echo".to_string(),
            description: Some("Returns the payload unchanged".to_string()),
        }]
    }

    async fn invoke(
        &self,
        _context: &CallerContext,
        operation: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, HostError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        match operation {
            "echo" => Ok(payload),
            other => Err(HostError::invalid_argument(
                "operation",
                format!("unknown operation `{other}`"),
            )),
        }
    }
}

impl FeatureProvider for MockExtension {
    fn declare_features(self: Arc<Self>) -> Vec<FeatureHandle> {
        vec![FeatureHandle::extension(self)]
    }
}
