// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for host-level integration testing.
//!
//! `TestHarness` loads a host configuration from a temp file, builds one
//! mock-backed adapter per configured entry, and registers them with an
//! [`AdapterAccessor`] guarded by the chosen authorization policy.

use std::collections::BTreeMap;
use std::sync::Arc;

use adapterhost_config::{AdapterOptions, HostConfig, LiveOptions, render_errors};
use adapterhost_core::{
    AllowAll, AuthorizationPolicy, CallerContext, FeatureHandle, HostError, InMemoryKeyValueStore,
    KeyValueStore, Principal, StandardFeature, TaskScheduler, TokioTaskScheduler,
};
use adapterhost_runtime::{Adapter, AdapterAccessor};
use adapterhost_subscriptions::{EventMessageManager, SnapshotTagValueManager};

use crate::mock_adapter::MockHooks;
use crate::mock_features::{MockExtension, MockTagSource, snapshot_push};

/// URI of the echo extension every harness adapter exposes.
pub const ECHO_EXTENSION: &str = "asc:extensions/echo/";

const DEFAULT_CONFIG: &str = r#"
[adapters.a1]
name = "Historian"
"#;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: String,
    tags: Vec<String>,
    policy: Arc<dyn AuthorizationPolicy>,
    start: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: DEFAULT_CONFIG.to_string(),
            tags: vec!["Temperature".to_string(), "Pressure".to_string()],
            policy: Arc::new(AllowAll),
            start: true,
        }
    }

    /// Use `toml` as the host configuration file.
    pub fn with_config(mut self, toml: &str) -> Self {
        self.config = toml.to_string();
        self
    }

    /// Tags exposed by every adapter's mock data source.
    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(ToString::to_string).collect();
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn AuthorizationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Whether enabled adapters are started by `build`. Defaults to true.
    pub fn start_adapters(mut self, start: bool) -> Self {
        self.start = start;
        self
    }

    /// Build the harness, creating all adapters and the accessor.
    pub async fn build(self) -> Result<TestHarness, HostError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| HostError::Internal(e.to_string()))?;
        let path = temp_dir.path().join("adapterhost.toml");
        std::fs::write(&path, &self.config).map_err(|e| HostError::Internal(e.to_string()))?;
        let config = adapterhost_config::load_and_validate_path(&path)
            .map_err(|errors| HostError::Options(render_errors(&errors)))?;

        let scheduler = Arc::new(TokioTaskScheduler::new());
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());
        let accessor = AdapterAccessor::new(self.policy);
        let tag_names: Vec<&str> = self.tags.iter().map(String::as_str).collect();

        let mut adapters = BTreeMap::new();
        for (id, options) in &config.adapters {
            let hosted = HostedMock::build(
                id,
                options.clone(),
                &config,
                &tag_names,
                Arc::clone(&scheduler) as Arc<dyn TaskScheduler>,
                Arc::clone(&store),
            )?;
            accessor.add(Arc::clone(&hosted.adapter) as _)?;
            if self.start && hosted.adapter.is_enabled() {
                hosted.adapter.start().await?;
            }
            adapters.insert(id.clone(), hosted);
        }

        Ok(TestHarness {
            accessor,
            adapters,
            config,
            scheduler,
            store,
            _temp_dir: temp_dir,
        })
    }
}

/// One adapter and the mocks behind it.
pub struct HostedMock {
    pub adapter: Arc<Adapter>,
    pub options: Arc<LiveOptions<AdapterOptions>>,
    pub hooks: Arc<MockHooks>,
    pub tags: Arc<MockTagSource>,
    pub push: Arc<SnapshotTagValueManager<MockTagSource>>,
    pub events: Arc<EventMessageManager>,
    pub extension: Arc<MockExtension>,
}

impl HostedMock {
    fn build(
        id: &str,
        options: AdapterOptions,
        config: &HostConfig,
        tags: &[&str],
        scheduler: Arc<dyn TaskScheduler>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, HostError> {
        let source = Arc::new(MockTagSource::with_tags(tags.iter().copied()));
        let push = snapshot_push(Arc::clone(&source), Arc::clone(&scheduler))?;
        let events = Arc::new(EventMessageManager::new(
            config.subscriptions.clone(),
            Arc::clone(&scheduler),
        )?);
        let extension = Arc::new(MockExtension::new(&[ECHO_EXTENSION])?);
        let hooks = MockHooks::new();
        let live = Arc::new(LiveOptions::new(options));

        let adapter = Adapter::<AdapterOptions>::builder_with_source(id, Arc::clone(&live) as _)
            .hooks(Arc::clone(&hooks) as _)
            .scheduler(scheduler)
            .key_value_store(store)
            .health_options(config.subscriptions.clone())
            .provider(Arc::clone(&source))
            .provider(Arc::clone(&extension))
            .feature(
                StandardFeature::SnapshotTagValuePush.uri(),
                FeatureHandle::snapshot_tag_value_push(Arc::clone(&push)),
            )
            .feature(
                StandardFeature::EventMessagePush.uri(),
                FeatureHandle::event_message_push(Arc::clone(&events)),
            )
            .build()?;

        Ok(Self {
            adapter,
            options: live,
            hooks,
            tags: source,
            push,
            events,
            extension,
        })
    }
}

/// Complete host environment for integration tests.
pub struct TestHarness {
    accessor: AdapterAccessor,
    adapters: BTreeMap<String, HostedMock>,
    config: HostConfig,
    scheduler: Arc<TokioTaskScheduler>,
    store: Arc<dyn KeyValueStore>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn accessor(&self) -> &AdapterAccessor {
        &self.accessor
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// The adapter built for `id`.
    ///
    /// # Panics
    ///
    /// Panics if the configuration had no adapter with that id.
    pub fn adapter(&self, id: &str) -> &HostedMock {
        self.adapters
            .get(id)
            .unwrap_or_else(|| panic!("no adapter `{id}` in harness config"))
    }

    /// The unscoped store shared by all adapters.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// A caller context for `principal`.
    pub fn context(&self, principal: &str) -> CallerContext {
        CallerContext::new(Principal::named(principal), format!("{principal}-conn"))
            .unwrap_or_else(|err| panic!("invalid test context: {err}"))
    }

    /// Dispose every adapter and wait for background tasks to end.
    pub async fn shutdown(&self) {
        for hosted in self.adapters.values() {
            hosted.adapter.dispose().await;
        }
        self.scheduler.close_and_wait().await;
    }
}
