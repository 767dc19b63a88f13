// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests: configured adapters behind the accessor, resolved and
//! authorized per caller, driving the push and health features.

use std::sync::Arc;
use std::time::Duration;

use adapterhost_config::AdapterOptions;
use adapterhost_core::{
    AdapterDescriptor, AuthorizationPolicy, CallerContext,
    CreateSnapshotTagValueSubscriptionRequest, ExtensionFeature, FeatureKind, FeatureUri,
    FindTagsRequest, FnAuthorizationPolicy, HealthCheck, HealthCheckResult, HealthStatus,
    HostError, KeyValueStore, KeyValueStoreExt, SnapshotTagValuePush, StandardFeature, TagSearch,
    TopicAction, TopicSubscriptionUpdate,
};
use adapterhost_features::FeatureCategory;
use adapterhost_runtime::{AdapterEvent, FindAdaptersRequest};
use adapterhost_test_utils::{ECHO_EXTENSION, TestHarness};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

const TWO_ADAPTERS: &str = r#"
[subscriptions]
max_subscriptions = 4

[adapters.a1]
name = "Historian"
description = "Plant historian"

[adapters.a2]
name = "Alarms"
enabled = false
"#;

fn deny_guest_search() -> Arc<dyn AuthorizationPolicy> {
    Arc::new(FnAuthorizationPolicy::new(
        |_: &AdapterDescriptor, kind: &FeatureKind, context: &CallerContext| {
            !(context.principal().name == "guest"
                && *kind == FeatureKind::Standard(StandardFeature::TagSearch))
        },
    ))
}

#[tokio::test]
async fn resolution_and_authorization_are_tri_state() {
    let harness = TestHarness::builder()
        .with_policy(deny_guest_search())
        .build()
        .await
        .unwrap();
    let accessor = harness.accessor();
    let operator = harness.context("operator");
    let guest = harness.context("guest");

    let missing = accessor.resolve::<dyn TagSearch>(&operator, "nope").await;
    assert!(!missing.adapter_resolved());
    assert!(matches!(
        missing.into_result(),
        Err(HostError::AdapterNotFound { .. })
    ));

    let uri = FeatureUri::parse("asc:extensions/not-there").unwrap();
    let unknown = accessor.resolve_feature(&operator, "a1", &uri).await;
    assert!(unknown.adapter_resolved());
    assert!(!unknown.feature_resolved());
    assert!(matches!(
        unknown.into_result(),
        Err(HostError::FeatureNotFound { .. })
    ));

    let denied = accessor.resolve::<dyn TagSearch>(&guest, "a1").await;
    assert!(denied.feature_resolved());
    assert!(!denied.is_authorized);
    assert!(matches!(
        denied.into_result(),
        Err(HostError::Forbidden { .. })
    ));

    let (_, search) = accessor
        .resolve::<dyn TagSearch>(&operator, "a1")
        .await
        .into_result()
        .unwrap();
    let request = FindTagsRequest {
        name: Some("temp".into()),
        ..FindTagsRequest::default()
    };
    let tags = search.find_tags(&operator, &request).await.unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].id, "temperature");
}

#[tokio::test]
async fn extension_features_resolve_by_uri() {
    let harness = TestHarness::builder().build().await.unwrap();
    let ctx = harness.context("operator");
    let uri = FeatureUri::parse(ECHO_EXTENSION).unwrap();

    let (_, handle) = harness
        .accessor()
        .resolve_feature(&ctx, "a1", &uri)
        .await
        .into_result()
        .unwrap();
    let extension = handle.as_extension().unwrap();
    let reply = extension
        .invoke(&ctx, "echo", serde_json::json!({"ping": 1}))
        .await
        .unwrap();
    assert_eq!(reply, serde_json::json!({"ping": 1}));
    assert_eq!(harness.adapter("a1").extension.invocations(), 1);

    let descriptor = harness.adapter("a1").adapter.extended_descriptor();
    assert_eq!(descriptor.extensions, vec![ECHO_EXTENSION.to_string()]);
    assert!(
        descriptor
            .features
            .contains(&StandardFeature::TagInfo.uri().to_string())
    );

    let catalog = harness.adapter("a1").adapter.feature_descriptors();
    let echo = catalog.iter().find(|d| d.uri == uri).unwrap();
    assert_eq!(echo.display_name, "Echo");
    assert_eq!(echo.category, FeatureCategory::Extension);
    let push = catalog
        .iter()
        .find(|d| d.uri == StandardFeature::EventMessagePush.uri())
        .unwrap();
    assert_eq!(push.category, FeatureCategory::Events);
}

#[tokio::test]
async fn disabled_adapters_are_hidden() {
    let harness = TestHarness::builder()
        .with_config(TWO_ADAPTERS)
        .build()
        .await
        .unwrap();
    let ctx = harness.context("operator");
    let accessor = harness.accessor();

    assert!(accessor.get_adapter(&ctx, "a2").await.is_none());
    assert!(!harness.adapter("a2").adapter.is_running());
    let resolved = accessor.resolve::<dyn TagSearch>(&ctx, "a2").await;
    assert!(matches!(
        resolved.into_result(),
        Err(HostError::AdapterNotFound { .. })
    ));

    let found = accessor
        .find_adapters(&ctx, &FindAdaptersRequest::default())
        .await;
    let ids: Vec<&str> = found.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, ["a1"]);
}

#[tokio::test]
async fn health_aggregates_distinct_features_and_hooks() {
    let harness = TestHarness::builder().build().await.unwrap();
    let hosted = harness.adapter("a1");
    hosted
        .tags
        .set_health(Some(HealthCheckResult::degraded("slow link")));
    hosted
        .hooks
        .set_health(vec![HealthCheckResult::healthy("connection")]);

    let ctx = harness.context("operator");
    let (_, health) = harness
        .accessor()
        .resolve::<dyn HealthCheck>(&ctx, "a1")
        .await
        .into_result()
        .unwrap();
    let result = health.check_health(&ctx).await.unwrap();

    assert_eq!(result.status, HealthStatus::Degraded);
    // The tag source is registered three times but reports once.
    assert_eq!(result.inner_results.len(), 2);
    assert_eq!(
        result.inner_results[0].description.as_deref(),
        Some("Tag Info")
    );
    assert_eq!(
        result.inner_results[0].inner_results[0].description.as_deref(),
        Some("slow link")
    );
    assert_eq!(
        result.inner_results[1].description.as_deref(),
        Some("connection")
    );
}

#[tokio::test]
async fn stopped_adapter_reports_unhealthy() {
    let harness = TestHarness::builder()
        .start_adapters(false)
        .build()
        .await
        .unwrap();
    let ctx = harness.context("operator");
    let hosted = harness.adapter("a1");

    let result = hosted.adapter.health().check_health(&ctx).await.unwrap();
    assert_eq!(result.status, HealthStatus::Unhealthy);
    assert_eq!(
        result.inner_results[0].description.as_deref(),
        Some("Adapter not started")
    );

    hosted.adapter.start().await.unwrap();
    let result = hosted.adapter.health().check_health(&ctx).await.unwrap();
    assert_eq!(result.status, HealthStatus::Healthy);
}

#[tokio::test]
async fn health_subscribers_see_changes() {
    let harness = TestHarness::builder().build().await.unwrap();
    let hosted = harness.adapter("a1");
    let ctx = harness.context("operator");

    let mut updates = hosted
        .adapter
        .health()
        .subscribe_health(&ctx, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(updates.next().await.unwrap().status, HealthStatus::Healthy);

    hosted
        .tags
        .set_health(Some(HealthCheckResult::unhealthy("offline")));
    hosted.adapter.health().recalculate().await.unwrap();
    assert_eq!(updates.next().await.unwrap().status, HealthStatus::Unhealthy);
}

#[tokio::test]
async fn options_toggle_enabled_state() {
    let harness = TestHarness::builder().build().await.unwrap();
    let hosted = harness.adapter("a1");
    let ctx = harness.context("operator");
    let mut events = hosted.adapter.subscribe_events();

    hosted
        .options
        .update(AdapterOptions::named("Historian").with_enabled(false));
    assert_eq!(events.recv().await.unwrap(), AdapterEvent::OptionsChanged);
    assert_eq!(events.recv().await.unwrap(), AdapterEvent::Stopped);
    assert!(!hosted.adapter.is_running());
    assert!(harness.accessor().get_adapter(&ctx, "a1").await.is_none());
    assert!(hosted.hooks.run_token().unwrap().is_cancelled());

    hosted
        .options
        .update(AdapterOptions::named("Plant Historian"));
    assert_eq!(events.recv().await.unwrap(), AdapterEvent::OptionsChanged);
    assert_eq!(events.recv().await.unwrap(), AdapterEvent::Started);
    assert_eq!(hosted.hooks.starts(), 2);
    assert_eq!(
        hosted.hooks.renames(),
        vec![("Historian".to_string(), "Plant Historian".to_string())]
    );

    let adapter = harness.accessor().get_adapter(&ctx, "a1").await.unwrap();
    assert_eq!(adapter.descriptor().name, "Plant Historian");
}

#[tokio::test]
async fn snapshot_push_follows_topic_updates() {
    let harness = TestHarness::builder().build().await.unwrap();
    let hosted = harness.adapter("a1");
    let ctx = harness.context("operator");

    // Cached before anyone subscribes.
    let initial = hosted.tags.set_value("Temperature", serde_json::json!(20.5)).unwrap();
    hosted.push.publish(initial).await.unwrap();

    let (_, push) = harness
        .accessor()
        .resolve::<dyn SnapshotTagValuePush>(&ctx, "a1")
        .await
        .into_result()
        .unwrap();
    let (tx, rx) = futures::channel::mpsc::unbounded();
    let request = CreateSnapshotTagValueSubscriptionRequest {
        tags: vec!["Temperature".into()],
        ..Default::default()
    };
    let mut values = push
        .subscribe(&ctx, request, rx.boxed(), CancellationToken::new())
        .await
        .unwrap();

    let first = values.next().await.unwrap();
    assert_eq!(first.tag_id, "temperature");
    assert_eq!(first.value.value, serde_json::json!(20.5));

    tx.unbounded_send(TopicSubscriptionUpdate {
        action: TopicAction::Subscribe,
        topics: vec!["pressure".into()],
    })
    .unwrap();
    let manager = hosted.push.manager();
    let id = manager.subscription_ids()[0];
    let state = manager.subscription_state(id).unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while state.topic_count() < 2 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    for (tag, value) in [("Unknown", 0.0), ("Pressure", 1.2)] {
        if let Some(result) = hosted.tags.set_value(tag, serde_json::json!(value)) {
            hosted.push.publish(result).await.unwrap();
        }
    }
    let next = values.next().await.unwrap();
    assert_eq!(next.tag_name, "Pressure");

    harness.shutdown().await;
    assert_eq!(values.next().await, None);
}

#[tokio::test]
async fn shutdown_disposes_shared_features_once() {
    let harness = TestHarness::builder()
        .with_config(TWO_ADAPTERS)
        .build()
        .await
        .unwrap();
    let hosted = harness.adapter("a1");
    let store = hosted.adapter.key_value_store().unwrap();
    store.write_json("cursor", &42u64).await.unwrap();
    assert!(harness.store().read("a1:cursor").await.unwrap().is_some());
    assert!(harness.store().read("a2:cursor").await.unwrap().is_none());

    harness.shutdown().await;
    harness.shutdown().await;

    assert!(hosted.adapter.is_disposed());
    assert_eq!(hosted.tags.disposals(), 1);
    assert_eq!(harness.adapter("a2").tags.disposals(), 1);
    assert!(matches!(
        hosted.adapter.start().await,
        Err(HostError::Disposed { .. })
    ));
}

#[tokio::test]
async fn invalid_config_fails_to_build() {
    let result = TestHarness::builder()
        .with_config("[adapters.a1]\nname = \"\"\n")
        .build()
        .await;
    assert!(matches!(result, Err(HostError::Options(_))));
}
