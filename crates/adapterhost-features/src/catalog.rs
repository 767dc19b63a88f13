// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Catalog of standard feature descriptors.
//!
//! Descriptors are static data; no feature objects are involved.

use adapterhost_core::{FeatureUri, StandardFeature};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Functional area a feature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum FeatureCategory {
    Diagnostics,
    RealTimeData,
    Events,
    Extension,
}

/// Public description of a feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDescriptor {
    pub uri: FeatureUri,
    pub display_name: String,
    pub description: String,
    pub category: FeatureCategory,
}

/// Descriptor for a standard feature.
pub fn standard_descriptor(feature: StandardFeature) -> FeatureDescriptor {
    let (category, description) = match feature {
        StandardFeature::HealthCheck => (
            FeatureCategory::Diagnostics,
            "Reports adapter health and pushes health changes",
        ),
        StandardFeature::TagInfo => (
            FeatureCategory::RealTimeData,
            "Looks up tag definitions by id or name",
        ),
        StandardFeature::TagSearch => (
            FeatureCategory::RealTimeData,
            "Searches the tags of a data source",
        ),
        StandardFeature::ReadSnapshotTagValues => (
            FeatureCategory::RealTimeData,
            "Polls the current values of tags",
        ),
        StandardFeature::SnapshotTagValuePush => (
            FeatureCategory::RealTimeData,
            "Pushes tag value changes to subscribers",
        ),
        StandardFeature::EventMessagePush => (
            FeatureCategory::Events,
            "Pushes event messages to subscribers",
        ),
    };
    FeatureDescriptor {
        uri: feature.uri(),
        display_name: feature.display_name().to_string(),
        description: description.to_string(),
        category,
    }
}

/// Descriptor for any URI. Extensions get a generic entry named by `display_name`.
pub fn describe(uri: &FeatureUri, display_name: Option<&str>) -> FeatureDescriptor {
    match StandardFeature::from_uri(uri) {
        Some(standard) => standard_descriptor(standard),
        None => FeatureDescriptor {
            uri: uri.clone(),
            display_name: display_name.map_or_else(|| uri.to_string(), str::to_string),
            description: "Extension feature".to_string(),
            category: FeatureCategory::Extension,
        },
    }
}
