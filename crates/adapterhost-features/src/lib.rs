// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Feature registry and standard feature catalog.
//!
//! Each adapter owns one [`FeatureRegistry`] mapping feature URIs to the
//! objects that implement them. The catalog describes registered features
//! for discovery.

pub mod catalog;
pub mod registry;

pub use catalog::{FeatureCategory, FeatureDescriptor, describe, standard_descriptor};
pub use registry::{FeatureEntry, FeatureRegistry};
