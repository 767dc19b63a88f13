// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter runtime.
//!
//! - [`Adapter`]: lifecycle, options hot-swap, health aggregation, disposal.
//! - [`HealthCheckManager`]: the built-in `HealthCheck` feature.
//! - [`AdapterAccessor`]: adapter lookup and the resolve-and-authorize
//!   pipeline callers go through before using a feature.

pub mod accessor;
pub mod adapter;
pub mod health;

pub use accessor::{AdapterAccessor, FindAdaptersRequest, HostedAdapter, ResolvedAdapterFeature};
pub use adapter::{Adapter, AdapterBuilder, AdapterEvent, AdapterHooks, NoHooks};
pub use health::{HealthCheckManager, HealthSource};
