// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for adapter host integration tests.
//!
//! Provides mock features, recording hooks, and a harness that assembles a
//! configured host without any external data source.
//!
//! # Components
//!
//! - [`MockTagSource`] - Tag info, search and snapshot read over a fixed tag list
//! - [`MockExtension`] - Extension feature that echoes its payload
//! - [`MockHooks`] - Adapter hooks that record lifecycle calls
//! - [`TestHarness`] - Config-driven host with an accessor and mock adapters

pub mod harness;
pub mod mock_adapter;
pub mod mock_features;

pub use harness::{ECHO_EXTENSION, HostedMock, TestHarness, TestHarnessBuilder};
pub use mock_adapter::MockHooks;
pub use mock_features::{MockExtension, MockTagSource, snapshot_push};
