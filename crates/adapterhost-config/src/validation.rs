// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Every check runs and all failures are collected; validation never stops at
//! the first error.

use crate::diagnostic::ConfigError;
use crate::model::{
    AdapterOptions, HostConfig, MAX_NAME_LENGTH, MAX_PAGE_SIZE, SubscriptionManagerOptions,
};

/// Options types that can be validated before they are applied.
///
/// Adapters with richer options embed [`AdapterOptions`] and extend the
/// default validation with their own checks.
pub trait AdapterSettings: Clone + Send + Sync + 'static {
    /// The common adapter options embedded in this type.
    fn adapter_options(&self) -> &AdapterOptions;

    fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();
        check_adapter_options("", self.adapter_options(), &mut errors);
        into_result(errors)
    }
}

impl AdapterSettings for AdapterOptions {
    fn adapter_options(&self) -> &AdapterOptions {
        self
    }
}

/// Validate a whole host configuration.
pub fn validate_config(config: &HostConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.host.name.trim().is_empty() {
        errors.push(ConfigError::validation("host.name", "must not be empty"));
    }
    if config.host.default_page_size == 0 || config.host.default_page_size > MAX_PAGE_SIZE {
        errors.push(ConfigError::validation(
            "host.default_page_size",
            format!(
                "must be between 1 and {MAX_PAGE_SIZE}, got {}",
                config.host.default_page_size
            ),
        ));
    }

    check_subscription_options("subscriptions.", &config.subscriptions, &mut errors);

    for (id, adapter) in &config.adapters {
        if id.trim().is_empty() {
            errors.push(ConfigError::validation("adapters", "adapter id must not be empty"));
        }
        check_adapter_options(&format!("adapters.{id}."), adapter, &mut errors);
    }

    into_result(errors)
}

/// Validate a single adapter's options.
pub fn validate_adapter_options(options: &AdapterOptions) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    check_adapter_options("", options, &mut errors);
    into_result(errors)
}

/// Validate subscription manager options.
pub fn validate_subscription_options(
    options: &SubscriptionManagerOptions,
) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    check_subscription_options("", options, &mut errors);
    into_result(errors)
}

fn check_adapter_options(prefix: &str, options: &AdapterOptions, errors: &mut Vec<ConfigError>) {
    if options.name.trim().is_empty() {
        errors.push(ConfigError::validation(format!("{prefix}name"), "must not be empty"));
    }
    if options.name.chars().count() > MAX_NAME_LENGTH {
        errors.push(ConfigError::validation(
            format!("{prefix}name"),
            format!("must be at most {MAX_NAME_LENGTH} characters"),
        ));
    }
}

fn check_subscription_options(
    prefix: &str,
    options: &SubscriptionManagerOptions,
    errors: &mut Vec<ConfigError>,
) {
    if options.channel_capacity == 0 {
        errors.push(ConfigError::validation(
            format!("{prefix}channel_capacity"),
            "must be at least 1",
        ));
    }
    if options.dispatch_capacity == 0 {
        errors.push(ConfigError::validation(
            format!("{prefix}dispatch_capacity"),
            "must be at least 1",
        ));
    }
}

fn into_result(errors: Vec<ConfigError>) -> Result<(), Vec<ConfigError>> {
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
