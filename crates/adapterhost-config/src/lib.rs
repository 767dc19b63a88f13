// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration and options for the adapter host.
//!
//! Provides TOML configuration parsing with strict validation
//! (`deny_unknown_fields`), a file hierarchy with environment variable
//! overrides, miette diagnostics with typo suggestions, and the options
//! sources adapters read their live settings from.
//!
//! # Usage
//!
//! ```no_run
//! use adapterhost_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("Host name: {}", config.host.name);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod options;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{AdapterOptions, HostConfig, HostSection, SubscriptionManagerOptions};
pub use options::{LiveOptions, OptionsSource, StaticOptions};
pub use validation::{AdapterSettings, validate_adapter_options, validate_config};

/// Load configuration from the file hierarchy and validate it.
///
/// Figment errors are converted into diagnostics with source spans for the
/// files that were read.
pub fn load_and_validate() -> Result<HostConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => validate_config(&config).map(|()| config),
        Err(err) => Err(diagnostic::figment_to_config_errors(
            err,
            &read_sources(&loader::config_file_paths()),
        )),
    }
}

/// Load one config file and validate it.
pub fn load_and_validate_path(path: &Path) -> Result<HostConfig, Vec<ConfigError>> {
    match loader::load_config_from_path(path) {
        Ok(config) => validate_config(&config).map(|()| config),
        Err(err) => Err(diagnostic::figment_to_config_errors(
            err,
            &read_sources(&[path.to_path_buf()]),
        )),
    }
}

/// Load a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<HostConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => validate_config(&config).map(|()| config),
        Err(err) => {
            let sources = vec![("<inline>".to_string(), toml_content.to_string())];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

fn read_sources(paths: &[std::path::PathBuf]) -> Vec<(String, String)> {
    paths
        .iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(path).ok()?;
            let name = std::fs::canonicalize(path)
                .unwrap_or_else(|_| path.clone())
                .display()
                .to_string();
            Some((name, content))
        })
        .collect()
}
