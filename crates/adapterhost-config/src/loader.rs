// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order (later overrides earlier):
//! 1. Compiled defaults
//! 2. `/etc/adapterhost/adapterhost.toml`
//! 3. `~/.config/adapterhost/adapterhost.toml`
//! 4. `./adapterhost.toml`
//! 5. `ADAPTERHOST_*` environment variables

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::HostConfig;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "ADAPTERHOST_";

/// Config file locations, lowest precedence first.
pub fn config_file_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/adapterhost/adapterhost.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("adapterhost/adapterhost.toml"));
    }
    paths.push(PathBuf::from("adapterhost.toml"));
    paths
}

/// The figment for the standard file hierarchy, before extraction.
pub fn build_figment() -> Figment {
    config_file_paths()
        .into_iter()
        .fold(defaults(), |figment, path| figment.merge(Toml::file(path)))
        .merge(env_provider())
}

/// Load from the standard file hierarchy with env overrides.
pub fn load_config() -> Result<HostConfig, figment::Error> {
    build_figment().extract()
}

/// Load from one file with env overrides.
pub fn load_config_from_path(path: &Path) -> Result<HostConfig, figment::Error> {
    defaults()
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Load from a TOML string only. No files or environment are consulted.
pub fn load_config_from_str(toml_content: &str) -> Result<HostConfig, figment::Error> {
    defaults().merge(Toml::string(toml_content)).extract()
}

fn defaults() -> Figment {
    Figment::new().merge(Serialized::defaults(HostConfig::default()))
}

/// Env provider with explicit section mapping.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `ADAPTERHOST_SUBSCRIPTIONS_MAX_SUBSCRIPTIONS` maps to
/// `subscriptions.max_subscriptions`.
fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).map(|key| {
        // Figment hands over the key in the case it was set with.
        let key = key.as_str().to_ascii_lowercase();
        for section in ["host", "subscriptions"] {
            if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
                return format!("{section}.{rest}").into();
            }
        }
        key.into()
    })
}
