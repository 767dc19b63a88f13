// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for host configuration loading.

use std::io::Write;

use adapterhost_config::diagnostic::ConfigError;
use adapterhost_config::{
    HostConfig, load_and_validate_path, load_and_validate_str, load_config_from_str,
};

/// A file with every section deserializes.
#[test]
fn valid_toml_deserializes_into_host_config() {
    let toml = r#"
[host]
name = "edge-01"
default_page_size = 25

[subscriptions]
max_subscriptions = 2
channel_capacity = 16
dispatch_capacity = 64

[adapters.historian]
name = "Plant Historian"
description = "Line 3 historian"

[adapters.opc]
name = "OPC bridge"
enabled = false
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.host.name, "edge-01");
    assert_eq!(config.host.default_page_size, 25);
    assert_eq!(config.subscriptions.max_subscriptions, 2);
    assert_eq!(config.subscriptions.channel_capacity, 16);
    assert_eq!(config.adapters.len(), 2);
    assert_eq!(config.adapters["historian"].name, "Plant Historian");
    assert!(config.adapters["historian"].enabled);
    assert!(!config.adapters["opc"].enabled);
}

/// An empty document yields the compiled defaults.
#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert_eq!(config, HostConfig::default());
}

/// A typo in an adapter table becomes an unknown-key diagnostic with a suggestion.
#[test]
fn unknown_adapter_key_suggests_correction() {
    let toml = r#"
[adapters.historian]
name = "h"
enabeld = true
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown key");
    let unknown = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey {
                key, suggestion, ..
            } => Some((key.clone(), suggestion.clone())),
            _ => None,
        })
        .expect("an UnknownKey error");
    assert_eq!(unknown.0, "enabeld");
    assert_eq!(unknown.1.as_deref(), Some("enabled"));
}

/// A wrong value type is reported with the key path.
#[test]
fn invalid_type_is_reported() {
    let toml = r#"
[subscriptions]
max_subscriptions = "lots"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject string");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("max_subscriptions"))),
        "got: {errors:?}"
    );
}

/// Semantic validation runs after deserialization.
#[test]
fn validation_errors_after_successful_parse() {
    let toml = r#"
[adapters.historian]
name = ""
"#;

    let errors = load_and_validate_str(toml).expect_err("empty name is invalid");
    assert!(matches!(&errors[0], ConfigError::Validation { field, .. } if field == "adapters.historian.name"));
}

/// Loading from a file on disk.
#[test]
fn loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        "[host]\nname = \"from-file\"\n\n[adapters.a1]\nname = \"Adapter 1\""
    )
    .expect("write config");

    let config = load_and_validate_path(file.path()).expect("file config is valid");
    assert_eq!(config.host.name, "from-file");
    assert_eq!(config.adapters["a1"].name, "Adapter 1");
}

/// Missing files are skipped and defaults apply.
#[test]
fn missing_file_falls_back_to_defaults() {
    let config = load_and_validate_path(std::path::Path::new("/nonexistent/adapterhost.toml"))
        .expect("missing file should be skipped");
    assert_eq!(config.host.name, "adapterhost");
}
