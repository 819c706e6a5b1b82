//! Unit tests for configuration resolution and graceful degradation
//!
//! - Missing config files SHALL NOT cause termination (defaults are used)
//! - Priority order: CLI argument > ENV > platform config dir > defaults
//! - Secrets and bind address can be overridden from the environment
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate ENCORE_* variables are marked with #[serial].

use encore_common::config::{
    resolve_config_path, ServiceConfig, ENV_BIND_ADDR, ENV_CMS_TOKEN, ENV_CONFIG_PATH,
    ENV_WEBHOOK_SECRET,
};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn clear_env() {
    env::remove_var(ENV_CONFIG_PATH);
    env::remove_var(ENV_WEBHOOK_SECRET);
    env::remove_var(ENV_CMS_TOKEN);
    env::remove_var(ENV_BIND_ADDR);
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    clear_env();
    env::set_var(ENV_CONFIG_PATH, "/from/env.toml");

    let resolved = resolve_config_path(Some(PathBuf::from("/from/cli.toml").as_path()), ENV_CONFIG_PATH);
    assert_eq!(resolved, Some(PathBuf::from("/from/cli.toml")));

    clear_env();
}

#[test]
#[serial]
fn test_env_used_when_no_cli_argument() {
    clear_env();
    env::set_var(ENV_CONFIG_PATH, "/from/env.toml");

    let resolved = resolve_config_path(None, ENV_CONFIG_PATH);
    assert_eq!(resolved, Some(PathBuf::from("/from/env.toml")));

    clear_env();
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    clear_env();

    let config = ServiceConfig::load(Some(PathBuf::from("/nonexistent/encore-wh.toml").as_path()))
        .expect("missing config must not be fatal");

    assert_eq!(config, ServiceConfig::default());
}

#[test]
#[serial]
fn test_file_values_loaded() {
    clear_env();
    let file = write_config(
        r#"
        [server]
        bind_addr = "0.0.0.0:9000"

        [webhook]
        secret = "from-file"
        document_type = "album"

        [ledger]
        retry_window_secs = 600
        max_retries = 2
        expiry_secs = 10

        [extraction]
        track_timeout_secs = 45
        "#,
    );

    let config = ServiceConfig::load(Some(file.path())).expect("load config");

    assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
    assert_eq!(config.webhook.secret, "from-file");
    assert_eq!(config.webhook.document_type, "album");
    assert_eq!(config.ledger.retry_window_secs, 600);
    assert_eq!(config.ledger.max_retries, 2);
    assert_eq!(config.ledger.expiry_secs, 10);
    assert_eq!(config.extraction.track_timeout_secs, 45);
    // Untouched section keeps defaults
    assert_eq!(config.cms.dataset, "production");
}

#[test]
#[serial]
fn test_env_overrides_secrets_and_bind_addr() {
    clear_env();
    let file = write_config(
        r#"
        [webhook]
        secret = "from-file"

        [cms]
        token = "file-token"
        "#,
    );

    env::set_var(ENV_WEBHOOK_SECRET, "from-env");
    env::set_var(ENV_CMS_TOKEN, "env-token");
    env::set_var(ENV_BIND_ADDR, "127.0.0.1:6000");

    let config = ServiceConfig::load(Some(file.path())).expect("load config");

    assert_eq!(config.webhook.secret, "from-env");
    assert_eq!(config.cms.token, "env-token");
    assert_eq!(config.server.bind_addr, "127.0.0.1:6000");

    clear_env();
}

#[test]
#[serial]
fn test_blank_env_values_ignored() {
    clear_env();
    env::set_var(ENV_WEBHOOK_SECRET, "   ");

    let config = ServiceConfig::load(Some(PathBuf::from("/nonexistent/encore-wh.toml").as_path()))
        .expect("load config");
    assert_eq!(config.webhook.secret, "");

    clear_env();
}

#[test]
#[serial]
fn test_invalid_values_rejected_at_load() {
    clear_env();
    let file = write_config(
        r#"
        [ledger]
        max_retries = 0
        "#,
    );

    assert!(ServiceConfig::load(Some(file.path())).is_err());
}

#[test]
#[serial]
fn test_oversized_retry_window_rejected_at_load() {
    clear_env();
    let file = write_config(
        r#"
        [ledger]
        retry_window_secs = 9223372036854775807
        "#,
    );

    let err = ServiceConfig::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("must not exceed"));
}
