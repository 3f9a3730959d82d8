//! CLI integration tests.
//!
//! These tests verify the CLI argument parsing and configuration loading.

use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use shard_session::cli::{parse_args_from, Args};
use shard_session::config::Config;
use shard_session::session::{SameSite, StartFailurePolicy};

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("shard-session")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&[])).unwrap();

    assert_eq!(result.host.to_string(), "127.0.0.1");
    assert_eq!(result.port, 3000);
    assert!(result.config.is_none());
    assert!(result.session_path.is_none());
    assert!(result.log_level.is_none());
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-H",
        "0.0.0.0",
        "-p",
        "8080",
        "-s",
        "/var/lib/sessions",
        "-l",
        "debug",
    ]))
    .unwrap();

    assert_eq!(result.host.to_string(), "0.0.0.0");
    assert_eq!(result.port, 8080);
    assert_eq!(
        result.session_path.as_deref(),
        Some(Path::new("/var/lib/sessions"))
    );
    assert_eq!(result.log_level, Some("debug".to_string()));
}

#[test]
fn test_cli_invalid_port() {
    let result = parse_args_from(args(&["-p", "not-a-number"]));
    assert!(result.is_err());
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_config_from_json_file() {
    let json = r#"{
        "server": {
            "host": "192.168.1.100",
            "port": 9000,
            "graceful_shutdown": false
        },
        "session": {
            "path": "/srv/app/sessions",
            "lifetime": 86400,
            "domain": "example.org",
            "secure": true,
            "httponly": true,
            "samesite": "None",
            "gc_interval": 0,
            "on_start_failure": "abort",
            "not_a_session_option": 12
        },
        "logging": {
            "level": "debug"
        }
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.server.host, "192.168.1.100");
    assert_eq!(config.server.port, 9000);
    assert!(!config.server.graceful_shutdown);
    assert_eq!(config.session.path(), Path::new("/srv/app/sessions"));
    assert_eq!(config.session.lifetime_secs(), 86400);
    assert_eq!(config.session.domain(), "example.org");
    assert!(config.session.is_secure());
    assert_eq!(config.session.same_site(), SameSite::None);
    assert_eq!(config.session.gc_interval(), None);
    assert_eq!(
        config.session.start_failure_policy(),
        StartFailurePolicy::Abort
    );
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_config_priority_cli_over_file() {
    let json = r#"{
        "server": {
            "host": "10.0.0.1",
            "port": 5000
        },
        "session": {
            "path": "/from/file"
        }
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    // CLI args should override file
    let args = Args {
        host: "192.168.1.1".parse().unwrap(),
        port: 8080,
        config: Some(file.path().to_path_buf()),
        session_path: Some("/from/cli".into()),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();

    assert_eq!(config.server.host, "192.168.1.1");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.session.path(), Path::new("/from/cli"));
}

#[test]
fn test_config_missing_file() {
    let args = Args {
        config: Some("/nonexistent/shard-session.json".into()),
        ..Args::default()
    };
    assert!(Config::load(&args).is_err());
}

#[test]
fn test_config_malformed_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(br#"{"session": {"lifetime": "forever"}}"#)
        .unwrap();

    let args = Args {
        config: Some(file.path().to_path_buf()),
        ..Args::default()
    };
    let err = Config::load(&args).unwrap_err();
    assert!(err.to_string().contains("failed to parse config"));
}

// ============================================================================
// Configuration Serialization Tests
// ============================================================================

#[test]
fn test_config_roundtrip() {
    let original = Config::default();
    let json = serde_json::to_string(&original).unwrap();
    let loaded: Config = serde_json::from_str(&json).unwrap();

    assert_eq!(original.server.host, loaded.server.host);
    assert_eq!(original.server.port, loaded.server.port);
    assert_eq!(original.session, loaded.session);
}

#[test]
fn test_config_partial_deserialization() {
    let json = r#"{"session": {"secure": true}}"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert!(config.session.is_secure());
    assert_eq!(config.session.lifetime_secs(), 2_592_000); // Default
    assert_eq!(config.server.host, "127.0.0.1"); // Default
}
