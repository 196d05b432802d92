//! Integration tests for logging setup and settings loading

use bridge_traits::time::LogLevel;
use core_runtime::config::{ContextLifetime, ReasonsConfig, RepositoryMode};
use core_runtime::logging::{init_logging, redact_connection_string, LogFormat, LoggingConfig};
use std::io::Write;

#[test]
fn test_format_selection() {
    // Debug builds should default to Pretty
    #[cfg(debug_assertions)]
    {
        let config = LoggingConfig::default();
        assert_eq!(config.format, LogFormat::Pretty);
    }

    // Release builds should default to JSON
    #[cfg(not(debug_assertions))]
    {
        let config = LoggingConfig::default();
        assert_eq!(config.format, LogFormat::Json);
    }
}

#[test]
fn test_init_logging_only_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn);

    init_logging(config.clone()).unwrap();
    let second = init_logging(config);

    assert!(second.is_err());
    assert!(second
        .unwrap_err()
        .to_string()
        .contains("Failed to initialize logging"));
}

#[test]
fn test_redacted_connection_strings_keep_location() {
    let redacted = redact_connection_string("Data Source=/srv/reasons.db;Password=s3cret");

    assert!(redacted.contains("/srv/reasons.db"));
    assert!(!redacted.contains("s3cret"));
}

#[test]
fn test_settings_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("appsettings.json");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        r#"{{
            "ConnectionStrings": {{ "DefaultConnection": "sqlite:reasons.db" }},
            "Reasons": {{ "RepositoryMode": "direct-command", "ContextLifetime": "Singleton" }}
        }}"#
    )
    .unwrap();

    let config = ReasonsConfig::from_json_file(&path).unwrap();

    assert_eq!(config.repository_mode, RepositoryMode::DirectCommand);
    assert_eq!(config.context_lifetime, ContextLifetime::Singleton);
}

#[test]
fn test_missing_settings_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ReasonsConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();

    assert!(matches!(err, core_runtime::Error::Io(_)));
}
