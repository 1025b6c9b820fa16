//! Test utilities for idmctl
//!
//! This module provides common test helpers: temporary config files,
//! ready-made targets, and error assertions.

use crate::config::Config;
use crate::target::Target;
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a temporary directory for testing
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Path for a config file inside `dir` that does not exist yet
pub fn config_path(dir: &TempDir) -> PathBuf {
    dir.path().join("config.yaml")
}

/// Create a configuration whose current target `name` points at `host`
///
/// # Arguments
///
/// * `name` - Target name, also selected as current
/// * `host` - Target URL
/// * `token` - Optional stored Bearer token
pub fn config_with_target(name: &str, host: &str, token: Option<&str>) -> Config {
    let mut target = Target::new(host, false);
    if let Some(token) = token {
        target.token_type = Some("Bearer".to_string());
        target.access_token = Some(token.to_string());
    }

    let mut config = Config::default();
    config.targets.insert(name.to_string(), target);
    config.current_target = Some(name.to_string());
    config
}

/// Assert that an error renders with the expected message substring
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T>(result: anyhow::Result<T>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = format!("{:#}", e);
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IdmError;

    #[test]
    fn test_config_with_target() {
        let config = config_with_target("dev", "acme.example.com", Some("abc"));
        let (name, target) = config.current().unwrap();
        assert_eq!(name, "dev");
        assert_eq!(target.authorization(), Some("Bearer abc".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_assert_error_contains_success() {
        let result: anyhow::Result<()> =
            Err(IdmError::Config("test error message".to_string()).into());
        assert_error_contains(result, "test error");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        assert_error_contains(Ok(()), "error");
    }

    #[test]
    fn test_config_path_is_inside_dir() {
        let dir = temp_dir();
        let path = config_path(&dir);
        assert!(path.starts_with(dir.path()));
        assert!(!path.exists());
    }
}
