//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::net::SocketAddr;

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an http(s) URL without a path
    /// - `listen_addr` is not a socket address
    /// - `cache_prefix` or `cache_version` is empty or contains whitespace
    /// - a shell page or bypass prefix doesn't start with `/`
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is set below 100ms or above 5 minutes
    /// - `user_agent` is empty
    ///
    /// Returns `ConfigError::Missing` if `shell_pages` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(invalid("origin", "scheme must be http or https"));
        }
        if origin.host_str().is_none() {
            return Err(invalid("origin", "must include a host"));
        }
        if origin.path() != "/" || origin.query().is_some() {
            return Err(invalid("origin", "must not include a path or query"));
        }

        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(invalid("listen_addr", "must be a socket address like 127.0.0.1:8080"));
        }

        for (field, value) in [("cache_prefix", &self.cache_prefix), ("cache_version", &self.cache_version)] {
            if value.is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
            if value.chars().any(char::is_whitespace) {
                return Err(invalid(field, "must not contain whitespace"));
            }
        }

        if self.shell_pages.is_empty() {
            return Err(ConfigError::Missing {
                field: "shell_pages".into(),
                hint: "list at least the root page \"/\"".into(),
            });
        }
        if self.shell_pages.iter().any(|p| !p.starts_with('/')) {
            return Err(invalid("shell_pages", "every page must start with '/'"));
        }
        if self.bypass_prefixes.iter().any(|p| !p.starts_with('/')) {
            return Err(invalid("bypass_prefixes", "every prefix must start with '/'"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if let Some(timeout_ms) = self.timeout_ms {
            if timeout_ms < 100 {
                return Err(invalid("timeout_ms", "must be at least 100ms"));
            }
            if timeout_ms > 300_000 {
                return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
            }
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if !self.shell_pages.iter().any(|p| p == "/") {
            tracing::warn!(
                shell_pages = ?self.shell_pages,
                "Root page \"/\" is not in shell_pages; \
                 offline navigations without an exact cache hit will fail"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(result: Result<(), ConfigError>) -> String {
        match result {
            Err(ConfigError::Invalid { field, .. }) | Err(ConfigError::Missing { field, .. }) => field,
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_default_config() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_origin_scheme() {
        let config = AppConfig { origin: "ftp://creatrid.com".into(), ..Default::default() };
        assert_eq!(field_of(config.validate()), "origin");
    }

    #[test]
    fn test_validate_origin_with_path() {
        let config = AppConfig { origin: "https://creatrid.com/app".into(), ..Default::default() };
        assert_eq!(field_of(config.validate()), "origin");
    }

    #[test]
    fn test_validate_listen_addr() {
        let config = AppConfig { listen_addr: "localhost".into(), ..Default::default() };
        assert_eq!(field_of(config.validate()), "listen_addr");
    }

    #[test]
    fn test_validate_cache_version_whitespace() {
        let config = AppConfig { cache_version: "v 2".into(), ..Default::default() };
        assert_eq!(field_of(config.validate()), "cache_version");
    }

    #[test]
    fn test_validate_empty_prefix() {
        let config = AppConfig { cache_prefix: String::new(), ..Default::default() };
        assert_eq!(field_of(config.validate()), "cache_prefix");
    }

    #[test]
    fn test_validate_shell_pages() {
        let empty = AppConfig { shell_pages: Vec::new(), ..Default::default() };
        assert!(matches!(empty.validate(), Err(ConfigError::Missing { .. })));

        let relative = AppConfig { shell_pages: vec!["pricing".into()], ..Default::default() };
        assert_eq!(field_of(relative.validate()), "shell_pages");
    }

    #[test]
    fn test_validate_shell_pages_without_root_is_allowed() {
        let config = AppConfig { shell_pages: vec!["/pricing".into()], ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bypass_prefixes() {
        let config = AppConfig { bypass_prefixes: vec!["api/".into()], ..Default::default() };
        assert_eq!(field_of(config.validate()), "bypass_prefixes");
    }

    #[test]
    fn test_validate_max_bytes() {
        let zero = AppConfig { max_bytes: 0, ..Default::default() };
        assert_eq!(field_of(zero.validate()), "max_bytes");

        let huge = AppConfig { max_bytes: 51 * 1024 * 1024, ..Default::default() };
        assert_eq!(field_of(huge.validate()), "max_bytes");
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let small = AppConfig { timeout_ms: Some(50), ..Default::default() };
        assert_eq!(field_of(small.validate()), "timeout_ms");

        let large = AppConfig { timeout_ms: Some(301_000), ..Default::default() };
        assert_eq!(field_of(large.validate()), "timeout_ms");

        let edge = AppConfig { timeout_ms: Some(100), max_bytes: 1, ..Default::default() };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        assert_eq!(field_of(config.validate()), "user_agent");
    }
}
