//! API Configuration Module
//!
//! Configuration for the HTTP-facing rate-limit middleware. Loaded from
//! environment variables with sensible defaults for development; the quota
//! presets themselves come from the core configuration.

use quotient_core::{QuotientConfig, RatePresets, RateQuota};

/// Configuration for the rate-limit middleware.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Whether rate limiting is enabled.
    pub rate_limit_enabled: bool,

    /// Path prefixes that get the tighter auth quota (login, token refresh).
    pub auth_path_prefixes: Vec<String>,

    /// Quota presets per endpoint class.
    pub presets: RatePresets,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            rate_limit_enabled: true,
            auth_path_prefixes: vec!["/auth".to_string()],
            presets: RatePresets::default(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `QUOTIENT_RATE_LIMIT_ENABLED`: "true" or "false" (default: true)
    /// - `QUOTIENT_AUTH_PATHS`: Comma-separated path prefixes using the auth
    ///   quota (default: "/auth")
    ///
    /// Quota presets are read via [`QuotientConfig::from_env`].
    pub fn from_env() -> Self {
        let rate_limit_enabled = std::env::var("QUOTIENT_RATE_LIMIT_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        let auth_path_prefixes = std::env::var("QUOTIENT_AUTH_PATHS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["/auth".to_string()]);

        Self {
            rate_limit_enabled,
            auth_path_prefixes,
            presets: QuotientConfig::from_env().rate,
        }
    }

    /// Pick the quota for a request path.
    pub fn quota_for_path(&self, path: &str) -> RateQuota {
        if self
            .auth_path_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            self.presets.auth
        } else {
            self.presets.standard
        }
    }
}
