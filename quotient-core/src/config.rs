//! Quotient Configuration Module
//!
//! Configuration for the store facade, cache TTL presets, and rate-limit
//! presets. Configuration is loaded from environment variables with sensible
//! defaults for development.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// TTL PRESETS
// ============================================================================

/// Fresh/stale TTL pair for one resource class.
///
/// `fresh_secs` bounds the age below which an entry is served without any
/// upstream contact; `stale_secs` bounds the age below which an entry may
/// still be served while a refresh runs in the background. The constructor
/// clamps so that `fresh_secs <= stale_secs` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlPreset {
    /// Age below which an entry is fresh.
    pub fresh_secs: u64,
    /// Age below which an entry is stale-but-usable. Also the backend TTL.
    pub stale_secs: u64,
}

impl TtlPreset {
    /// Create a preset, clamping `stale_secs` up to at least `fresh_secs`.
    pub fn new(fresh_secs: u64, stale_secs: u64) -> Self {
        Self {
            fresh_secs,
            stale_secs: stale_secs.max(fresh_secs),
        }
    }

    /// Fresh TTL as a `Duration`.
    pub fn fresh(&self) -> Duration {
        Duration::from_secs(self.fresh_secs)
    }

    /// Stale TTL as a `Duration`.
    pub fn stale(&self) -> Duration {
        Duration::from_secs(self.stale_secs)
    }
}

/// TTL presets per resource class.
///
/// Report data is expensive to recompute upstream and tolerates long
/// staleness; entity data (campaigns, ad groups) is edited interactively and
/// needs tighter bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlPresets {
    /// Fallback preset for resource types without their own entry.
    pub default: TtlPreset,
    /// Aggregated report payloads.
    pub report: TtlPreset,
    /// Individual upstream entities.
    pub entity: TtlPreset,
}

impl Default for TtlPresets {
    fn default() -> Self {
        Self {
            default: TtlPreset::new(60, 600),
            report: TtlPreset::new(300, 3600),
            entity: TtlPreset::new(30, 300),
        }
    }
}

// ============================================================================
// RATE-LIMIT PRESETS
// ============================================================================

/// Limit/window pair for one endpoint class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateQuota {
    /// Maximum requests per window.
    pub limit: u32,
    /// Window length in seconds.
    pub window_secs: u64,
}

impl RateQuota {
    /// Create a quota.
    pub fn new(limit: u32, window_secs: u64) -> Self {
        Self { limit, window_secs }
    }

    /// Window length as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Rate-limit presets per endpoint class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePresets {
    /// Standard API endpoints.
    pub standard: RateQuota,
    /// Authentication endpoints (login, token refresh) - much tighter.
    pub auth: RateQuota,
}

impl Default for RatePresets {
    fn default() -> Self {
        Self {
            standard: RateQuota::new(100, 60),
            auth: RateQuota::new(5, 300),
        }
    }
}

// ============================================================================
// QUOTIENT CONFIGURATION
// ============================================================================

/// Top-level configuration for the caching and rate-limiting layer.
#[derive(Debug, Clone)]
pub struct QuotientConfig {
    /// Distributed backend connection string.
    /// `None` means run in local-only mode permanently - this is a supported
    /// deployment shape, not a failure.
    pub redis_url: Option<String>,

    /// Minimum interval between reconnect probes after the distributed
    /// backend has been marked unhealthy.
    pub reconnect_interval: Duration,

    /// TTL presets per resource class.
    pub ttl: TtlPresets,

    /// Rate-limit presets per endpoint class.
    pub rate: RatePresets,
}

impl Default for QuotientConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            reconnect_interval: Duration::from_secs(5),
            ttl: TtlPresets::default(),
            rate: RatePresets::default(),
        }
    }
}

impl QuotientConfig {
    /// Create QuotientConfig from environment variables.
    ///
    /// Environment variables:
    /// - `QUOTIENT_REDIS_URL`: Distributed backend URL (absent = local-only mode)
    /// - `QUOTIENT_RECONNECT_INTERVAL_SECS`: Reconnect probe interval (default: 5)
    /// - `QUOTIENT_FRESH_TTL_SECS` / `QUOTIENT_STALE_TTL_SECS`: Default preset (60/600)
    /// - `QUOTIENT_REPORT_FRESH_TTL_SECS` / `QUOTIENT_REPORT_STALE_TTL_SECS`: Report preset (300/3600)
    /// - `QUOTIENT_ENTITY_FRESH_TTL_SECS` / `QUOTIENT_ENTITY_STALE_TTL_SECS`: Entity preset (30/300)
    /// - `QUOTIENT_RATE_LIMIT` / `QUOTIENT_RATE_WINDOW_SECS`: Standard quota (100/60)
    /// - `QUOTIENT_AUTH_RATE_LIMIT` / `QUOTIENT_AUTH_RATE_WINDOW_SECS`: Auth quota (5/300)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let redis_url = std::env::var("QUOTIENT_REDIS_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let reconnect_interval = env_parse("QUOTIENT_RECONNECT_INTERVAL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.reconnect_interval);

        let ttl = TtlPresets {
            default: TtlPreset::new(
                env_parse("QUOTIENT_FRESH_TTL_SECS").unwrap_or(defaults.ttl.default.fresh_secs),
                env_parse("QUOTIENT_STALE_TTL_SECS").unwrap_or(defaults.ttl.default.stale_secs),
            ),
            report: TtlPreset::new(
                env_parse("QUOTIENT_REPORT_FRESH_TTL_SECS")
                    .unwrap_or(defaults.ttl.report.fresh_secs),
                env_parse("QUOTIENT_REPORT_STALE_TTL_SECS")
                    .unwrap_or(defaults.ttl.report.stale_secs),
            ),
            entity: TtlPreset::new(
                env_parse("QUOTIENT_ENTITY_FRESH_TTL_SECS")
                    .unwrap_or(defaults.ttl.entity.fresh_secs),
                env_parse("QUOTIENT_ENTITY_STALE_TTL_SECS")
                    .unwrap_or(defaults.ttl.entity.stale_secs),
            ),
        };

        let rate = RatePresets {
            standard: RateQuota::new(
                env_parse("QUOTIENT_RATE_LIMIT").unwrap_or(defaults.rate.standard.limit),
                env_parse("QUOTIENT_RATE_WINDOW_SECS")
                    .unwrap_or(defaults.rate.standard.window_secs),
            ),
            auth: RateQuota::new(
                env_parse("QUOTIENT_AUTH_RATE_LIMIT").unwrap_or(defaults.rate.auth.limit),
                env_parse("QUOTIENT_AUTH_RATE_WINDOW_SECS")
                    .unwrap_or(defaults.rate.auth.window_secs),
            ),
        };

        Self {
            redis_url,
            reconnect_interval,
            ttl,
            rate,
        }
    }

    /// Check whether a distributed backend is configured.
    pub fn has_distributed_backend(&self) -> bool {
        self.redis_url.is_some()
    }
}

/// Parse an environment variable, treating absence and parse failure alike.
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}
