//! Quotient Core - Shared Types
//!
//! Error taxonomy and configuration for the Quotient caching and
//! rate-limiting layer. This crate contains ONLY data types - no business
//! logic. All other crates depend on this.

pub mod config;
pub mod error;

pub use config::{QuotientConfig, RatePresets, RateQuota, TtlPreset, TtlPresets};
pub use error::{
    CodecError, ConfigError, FetchError, QuotientError, QuotientResult, StoreError,
};
