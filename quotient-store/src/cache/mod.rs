//! Stale-while-revalidate caching.
//!
//! Staleness is explicit, not hidden: every read returns a [`Cached<T>`]
//! carrying an `is_stale` flag, and the fresh/stale bounds travel with the
//! stored entry. See [`SwrCache`] for the read-path rules.

pub mod entry;
pub mod swr;

pub use entry::{Cached, EntryState, TtlPolicy};
pub use swr::{CacheStats, SwrCache};
