//! Store backends and the resilient facade.
//!
//! Two interchangeable backends implement [`Store`]: [`RedisStore`]
//! (networked, shared across processes) and [`MemoryStore`] (in-process
//! fallback). [`ResilientStore`] wraps both and degrades from the first to
//! the second on failure.

pub mod memory;
pub mod redis_backend;
pub mod resilient;
pub mod traits;

pub use memory::MemoryStore;
pub use redis_backend::RedisStore;
pub use resilient::{ResilientStore, StoreStats};
pub use traits::{DynStore, Store, WindowCounter};
