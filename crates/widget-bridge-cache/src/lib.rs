//! Filesystem artifact cache for widget records.
//!
//! One JSON file per widget id under a cache directory, swept on a recurring
//! background task that owns only a weak reference to the cache.

pub mod fs_store;
pub mod id;
mod sweeper;

pub use fs_store::{FsCacheOptions, FsWidgetCache};
pub use id::{Base36IdFactory, IdFactory, UuidIdFactory, is_valid_id};
