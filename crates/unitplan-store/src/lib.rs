//! Storage layer: the processing cache, persisted as a single Parquet file.

mod cache;
mod error;

pub use cache::{CacheEntry, CacheMap, CacheStore, lookup};
pub use error::StoreError;
