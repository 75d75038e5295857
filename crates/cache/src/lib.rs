//! `buildvault-cache`: the process-wide keyed store and its key scheme.
//!
//! ## Components
//!
//! - `CacheKey` / key functions: deterministic keys for single items, full
//!   listings, query results, and task status records
//! - `KeyedStore`: concurrent get/put/evict with type-scoped bulk eviction
//! - `InMemoryKeyedStore`: unbounded in-process implementation

pub mod key;
pub mod store;

pub use key::{
    all_key, query_key, single_key, task_key, CacheKey, EntityType, Identifier, Namespace,
    ParamValue, QueryParams, NULL_SENTINEL,
};
pub use store::{CacheEntry, InMemoryKeyedStore, KeyedStore};
