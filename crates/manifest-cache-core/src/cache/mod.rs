//! Local manifest cache.
//!
//! - `CacheStore`: the on-disk manifest and metadata files, and the lock
//!   file shared with other processes
//! - `policy`: when a cached manifest may still be served
//! - `CacheCoordinator`: lookups, refills and the single-flight guarantee
//!
//! The cache holds exactly one manifest. A refill replaces it wholesale.

pub mod coordinator;
pub mod policy;
pub mod store;

pub use coordinator::CacheCoordinator;
pub use store::{CacheLock, CacheStore};
