//! Persistent result cache
//!
//! Trial results are cached per (build identity, task). Build identities
//! come from resolved revisions, so a new commit naturally invalidates all
//! of its predecessors' entries while rebuilding an unchanged revision
//! reuses them.
//!
//! | Situation | Behaviour |
//! |-----------|-----------|
//! | No identity, task 0, or parameters set | bypass (always miss, never stored) |
//! | Unreadable or malformed entry | miss |
//! | Write from a worker | queued until the orchestrator syncs |
//! | Failed write | kept and retried at the next sync |

pub mod key;
mod result_cache;
pub mod store;

pub use key::CacheKey;
pub use result_cache::ResultCache;
pub use store::{CacheStore, FileStore, MemoryStore};
