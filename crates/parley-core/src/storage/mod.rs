//! Storage collaborators
//!
//! - `ThreadStore`: durable conversation threads with TTL and a turn ceiling
//! - `SessionCache`: advisory hints keyed by continuation id
//!
//! Both ship with in-memory implementations; production deployments can
//! plug in shared backends behind the same traits.

mod error;
mod session_cache;
mod threads;

pub use error::{StoreError, StoreResult};
pub use session_cache::{MemorySessionCache, SessionCache, SessionCacheEntry};
pub use threads::{MemoryThreadStore, ThreadStore};
