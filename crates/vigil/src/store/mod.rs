//! Persistence collaborators: content mappings and webhook nonces.
//!
//! Two backends: Redis for deployments (shared across instances, atomic
//! nonce registration via `SET NX`), and an in-process map for tests and
//! single-node setups.

mod memory;
mod redis_store;

pub use memory::{MemoryContentStore, MemoryNonceCache};
pub use redis_store::{RedisContentStore, RedisNonceCache};

use anyhow::Result;
use async_trait::async_trait;
use vigil_common::ContentMapping;

/// Remote content id <-> local entity mapping.
///
/// `(entity_type, entity_id)` is unique; `content_id` is a secondary key.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Resolve a remote content id to its local entity
    async fn lookup(&self, content_id: &str) -> Result<Option<ContentMapping>>;

    /// Content id currently associated with a local entity
    async fn content_id_for(&self, entity_type: &str, entity_id: i64) -> Result<Option<String>>;

    /// Insert or update the mapping of an entity. An existing row keeps its
    /// original `created_at`.
    async fn upsert(
        &self,
        entity_type: &str,
        entity_id: i64,
        content_id: &str,
        created_at: i64,
    ) -> Result<()>;

    /// Remove the mapping of an entity (no-op if absent)
    async fn delete(&self, entity_type: &str, entity_id: i64) -> Result<()>;

    /// Backend reachability
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Recently seen webhook nonces.
#[async_trait]
pub trait NonceCache: Send + Sync {
    async fn has(&self, nonce: &str) -> Result<bool>;

    /// Register a nonce. Returns `false` if it was already present, so
    /// concurrent deliveries of one nonce cannot both register it.
    async fn remember(&self, nonce: &str, seen_at: i64) -> Result<bool>;

    /// Drop records seen before `cutoff`. Returns the number removed.
    async fn prune_older_than(&self, cutoff: i64) -> Result<u64>;
}
