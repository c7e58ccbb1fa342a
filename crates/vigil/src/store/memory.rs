//! In-process store backends.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use vigil_common::{ContentMapping, NonceRecord};

use super::{ContentStore, NonceCache};

#[derive(Default)]
struct Mappings {
    /// (entity_type, entity_id) -> mapping
    by_entity: HashMap<(String, i64), ContentMapping>,
    /// content_id -> (entity_type, entity_id)
    by_content: HashMap<String, (String, i64)>,
}

/// Content mappings held in memory
#[derive(Default)]
pub struct MemoryContentStore {
    inner: RwLock<Mappings>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn lookup(&self, content_id: &str) -> Result<Option<ContentMapping>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_content
            .get(content_id)
            .and_then(|key| inner.by_entity.get(key))
            .cloned())
    }

    async fn content_id_for(&self, entity_type: &str, entity_id: i64) -> Result<Option<String>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_entity
            .get(&(entity_type.to_string(), entity_id))
            .map(|m| m.content_id.clone()))
    }

    async fn upsert(
        &self,
        entity_type: &str,
        entity_id: i64,
        content_id: &str,
        created_at: i64,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let key = (entity_type.to_string(), entity_id);

        let existing = inner
            .by_entity
            .get(&key)
            .map(|m| (m.content_id.clone(), m.created_at));
        let created_at = match existing {
            Some((old_content, created)) => {
                inner.by_content.remove(&old_content);
                created
            }
            None => created_at,
        };

        // A content id belongs to one entity at a time
        if let Some(owner) = inner.by_content.get(content_id).cloned() {
            if owner != key {
                inner.by_entity.remove(&owner);
            }
        }

        inner.by_content.insert(content_id.to_string(), key.clone());
        inner.by_entity.insert(
            key,
            ContentMapping {
                entity_type: entity_type.to_string(),
                entity_id,
                content_id: content_id.to_string(),
                created_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, entity_type: &str, entity_id: i64) -> Result<()> {
        let mut inner = self.inner.write().await;
        let key = (entity_type.to_string(), entity_id);
        if let Some(mapping) = inner.by_entity.remove(&key) {
            if inner.by_content.get(&mapping.content_id) == Some(&key) {
                inner.by_content.remove(&mapping.content_id);
            }
        }
        Ok(())
    }
}

/// Nonces held in memory
#[derive(Default)]
pub struct MemoryNonceCache {
    seen: RwLock<HashMap<String, NonceRecord>>,
}

impl MemoryNonceCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NonceCache for MemoryNonceCache {
    async fn has(&self, nonce: &str) -> Result<bool> {
        Ok(self.seen.read().await.contains_key(nonce))
    }

    async fn remember(&self, nonce: &str, seen_at: i64) -> Result<bool> {
        use std::collections::hash_map::Entry;

        match self.seen.write().await.entry(nonce.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(NonceRecord {
                    nonce: nonce.to_string(),
                    seen_at,
                });
                Ok(true)
            }
        }
    }

    async fn prune_older_than(&self, cutoff: i64) -> Result<u64> {
        let mut seen = self.seen.write().await;
        let before = seen.len();
        seen.retain(|_, record| record.seen_at >= cutoff);
        Ok((before - seen.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_lookup() {
        let store = MemoryContentStore::new();
        store.upsert("comment", 7, "c-1", 100).await.unwrap();

        let mapping = store.lookup("c-1").await.unwrap().unwrap();
        assert_eq!(mapping.entity_type, "comment");
        assert_eq!(mapping.entity_id, 7);
        assert_eq!(mapping.created_at, 100);
        assert_eq!(
            store.content_id_for("comment", 7).await.unwrap().as_deref(),
            Some("c-1")
        );
    }

    #[tokio::test]
    async fn test_upsert_replaces_content_id_keeps_created() {
        let store = MemoryContentStore::new();
        store.upsert("comment", 7, "c-1", 100).await.unwrap();
        store.upsert("comment", 7, "c-2", 200).await.unwrap();

        assert!(store.lookup("c-1").await.unwrap().is_none());
        let mapping = store.lookup("c-2").await.unwrap().unwrap();
        assert_eq!(mapping.entity_id, 7);
        assert_eq!(mapping.created_at, 100);
    }

    #[tokio::test]
    async fn test_delete_removes_both_keys() {
        let store = MemoryContentStore::new();
        store.upsert("user", 3, "u-1", 100).await.unwrap();
        store.delete("user", 3).await.unwrap();

        assert!(store.lookup("u-1").await.unwrap().is_none());
        assert!(store.content_id_for("user", 3).await.unwrap().is_none());
        // Deleting again is a no-op
        store.delete("user", 3).await.unwrap();
    }

    #[tokio::test]
    async fn test_content_id_moved_to_other_entity() {
        let store = MemoryContentStore::new();
        store.upsert("comment", 1, "c-1", 100).await.unwrap();
        store.upsert("comment", 2, "c-1", 200).await.unwrap();

        assert!(store.content_id_for("comment", 1).await.unwrap().is_none());

        // Deleting the former owner leaves the new mapping intact
        store.delete("comment", 1).await.unwrap();
        let mapping = store.lookup("c-1").await.unwrap().unwrap();
        assert_eq!(mapping.entity_id, 2);
        assert_eq!(mapping.created_at, 200);
    }

    #[tokio::test]
    async fn test_nonce_remember_once() {
        let cache = MemoryNonceCache::new();
        assert!(!cache.has("n1").await.unwrap());
        assert!(cache.remember("n1", 10).await.unwrap());
        assert!(!cache.remember("n1", 20).await.unwrap());
        assert!(cache.has("n1").await.unwrap());
    }

    #[tokio::test]
    async fn test_nonce_prune() {
        let cache = MemoryNonceCache::new();
        cache.remember("old", 10).await.unwrap();
        cache.remember("new", 1000).await.unwrap();

        assert_eq!(cache.prune_older_than(500).await.unwrap(), 1);
        assert!(!cache.has("old").await.unwrap());
        assert!(cache.has("new").await.unwrap());
        assert_eq!(cache.prune_older_than(500).await.unwrap(), 0);
    }
}
