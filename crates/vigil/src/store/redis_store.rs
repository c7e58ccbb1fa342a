//! Redis-backed store backends.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use vigil_common::ContentMapping;
use vigil_common::constants::REPLAY_WINDOW_SECS;
use vigil_common::constants::redis_keys::{CONTENT_PREFIX, ENTITY_PREFIX, NONCE_PREFIX};

use super::{ContentStore, NonceCache};

fn content_key(content_id: &str) -> String {
    format!("{}{}", CONTENT_PREFIX, content_id)
}

fn entity_key(entity_type: &str, entity_id: i64) -> String {
    format!("{}{}:{}", ENTITY_PREFIX, entity_type, entity_id)
}

/// Insert or update the mapping of one entity.
///
/// KEYS: entity key, new content key
/// ARGV: content id, entity type, entity id, created_at, content prefix, entity prefix
const UPSERT_SCRIPT: &str = r#"
local created = ARGV[4]
local prev = redis.call('GET', KEYS[1])
if prev then
  local prev_key = ARGV[5] .. prev
  local kept = redis.call('HGET', prev_key, 'createdAt')
  if kept then created = kept end
  if prev ~= ARGV[1] then redis.call('DEL', prev_key) end
end
local owner_type = redis.call('HGET', KEYS[2], 'entityType')
local owner_id = redis.call('HGET', KEYS[2], 'entityId')
if owner_type and owner_id and (owner_type ~= ARGV[2] or owner_id ~= ARGV[3]) then
  redis.call('DEL', ARGV[6] .. owner_type .. ':' .. owner_id)
end
redis.call('HSET', KEYS[2], 'entityType', ARGV[2], 'entityId', ARGV[3], 'contentId', ARGV[1], 'createdAt', created)
redis.call('SET', KEYS[1], ARGV[1])
return created
"#;

/// Remove the mapping of one entity.
///
/// KEYS: entity key
/// ARGV: content prefix, entity type, entity id
const DELETE_SCRIPT: &str = r#"
local prev = redis.call('GET', KEYS[1])
redis.call('DEL', KEYS[1])
if not prev then return 0 end
local content_key = ARGV[1] .. prev
if redis.call('HGET', content_key, 'entityType') == ARGV[2]
  and redis.call('HGET', content_key, 'entityId') == ARGV[3] then
  redis.call('DEL', content_key)
end
return 1
"#;

/// Content mappings stored as two keys per entity:
/// `content:{id}` is a hash with the mapping, `entity:{type}:{id}` holds
/// the content id. Writes run as Lua scripts so the old-id read and the
/// updates form one atomic step.
pub struct RedisContentStore {
    redis: ConnectionManager,
    upsert: redis::Script,
    delete: redis::Script,
}

impl RedisContentStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis,
            upsert: redis::Script::new(UPSERT_SCRIPT),
            delete: redis::Script::new(DELETE_SCRIPT),
        }
    }
}

/// Decode a mapping hash; an empty hash means no mapping
fn mapping_from_fields(fields: HashMap<String, String>) -> Result<Option<ContentMapping>> {
    if fields.is_empty() {
        return Ok(None);
    }
    let field = |name: &str| {
        fields
            .get(name)
            .cloned()
            .with_context(|| format!("Corrupt content mapping: missing {}", name))
    };

    Ok(Some(ContentMapping {
        entity_type: field("entityType")?,
        entity_id: field("entityId")?.parse().context("Corrupt content mapping: entityId")?,
        content_id: field("contentId")?,
        created_at: field("createdAt")?.parse().context("Corrupt content mapping: createdAt")?,
    }))
}

#[async_trait]
impl ContentStore for RedisContentStore {
    async fn lookup(&self, content_id: &str) -> Result<Option<ContentMapping>> {
        let mut conn = self.redis.clone();
        let fields: HashMap<String, String> = conn.hgetall(content_key(content_id)).await?;
        mapping_from_fields(fields)
    }

    async fn content_id_for(&self, entity_type: &str, entity_id: i64) -> Result<Option<String>> {
        let mut conn = self.redis.clone();
        let content_id: Option<String> = conn.get(entity_key(entity_type, entity_id)).await?;
        Ok(content_id)
    }

    async fn upsert(
        &self,
        entity_type: &str,
        entity_id: i64,
        content_id: &str,
        created_at: i64,
    ) -> Result<()> {
        let mut conn = self.redis.clone();

        let created: String = self
            .upsert
            .key(entity_key(entity_type, entity_id))
            .key(content_key(content_id))
            .arg(content_id)
            .arg(entity_type)
            .arg(entity_id)
            .arg(created_at)
            .arg(CONTENT_PREFIX)
            .arg(ENTITY_PREFIX)
            .invoke_async(&mut conn)
            .await
            .context("Content mapping upsert failed")?;

        tracing::debug!(
            entity_type = %entity_type,
            entity_id = entity_id,
            content_id = %content_id,
            created_at = %created,
            "Stored content mapping"
        );

        Ok(())
    }

    async fn delete(&self, entity_type: &str, entity_id: i64) -> Result<()> {
        let mut conn = self.redis.clone();

        let _: i64 = self
            .delete
            .key(entity_key(entity_type, entity_id))
            .arg(CONTENT_PREFIX)
            .arg(entity_type)
            .arg(entity_id)
            .invoke_async(&mut conn)
            .await
            .context("Content mapping delete failed")?;

        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.redis.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Nonces stored as `nonce:{value}` keys expiring with the replay window
pub struct RedisNonceCache {
    redis: ConnectionManager,
}

impl RedisNonceCache {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl NonceCache for RedisNonceCache {
    async fn has(&self, nonce: &str) -> Result<bool> {
        let mut conn = self.redis.clone();
        let exists: bool = conn.exists(format!("{}{}", NONCE_PREFIX, nonce)).await?;
        Ok(exists)
    }

    async fn remember(&self, nonce: &str, seen_at: i64) -> Result<bool> {
        let mut conn = self.redis.clone();

        // SET NX is the atomic check-and-set; a nil reply means someone else
        // registered the nonce first.
        let reply: Option<String> = redis::cmd("SET")
            .arg(format!("{}{}", NONCE_PREFIX, nonce))
            .arg(seen_at)
            .arg("NX")
            .arg("EX")
            .arg(REPLAY_WINDOW_SECS)
            .query_async(&mut conn)
            .await?;

        Ok(reply.is_some())
    }

    async fn prune_older_than(&self, _cutoff: i64) -> Result<u64> {
        // Keys expire on their own after the replay window
        Ok(0)
    }
}
