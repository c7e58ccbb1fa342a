//! Application state and shared resources.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;

use crate::client::{SpamClient, build_client};
use crate::config::{AppConfig, StorageBackend};
use crate::entity::EntityLifecycle;
use crate::moderation::{HookRegistry, ModerationDispatcher, RequestAuthenticator};
use crate::store::{
    ContentStore, MemoryContentStore, MemoryNonceCache, NonceCache, RedisContentStore,
    RedisNonceCache,
};
use crate::submission::SubmissionWorkflow;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Content id <-> entity mappings
    pub store: Arc<dyn ContentStore>,

    /// Active classification client (production or testing)
    pub client: Arc<dyn SpamClient>,

    pub dispatcher: Arc<ModerationDispatcher>,
    pub workflow: Arc<SubmissionWorkflow>,
    pub lifecycle: Arc<EntityLifecycle>,
}

impl AppState {
    /// Create application state from configuration, connecting to Redis
    /// unless the in-memory backend is selected
    pub async fn new(config: AppConfig) -> Result<Self> {
        let (store, nonces): (Arc<dyn ContentStore>, Arc<dyn NonceCache>) = match config.storage {
            StorageBackend::Redis => {
                // Connection manager handles reconnection
                let client = redis::Client::open(config.redis_url.as_str())
                    .context("Failed to create Redis client")?;
                let redis = ConnectionManager::new(client)
                    .await
                    .context("Failed to connect to Redis")?;
                tracing::info!("Redis connected: {}", config.redis_url);

                (
                    Arc::new(RedisContentStore::new(redis.clone())),
                    Arc::new(RedisNonceCache::new(redis)),
                )
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; mappings are lost on restart");
                (
                    Arc::new(MemoryContentStore::new()),
                    Arc::new(MemoryNonceCache::new()),
                )
            }
        };

        let client = build_client(&config).await?;
        let hooks = HookRegistry::from_config(
            &config.hooks,
            Duration::from_secs(config.client.timeout_secs),
        )?;
        let hook_types: Vec<&str> = hooks.entity_types().collect();
        tracing::info!(entity_types = ?hook_types, "Moderation hooks registered");

        Ok(Self::with_parts(config, store, nonces, client, hooks))
    }

    /// Assemble state from already constructed collaborators
    pub fn with_parts(
        config: AppConfig,
        store: Arc<dyn ContentStore>,
        nonces: Arc<dyn NonceCache>,
        client: Arc<dyn SpamClient>,
        hooks: HookRegistry,
    ) -> Self {
        // Inbound callbacks are only trusted with the production keys
        let authenticator = Arc::new(RequestAuthenticator::new(config.credentials.clone(), nonces));
        let dispatcher = Arc::new(ModerationDispatcher::new(store.clone(), authenticator, hooks));
        let workflow = Arc::new(SubmissionWorkflow::new(
            client.clone(),
            config.protection.clone(),
            &config.site_url,
        ));
        let lifecycle = Arc::new(EntityLifecycle::new(client.clone(), store.clone()));

        Self {
            config,
            store,
            client,
            dispatcher,
            workflow,
            lifecycle,
        }
    }

    /// Current unix time in seconds
    pub fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }
}
