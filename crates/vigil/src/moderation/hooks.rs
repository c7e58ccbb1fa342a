//! Entity-type specific reactions to moderation actions.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use vigil_common::ModerationAction;

use crate::config::HookConfig;

/// Applies a moderation action to one local entity.
///
/// Returns `Ok(true)` if the action was applied, `Ok(false)` if the entity
/// type does not react to it.
#[async_trait]
pub trait ModerationHook: Send + Sync {
    async fn moderate(&self, entity_id: i64, action: ModerationAction) -> Result<bool>;
}

/// Hooks keyed by entity type
#[derive(Default, Clone)]
pub struct HookRegistry {
    hooks: HashMap<String, Arc<dyn ModerationHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build HTTP hooks from configuration
    pub fn from_config(hooks: &HashMap<String, HookConfig>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build hook HTTP client")?;

        let mut registry = Self::new();
        for (entity_type, config) in hooks {
            let hook = HttpModerationHook::new(http.clone(), entity_type, config);
            registry.register(entity_type, Arc::new(hook));
        }
        Ok(registry)
    }

    pub fn register(&mut self, entity_type: &str, hook: Arc<dyn ModerationHook>) {
        self.hooks.insert(entity_type.to_string(), hook);
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.hooks.keys().map(String::as_str)
    }

    /// Dispatch to the hook of `entity_type`. Any failure, including a
    /// missing hook, counts as "not applied".
    pub async fn moderate(&self, entity_type: &str, entity_id: i64, action: ModerationAction) -> bool {
        let Some(hook) = self.hooks.get(entity_type) else {
            tracing::warn!(entity_type, entity_id, "No moderation hook for entity type");
            return false;
        };

        match hook.moderate(entity_id, action).await {
            Ok(applied) => {
                tracing::info!(entity_type, entity_id, %action, applied, "Moderation hook finished");
                applied
            }
            Err(e) => {
                tracing::error!(entity_type, entity_id, %action, error = %e, "Moderation hook failed");
                false
            }
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HookRequest<'a> {
    entity_type: &'a str,
    entity_id: i64,
    action: ModerationAction,
}

#[derive(Deserialize)]
struct HookResponse {
    success: bool,
}

/// Forwards moderation actions to a CMS endpoint as JSON
pub struct HttpModerationHook {
    http: reqwest::Client,
    entity_type: String,
    url: String,
    actions: Option<Vec<ModerationAction>>,
}

impl HttpModerationHook {
    pub fn new(http: reqwest::Client, entity_type: &str, config: &HookConfig) -> Self {
        Self {
            http,
            entity_type: entity_type.to_string(),
            url: config.url.clone(),
            actions: config.actions.clone(),
        }
    }

    fn handles(&self, action: ModerationAction) -> bool {
        self.actions
            .as_ref()
            .is_none_or(|actions| actions.contains(&action))
    }
}

#[async_trait]
impl ModerationHook for HttpModerationHook {
    async fn moderate(&self, entity_id: i64, action: ModerationAction) -> Result<bool> {
        if !self.handles(action) {
            tracing::debug!(entity_type = %self.entity_type, %action, "Action not handled by hook");
            return Ok(false);
        }

        let response = self
            .http
            .post(&self.url)
            .json(&HookRequest {
                entity_type: &self.entity_type,
                entity_id,
                action,
            })
            .send()
            .await
            .with_context(|| format!("Hook request to {} failed", self.url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Hook {} answered {}", self.url, status);
        }

        let body: HookResponse = response
            .json()
            .await
            .context("Invalid hook response")?;
        Ok(body.success)
    }
}
