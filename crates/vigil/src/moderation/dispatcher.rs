//! Webhook gate sequence.

use std::sync::Arc;

use vigil_common::{ModerationAction, ModerationError};

use super::authenticator::{InboundRequest, RequestAuthenticator};
use super::hooks::HookRegistry;
use crate::store::ContentStore;

/// Resolves, authenticates and dispatches inbound moderation requests
pub struct ModerationDispatcher {
    store: Arc<dyn ContentStore>,
    authenticator: Arc<RequestAuthenticator>,
    hooks: HookRegistry,
}

impl ModerationDispatcher {
    pub fn new(
        store: Arc<dyn ContentStore>,
        authenticator: Arc<RequestAuthenticator>,
        hooks: HookRegistry,
    ) -> Self {
        Self {
            store,
            authenticator,
            hooks,
        }
    }

    /// Run the gates for `action` on `content_id`.
    ///
    /// `Ok(applied)` means the request passed all gates; `applied` is what
    /// the entity's hook reported.
    pub async fn handle(
        &self,
        content_id: &str,
        action: &str,
        request: &InboundRequest,
        now: i64,
    ) -> Result<bool, ModerationError> {
        tracing::info!(content_id, action, "Moderation request");

        let action: ModerationAction = action.parse().inspect_err(|_| {
            tracing::warn!(content_id, action, "Unsupported moderation action");
        })?;

        let mapping = self
            .store
            .lookup(content_id)
            .await
            .map_err(|e| {
                tracing::error!(content_id, error = %e, "Content lookup failed");
                ModerationError::Storage(e.to_string())
            })?
            .ok_or_else(|| {
                tracing::warn!(content_id, "Unknown content id");
                ModerationError::NotFound(content_id.to_string())
            })?;

        tracing::debug!(
            content_id,
            entity_type = %mapping.entity_type,
            entity_id = mapping.entity_id,
            "Resolved content id"
        );

        self.authenticator
            .authenticate(request, now)
            .await
            .inspect_err(|failure| {
                tracing::warn!(content_id, kind = ?failure.kind(), "Rejected moderation request");
            })?;

        Ok(self
            .hooks
            .moderate(&mapping.entity_type, mapping.entity_id, action)
            .await)
    }
}
