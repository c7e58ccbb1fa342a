//! Local entity lifecycle: keeps the service and the content mapping in
//! step with what the CMS stores and deletes.

use std::sync::Arc;

use vigil_common::{FeedbackReason, VigilError};

use crate::client::{ContentCheck, Feedback, SpamClient};
use crate::store::ContentStore;

pub struct EntityLifecycle {
    client: Arc<dyn SpamClient>,
    store: Arc<dyn ContentStore>,
}

impl EntityLifecycle {
    pub fn new(client: Arc<dyn SpamClient>, store: Arc<dyn ContentStore>) -> Self {
        Self { client, store }
    }

    /// Record that an entity was stored under `content_id`.
    ///
    /// Returns false (and does nothing) if the submission never got a
    /// content id.
    pub async fn save(
        &self,
        entity_type: &str,
        entity_id: i64,
        content_id: &str,
        now: i64,
    ) -> Result<bool, VigilError> {
        if content_id.is_empty() {
            return Ok(false);
        }

        let mut notification = ContentCheck::stored(content_id, true);
        // Newly registered accounts only get their id once stored
        if entity_type == "user" {
            notification.author.author_id = Some(entity_id.to_string());
        }
        if let Err(e) = self.client.check_content(&notification).await {
            tracing::warn!(entity_type, entity_id, content_id, error = %e, "Stored notification failed");
        }

        self.store
            .upsert(entity_type, entity_id, content_id, now)
            .await
            .map_err(|e| VigilError::Storage(e.to_string()))?;

        tracing::info!(entity_type, entity_id, content_id, "Saved content mapping");
        Ok(true)
    }

    /// Forget an entity that is about to be deleted
    pub async fn delete(&self, entity_type: &str, entity_id: i64) -> Result<(), VigilError> {
        if let Some(content_id) = self.content_id(entity_type, entity_id).await? {
            let notification = ContentCheck::stored(&content_id, false);
            if let Err(e) = self.client.check_content(&notification).await {
                tracing::warn!(entity_type, entity_id, content_id = %content_id, error = %e, "Deleted notification failed");
            }
        }

        self.store
            .delete(entity_type, entity_id)
            .await
            .map_err(|e| VigilError::Storage(e.to_string()))?;

        tracing::info!(entity_type, entity_id, "Deleted content mapping");
        Ok(())
    }

    /// Report a moderation status change. Only `spam` and `approve` are
    /// reported; returns whether feedback was sent.
    pub async fn send_feedback(
        &self,
        entity_type: &str,
        entity_id: i64,
        status: &str,
    ) -> Result<bool, VigilError> {
        let Some(reason) = FeedbackReason::from_status(status) else {
            return Ok(false);
        };
        let Some(content_id) = self.content_id(entity_type, entity_id).await? else {
            tracing::debug!(entity_type, entity_id, "No content id, skipping feedback");
            return Ok(false);
        };

        self.client
            .send_feedback(&Feedback { reason, content_id })
            .await?;
        Ok(true)
    }

    async fn content_id(&self, entity_type: &str, entity_id: i64) -> Result<Option<String>, VigilError> {
        self.store
            .content_id_for(entity_type, entity_id)
            .await
            .map_err(|e| VigilError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::ScriptedClient;
    use crate::store::MemoryContentStore;
    use vigil_common::{ClassificationResult, ClientError};

    fn stored_reply() -> Result<ClassificationResult, ClientError> {
        Ok(ClassificationResult {
            id: "c-1".to_string(),
            spam_classification: None,
            spam_score: None,
            profanity_score: None,
            reason: None,
        })
    }

    fn lifecycle(client: Arc<ScriptedClient>) -> (EntityLifecycle, Arc<MemoryContentStore>) {
        let store = Arc::new(MemoryContentStore::new());
        (EntityLifecycle::new(client, store.clone()), store)
    }

    #[tokio::test]
    async fn test_save_notifies_and_maps() {
        let client = Arc::new(ScriptedClient::new().reply(stored_reply()));
        let (lifecycle, store) = lifecycle(client.clone());

        assert!(lifecycle.save("comment", 9, "c-1", 100).await.unwrap());

        let sent = &client.content_calls()[0];
        assert_eq!(sent.id.as_deref(), Some("c-1"));
        assert_eq!(sent.stored, Some(true));
        assert!(sent.author.author_id.is_none());

        let mapping = store.lookup("c-1").await.unwrap().unwrap();
        assert_eq!((mapping.entity_type.as_str(), mapping.entity_id), ("comment", 9));
    }

    #[tokio::test]
    async fn test_save_user_sends_author_id() {
        let client = Arc::new(ScriptedClient::new().reply(stored_reply()));
        let (lifecycle, _) = lifecycle(client.clone());

        lifecycle.save("user", 31, "c-1", 100).await.unwrap();
        assert_eq!(client.content_calls()[0].author.author_id.as_deref(), Some("31"));
    }

    #[tokio::test]
    async fn test_save_without_content_id_is_noop() {
        let client = Arc::new(ScriptedClient::new());
        let (lifecycle, _) = lifecycle(client.clone());

        assert!(!lifecycle.save("comment", 9, "", 100).await.unwrap());
        assert!(client.content_calls().is_empty());
    }

    #[tokio::test]
    async fn test_save_survives_notification_failure() {
        // No scripted reply: the notification fails
        let client = Arc::new(ScriptedClient::new());
        let (lifecycle, store) = lifecycle(client);

        assert!(lifecycle.save("comment", 9, "c-1", 100).await.unwrap());
        assert!(store.lookup("c-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_notifies_and_unmaps() {
        let client = Arc::new(ScriptedClient::new().reply(stored_reply()));
        let (lifecycle, store) = lifecycle(client.clone());
        store.upsert("comment", 9, "c-1", 100).await.unwrap();

        lifecycle.delete("comment", 9).await.unwrap();

        let sent = &client.content_calls()[0];
        assert_eq!(sent.stored, Some(false));
        assert!(store.lookup("c-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_unknown_entity_skips_notification() {
        let client = Arc::new(ScriptedClient::new());
        let (lifecycle, _) = lifecycle(client.clone());

        lifecycle.delete("comment", 404).await.unwrap();
        assert!(client.content_calls().is_empty());
    }

    #[tokio::test]
    async fn test_feedback_only_for_spam_and_approve() {
        let client = Arc::new(ScriptedClient::new());
        let (lifecycle, store) = lifecycle(client.clone());
        store.upsert("comment", 9, "c-1", 100).await.unwrap();

        assert!(!lifecycle.send_feedback("comment", 9, "trash").await.unwrap());
        assert!(!lifecycle.send_feedback("comment", 10, "spam").await.unwrap());
        assert!(lifecycle.send_feedback("comment", 9, "spam").await.unwrap());

        let feedback = client.feedback.lock().unwrap();
        assert_eq!(
            *feedback,
            vec![Feedback {
                reason: FeedbackReason::Spam,
                content_id: "c-1".to_string()
            }]
        );
    }
}
