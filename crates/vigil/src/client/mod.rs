//! Client for the remote classification service.
//!
//! `SpamClient` is the seam the workflows depend on. Two implementations:
//! - `MollomClient` - production API with the site's keys
//! - `TestingClient` - development API with separate, self-provisioning keys

mod mollom;
mod testing;
#[cfg(test)]
pub(crate) mod mock;

pub use mollom::MollomClient;
pub use testing::TestingClient;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use vigil_common::{
    CaptchaChallenge, CaptchaResult, ClassificationResult, ClientError, FeedbackReason,
};

use crate::config::AppConfig;
use crate::oauth::Params;

/// Signed calls to the classification service
#[async_trait]
pub trait SpamClient: Send + Sync {
    /// Submit content for classification (or update a known content id)
    async fn check_content(&self, data: &ContentCheck) -> Result<ClassificationResult, ClientError>;

    /// Check a CAPTCHA solution
    async fn check_captcha(&self, data: &CaptchaCheck) -> Result<CaptchaResult, ClientError>;

    /// Request a new CAPTCHA for a content id
    async fn create_captcha(&self, request: &CaptchaRequest) -> Result<CaptchaChallenge, ClientError>;

    /// Report a moderation decision back to the service
    async fn send_feedback(&self, feedback: &Feedback) -> Result<(), ClientError>;

    /// Check that the configured keys are accepted
    async fn verify_keys(&self) -> Result<(), ClientError>;

    /// Public key of the active credentials
    fn public_key(&self) -> String;
}

/// Author metadata shared by content and CAPTCHA checks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthorParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_created: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_mail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_url: Option<String>,
}

impl AuthorParams {
    fn append(&self, params: &mut Params) {
        push(params, "authorIp", self.author_ip.as_deref());
        push(params, "authorId", self.author_id.as_deref());
        push(params, "authorCreated", self.author_created.map(|t| t.to_string()).as_deref());
        push(params, "authorName", self.author_name.as_deref());
        push(params, "authorMail", self.author_mail.as_deref());
        push(params, "authorUrl", self.author_url.as_deref());
    }
}

/// Parameters of a content check.
///
/// Entity-specific fields come from the caller; the submission workflow
/// fills in author metadata, honeypot, `unsure`, `checks`, and `id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentCheck {
    /// Known content id; turns the check into an update of that session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_body: Option<String>,

    #[serde(flatten)]
    pub author: AuthorParams,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub honeypot: Option<String>,

    /// Content type hint (e.g. "user" for registrations)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Absolute URL of the page containing the form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha_id: Option<String>,

    /// Whether unsure verdicts should be answered with a CAPTCHA
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsure: Option<bool>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<String>,

    /// Storage notification: true once stored locally, false once deleted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored: Option<bool>,
}

impl ContentCheck {
    /// Stored/deleted notification for a known content id
    pub fn stored(content_id: &str, stored: bool) -> Self {
        Self {
            id: Some(content_id.to_string()),
            stored: Some(stored),
            ..Default::default()
        }
    }

    /// Fills author fields the caller left empty
    pub fn merge_author(&mut self, author: &AuthorParams) {
        fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if slot.is_none() {
                slot.clone_from(value);
            }
        }
        fill(&mut self.author.author_ip, &author.author_ip);
        fill(&mut self.author.author_id, &author.author_id);
        fill(&mut self.author.author_created, &author.author_created);
        fill(&mut self.author.author_name, &author.author_name);
        fill(&mut self.author.author_mail, &author.author_mail);
        fill(&mut self.author.author_url, &author.author_url);
    }

    /// Wire parameters (the `id` travels in the request path)
    pub fn params(&self) -> Params {
        let mut params = Params::new();
        push(&mut params, "postTitle", self.post_title.as_deref());
        push(&mut params, "postBody", self.post_body.as_deref());
        self.author.append(&mut params);
        push(&mut params, "honeypot", self.honeypot.as_deref());
        push(&mut params, "type", self.kind.as_deref());
        push(&mut params, "contextUrl", self.context_url.as_deref());
        push(&mut params, "captchaId", self.captcha_id.as_deref());
        push(&mut params, "unsure", self.unsure.map(flag));
        push(&mut params, "stored", self.stored.map(flag));
        for check in &self.checks {
            params.push(("checks".to_string(), check.clone()));
        }
        params
    }
}

/// Parameters of a CAPTCHA solution check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptchaCheck {
    pub id: String,
    pub solution: String,
    pub author: AuthorParams,
    pub honeypot: Option<String>,
}

impl CaptchaCheck {
    pub fn params(&self) -> Params {
        let mut params = vec![("solution".to_string(), self.solution.clone())];
        self.author.append(&mut params);
        push(&mut params, "honeypot", self.honeypot.as_deref());
        params
    }
}

/// Request for a new CAPTCHA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaRequest {
    /// "image" or "audio"
    pub kind: String,
    pub content_id: String,
}

impl CaptchaRequest {
    pub fn image(content_id: &str) -> Self {
        Self {
            kind: "image".to_string(),
            content_id: content_id.to_string(),
        }
    }

    pub fn params(&self) -> Params {
        vec![
            ("type".to_string(), self.kind.clone()),
            ("contentId".to_string(), self.content_id.clone()),
        ]
    }
}

/// Moderation feedback for a content id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub reason: FeedbackReason,
    pub content_id: String,
}

impl Feedback {
    pub fn params(&self) -> Params {
        vec![
            ("reason".to_string(), self.reason.as_str().to_string()),
            ("contentId".to_string(), self.content_id.clone()),
        ]
    }
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

fn push(params: &mut Params, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        params.push((key.to_string(), value.to_string()));
    }
}

/// Builds the client variant selected by configuration
pub async fn build_client(config: &AppConfig) -> Result<Arc<dyn SpamClient>> {
    let timeout = Duration::from_secs(config.client.timeout_secs);

    if config.testing.enabled {
        tracing::warn!(
            server = %config.testing.server,
            "Testing mode enabled; submissions are checked against the development service"
        );
        let client = TestingClient::connect(&config.testing, &config.client, &config.site_url, timeout)
            .await?;
        return Ok(Arc::new(client));
    }

    let client = MollomClient::new(
        &config.client.server,
        &config.client.api_version,
        config.credentials.clone(),
        timeout,
    )?;
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_params_skip_empty_fields() {
        let check = ContentCheck {
            id: Some("c-1".to_string()),
            post_body: Some("Hello".to_string()),
            unsure: Some(true),
            checks: vec!["spam".to_string(), "profanity".to_string()],
            ..Default::default()
        };
        let params = check.params();
        assert_eq!(
            params,
            vec![
                ("postBody".to_string(), "Hello".to_string()),
                ("unsure".to_string(), "1".to_string()),
                ("checks".to_string(), "spam".to_string()),
                ("checks".to_string(), "profanity".to_string()),
            ]
        );
    }

    #[test]
    fn test_merge_author_keeps_caller_fields() {
        let mut check = ContentCheck {
            author: AuthorParams {
                author_name: Some("from-form".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        check.merge_author(&AuthorParams {
            author_ip: Some("10.0.0.1".to_string()),
            author_name: Some("from-account".to_string()),
            ..Default::default()
        });
        assert_eq!(check.author.author_name.as_deref(), Some("from-form"));
        assert_eq!(check.author.author_ip.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_content_check_json_shape() {
        let check: ContentCheck = serde_json::from_str(
            r#"{"postTitle":"Hi","authorName":"Ann","type":"user"}"#,
        )
        .unwrap();
        assert_eq!(check.post_title.as_deref(), Some("Hi"));
        assert_eq!(check.author.author_name.as_deref(), Some("Ann"));
        assert_eq!(check.kind.as_deref(), Some("user"));
    }

    #[test]
    fn test_stored_notification_params() {
        let params = ContentCheck::stored("c-9", false).params();
        assert_eq!(params, vec![("stored".to_string(), "0".to_string())]);
    }
}
