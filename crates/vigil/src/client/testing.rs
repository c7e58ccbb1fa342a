//! Testing-mode client.
//!
//! Talks to the development service with its own key pair, which is never
//! the production pair. Development keys can vanish whenever that service
//! is redeployed, so they are verified on construction and, when rejected,
//! replaced by a freshly created site (once per process).

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use vigil_common::{CaptchaChallenge, CaptchaResult, ClassificationResult, ClientError};

use super::{CaptchaCheck, CaptchaRequest, ContentCheck, Feedback, MollomClient, SpamClient};
use crate::config::{ClientConfig, TestingConfig};

pub struct TestingClient {
    inner: MollomClient,
    /// Cleared after the first provisioning attempt
    create_keys: AtomicBool,
    site_url: String,
    site_mail: String,
}

impl TestingClient {
    /// Build the client and make sure it holds usable keys
    pub async fn connect(
        testing: &TestingConfig,
        client: &ClientConfig,
        site_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let inner = MollomClient::new(
            &testing.server,
            &client.api_version,
            testing.credentials.clone(),
            timeout,
        )?;

        let this = Self {
            inner,
            create_keys: AtomicBool::new(testing.create_keys),
            site_url: site_url.to_string(),
            site_mail: testing.site_mail.clone(),
        };

        if testing.create_keys {
            if let Err(e) = this.check_keys().await {
                tracing::warn!(code = e.code(), error = %e, "Testing API keys are not usable");
            }
        }

        Ok(this)
    }

    /// Verify the current keys and provision new ones on an auth error
    async fn check_keys(&self) -> Result<(), ClientError> {
        let result = self.inner.verify_keys().await;

        match result {
            Err(ClientError::Auth(_)) if self.create_keys.swap(false, Ordering::SeqCst) => {
                self.provision_keys().await
            }
            other => other,
        }
    }

    async fn provision_keys(&self) -> Result<(), ClientError> {
        match self.inner.create_site(&self.site_url, &self.site_mail).await {
            Ok(keys) => {
                tracing::info!(public_key = %keys.public_key, "Created testing API keys");
                self.inner.set_credentials(keys);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to create testing API keys");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl SpamClient for TestingClient {
    async fn check_content(&self, data: &ContentCheck) -> Result<ClassificationResult, ClientError> {
        self.inner.check_content(data).await
    }

    async fn check_captcha(&self, data: &CaptchaCheck) -> Result<CaptchaResult, ClientError> {
        self.inner.check_captcha(data).await
    }

    async fn create_captcha(&self, request: &CaptchaRequest) -> Result<CaptchaChallenge, ClientError> {
        self.inner.create_captcha(request).await
    }

    async fn send_feedback(&self, feedback: &Feedback) -> Result<(), ClientError> {
        self.inner.send_feedback(feedback).await
    }

    async fn verify_keys(&self) -> Result<(), ClientError> {
        self.check_keys().await
    }

    fn public_key(&self) -> String {
        self.inner.public_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_common::Credentials;

    #[tokio::test]
    async fn test_connect_without_provisioning() {
        let testing = TestingConfig {
            enabled: true,
            server: "http://127.0.0.1:9".to_string(),
            credentials: Credentials::new("test-pub", "test-priv"),
            create_keys: false,
            site_mail: "test@example.com".to_string(),
        };
        let client = TestingClient::connect(
            &testing,
            &ClientConfig::default(),
            "http://localhost",
            Duration::from_millis(200),
        )
        .await
        .unwrap();

        assert_eq!(client.public_key(), "test-pub");
        assert!(!client.create_keys.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_missing_keys_attempt_provisioning_once() {
        let testing = TestingConfig {
            enabled: true,
            // Nothing listens here; provisioning fails with a network error
            server: "http://127.0.0.1:9".to_string(),
            credentials: Credentials::default(),
            create_keys: true,
            site_mail: "test@example.com".to_string(),
        };
        let client = TestingClient::connect(
            &testing,
            &ClientConfig::default(),
            "http://localhost",
            Duration::from_millis(200),
        )
        .await
        .unwrap();

        assert!(!client.create_keys.load(Ordering::SeqCst));
        // Second verification reports the auth error instead of provisioning again
        let err = client.verify_keys().await.unwrap_err();
        assert_eq!(err.code(), ClientError::AUTH_ERROR);
    }
}
