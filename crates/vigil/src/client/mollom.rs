//! HTTP implementation of the classification service client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode, header};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use std::sync::RwLock;
use std::time::Duration;
use vigil_common::constants::oauth as oauth_params;
use vigil_common::{CaptchaChallenge, CaptchaResult, ClassificationResult, ClientError, Credentials};

use super::{CaptchaCheck, CaptchaRequest, ContentCheck, Feedback, SpamClient};
use crate::oauth::{self, Params};

/// Production client: OAuth-signed, form-encoded requests with JSON responses
pub struct MollomClient {
    http: reqwest::Client,
    /// Base URL, e.g. `https://rest.mollom.com`
    server: String,
    api_version: String,
    credentials: RwLock<Credentials>,
}

#[derive(Deserialize)]
struct ContentEnvelope {
    content: ClassificationResult,
}

#[derive(Deserialize)]
struct CaptchaEnvelope {
    captcha: WireCaptcha,
}

#[derive(Deserialize)]
struct WireCaptcha {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, deserialize_with = "loose_bool")]
    solved: bool,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct SiteEnvelope {
    site: WireSite,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSite {
    #[serde(default)]
    public_key: String,
    #[serde(default)]
    private_key: String,
}

/// The service reports flags as 0/1; accept booleans and strings too
fn loose_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    use serde_json::Value;

    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => s == "1" || s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

impl MollomClient {
    pub fn new(
        server: &str,
        api_version: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            server: server.trim_end_matches('/').to_string(),
            api_version: api_version.to_string(),
            credentials: RwLock::new(credentials),
        })
    }

    pub fn credentials(&self) -> Credentials {
        self.credentials
            .read()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Replace the active key pair (testing keys are provisioned at runtime)
    pub fn set_credentials(&self, credentials: Credentials) {
        if let Ok(mut slot) = self.credentials.write() {
            *slot = credentials;
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.server, self.api_version, path)
    }

    /// OAuth protocol parameters (including the signature) for one request
    fn sign_request(&self, method: &Method, url: &str, params: &Params, creds: &Credentials) -> Params {
        let mut protocol: Params = vec![
            (oauth_params::CONSUMER_KEY.to_string(), creds.public_key.clone()),
            (oauth_params::NONCE.to_string(), oauth::generate_nonce()),
            (oauth_params::SIGNATURE_METHOD.to_string(), oauth_params::HMAC_SHA1.to_string()),
            (oauth_params::TIMESTAMP.to_string(), chrono::Utc::now().timestamp().to_string()),
            (oauth_params::VERSION.to_string(), "1.0".to_string()),
        ];

        let mut all = params.clone();
        all.extend(protocol.iter().cloned());
        let base = oauth::base_string(method.as_str(), url, &all);
        protocol.push((
            oauth_params::SIGNATURE.to_string(),
            oauth::sign(&base, &creds.private_key),
        ));
        protocol
    }

    /// Perform one form-encoded call and decode the JSON body
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: Params,
        signed: bool,
    ) -> Result<T, ClientError> {
        let url = self.url(path);
        let mut builder = self
            .http
            .request(method.clone(), &url)
            .header(header::ACCEPT, "application/json");

        if signed {
            let creds = self.credentials();
            if !creds.is_configured() {
                return Err(ClientError::Auth("Missing API keys".to_string()));
            }
            let protocol = self.sign_request(&method, &url, &params, &creds);
            builder = builder.header(header::AUTHORIZATION, oauth::authorization_header(&protocol));
        }

        builder = builder
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(oauth::canonical_query(&params));

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Classification service unreachable");
            ClientError::Network(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(url = %url, status = %status, body = %detail, "Classification service error");
            return Err(map_status(status, detail));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Response(format!("Unexpected response body: {}", e)))
    }

    /// Create a site with fresh keys (unsigned; testing service only)
    pub async fn create_site(&self, url: &str, email: &str) -> Result<Credentials, ClientError> {
        let params = vec![
            ("url".to_string(), url.to_string()),
            ("email".to_string(), email.to_string()),
        ];
        let envelope: SiteEnvelope = self.request(Method::POST, "site", params, false).await?;
        let keys = Credentials::new(envelope.site.public_key, envelope.site.private_key);
        if !keys.is_configured() {
            return Err(ClientError::Response("Site created without keys".to_string()));
        }
        Ok(keys)
    }
}

fn map_status(status: StatusCode, detail: String) -> ClientError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Auth(detail),
        s if s.is_client_error() => ClientError::Request(format!("{}: {}", s, detail)),
        s => ClientError::Response(format!("{}: {}", s, detail)),
    }
}

#[async_trait]
impl SpamClient for MollomClient {
    async fn check_content(&self, data: &ContentCheck) -> Result<ClassificationResult, ClientError> {
        let path = match data.id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => format!("content/{}", oauth::encode(id)),
            None => "content".to_string(),
        };
        let envelope: ContentEnvelope = self.request(Method::POST, &path, data.params(), true).await?;

        if envelope.content.id.is_empty() {
            return Err(ClientError::Response("Missing content id".to_string()));
        }

        tracing::debug!(
            content_id = %envelope.content.id,
            classification = ?envelope.content.spam_classification,
            profanity = ?envelope.content.profanity_score,
            "Content checked"
        );
        Ok(envelope.content)
    }

    async fn check_captcha(&self, data: &CaptchaCheck) -> Result<CaptchaResult, ClientError> {
        let path = format!("captcha/{}", oauth::encode(&data.id));
        let envelope: CaptchaEnvelope = self.request(Method::POST, &path, data.params(), true).await?;

        Ok(CaptchaResult {
            id: envelope.captcha.id,
            solved: envelope.captcha.solved,
            reason: envelope.captcha.reason,
        })
    }

    async fn create_captcha(&self, request: &CaptchaRequest) -> Result<CaptchaChallenge, ClientError> {
        let envelope: CaptchaEnvelope = self
            .request(Method::POST, "captcha", request.params(), true)
            .await?;

        let url = envelope
            .captcha
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ClientError::Response("CAPTCHA without url".to_string()))?;

        Ok(CaptchaChallenge {
            id: envelope.captcha.id,
            url,
        })
    }

    async fn send_feedback(&self, feedback: &Feedback) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .request(Method::POST, "feedback", feedback.params(), true)
            .await?;

        tracing::info!(
            content_id = %feedback.content_id,
            reason = feedback.reason.as_str(),
            "Feedback sent"
        );
        Ok(())
    }

    async fn verify_keys(&self) -> Result<(), ClientError> {
        let creds = self.credentials();
        if !creds.is_configured() {
            return Err(ClientError::Auth("Missing API keys".to_string()));
        }

        let params = vec![
            ("platformName".to_string(), "Vigil".to_string()),
            ("platformVersion".to_string(), env!("CARGO_PKG_VERSION").to_string()),
            ("clientName".to_string(), "vigil".to_string()),
            ("clientVersion".to_string(), env!("CARGO_PKG_VERSION").to_string()),
        ];
        let path = format!("site/{}", oauth::encode(&creds.public_key));
        let envelope: SiteEnvelope = self.request(Method::POST, &path, params, true).await?;

        if envelope.site.public_key != creds.public_key {
            return Err(ClientError::Auth("Service returned a different site".to_string()));
        }
        Ok(())
    }

    fn public_key(&self) -> String {
        self.credentials().public_key
    }
}
