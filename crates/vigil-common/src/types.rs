//! Core types shared across Vigil components.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::PROFANITY_THRESHOLD;
use crate::error::ModerationError;

/// Spam verdict returned by the classification service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpamClassification {
    /// Clean content
    Ham,
    /// Ambiguous; a CAPTCHA decides
    Unsure,
    /// Spam; discard
    Spam,
}

/// Result of one content check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    /// Content identifier issued by the service
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spam_classification: Option<SpamClassification>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spam_score: Option<f64>,

    /// Profanity score in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profanity_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ClassificationResult {
    /// Returns true if the profanity score crosses the rejection threshold
    pub fn is_profane(&self) -> bool {
        self.profanity_score
            .is_some_and(|score| score >= PROFANITY_THRESHOLD)
    }
}

/// A CAPTCHA issued by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptchaChallenge {
    pub id: String,
    pub url: String,
}

/// Outcome of a CAPTCHA solution check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptchaResult {
    pub id: String,
    pub solved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Maps a remote content identifier to a local entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMapping {
    /// Local entity type (e.g. "comment", "user")
    pub entity_type: String,

    /// Local entity id
    pub entity_id: i64,

    /// Remote content identifier
    pub content_id: String,

    /// Creation timestamp (Unix epoch seconds)
    pub created_at: i64,
}

/// A webhook nonce seen at a given time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceRecord {
    pub nonce: String,
    pub seen_at: i64,
}

/// API key pair for one environment
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub private_key: String,
}

impl Credentials {
    pub fn new(public_key: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: private_key.into(),
        }
    }

    /// Both keys are present
    pub fn is_configured(&self) -> bool {
        !self.public_key.is_empty() && !self.private_key.is_empty()
    }
}

// Keeps the private key out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Actions the service may request through the moderation webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    Approve,
    Spam,
    Delete,
}

impl ModerationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Spam => "spam",
            Self::Delete => "delete",
        }
    }
}

impl FromStr for ModerationAction {
    type Err = ModerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "spam" => Ok(Self::Spam),
            "delete" => Ok(Self::Delete),
            other => Err(ModerationError::UnsupportedAction(other.to_string())),
        }
    }
}

impl fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feedback reasons accepted by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackReason {
    Approve,
    Spam,
}

impl FeedbackReason {
    /// Maps a local status change to a feedback reason, if it warrants one
    pub fn from_status(status: &str) -> Option<Self> {
        match status {
            "approve" => Some(Self::Approve),
            "spam" => Some(Self::Spam),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Spam => "spam",
        }
    }
}

/// Hidden form state carried across submission round trips
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionSession {
    /// Content identifier assigned by the service; echoed on every attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,

    /// Pending CAPTCHA, if one was presented
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha_url: Option<String>,

    /// Honeypot decoy field; legitimate users leave it empty
    pub homepage: String,

    /// CAPTCHA solution typed by the user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
}

impl SubmissionSession {
    /// Non-empty content identifier, if any
    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Non-empty pending CAPTCHA id, if any
    pub fn captcha_id(&self) -> Option<&str> {
        self.captcha_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// What to do with unsure verdicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsurePolicy {
    /// Challenge with a CAPTCHA
    #[default]
    Captcha,
    /// Accept the post
    #[serde(alias = "binary")]
    Accept,
}

/// What to do when the service is unreachable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    #[default]
    Accept,
    Block,
}
