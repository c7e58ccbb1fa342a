//! Form submission protection.

mod author;
mod report;
mod workflow;

pub use author::{AccountInfo, AuthorContext};
pub use workflow::SubmissionWorkflow;

use serde::{Deserialize, Serialize};
use vigil_common::{CaptchaResult, ClassificationResult, SubmissionSession};

use crate::client::ContentCheck;

/// One submission attempt of a protected form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Submission {
    pub entity_type: String,
    /// Entity specific check parameters (title, body, author fields)
    pub data: ContentCheck,
    /// Hidden form state echoed back by the client
    pub session: SubmissionSession,
    pub author: AuthorContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Accepted,
    Rejected,
}

/// A form error shown to the submitter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    /// `spam`, `unsure`, `profanity` or `captcha`
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_url: Option<String>,
}

/// Result of a submission attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub status: SubmissionStatus,
    /// Data as sent to the service
    pub data: ContentCheck,
    /// Form state to embed in the next attempt
    pub session: SubmissionSession,
    pub errors: Vec<ValidationError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha_check: Option<CaptchaResult>,
}

impl SubmissionOutcome {
    pub fn is_accepted(&self) -> bool {
        self.status == SubmissionStatus::Accepted
    }

    #[cfg(test)]
    pub fn has_error(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }
}
