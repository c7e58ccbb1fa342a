//! Classification round of a protected form.

use std::sync::Arc;

use vigil_common::constants::PROFANITY_THRESHOLD;
use vigil_common::{
    CaptchaResult, FallbackPolicy, SpamClassification, SubmissionSession, UnsurePolicy, VigilError,
};

use super::report::false_positive_url;
use super::{Submission, SubmissionOutcome, SubmissionStatus, ValidationError};
use crate::client::{CaptchaCheck, CaptchaRequest, ContentCheck, SpamClient};
use crate::config::ProtectionConfig;

const SPAM_MESSAGE: &str = "Your submission has triggered the spam filter and will not be accepted.";
const CAPTCHA_REQUIRED_MESSAGE: &str =
    "To complete this form, please complete the word verification below.";
const CAPTCHA_INCORRECT_MESSAGE: &str = "The word verification was not completed correctly. \
     Please complete this new word verification and try again.";
const PROFANITY_MESSAGE: &str = "Your submission has triggered the profanity filter and will not \
     be accepted until the inappropriate language is removed.";
const UNAVAILABLE_MESSAGE: &str = "The spam filter installed on this site is currently unavailable. \
     Per site policy, we are unable to accept new submissions until that problem is resolved. \
     Please try resubmitting the form in a couple of minutes.";

/// Runs one submission attempt through the classification service
pub struct SubmissionWorkflow {
    client: Arc<dyn SpamClient>,
    protection: ProtectionConfig,
    site_url: String,
}

/// Mutable state of one attempt
struct Attempt {
    data: ContentCheck,
    session: SubmissionSession,
    errors: Vec<ValidationError>,
    /// A CAPTCHA was presented in the previous round
    captcha_pending: bool,
    captcha_issued: bool,
}

impl SubmissionWorkflow {
    pub fn new(client: Arc<dyn SpamClient>, protection: ProtectionConfig, site_url: &str) -> Self {
        Self {
            client,
            protection,
            site_url: site_url.to_string(),
        }
    }

    /// Validate a submission.
    ///
    /// Returns `Err(VigilError::ServiceUnavailable)` only when the service
    /// failed and the fallback policy is `block`.
    pub async fn validate(&self, submission: Submission) -> Result<SubmissionOutcome, VigilError> {
        let Submission {
            entity_type,
            mut data,
            mut session,
            author,
        } = submission;

        if author.is_privileged(&self.protection.bypass_roles) {
            tracing::debug!(entity_type = %entity_type, "Privileged submission, skipping checks");
            return Ok(accepted(data, session));
        }

        data.merge_author(&author.author_params(&self.protection.reverse_proxy_addresses));
        if !session.homepage.is_empty() {
            data.honeypot = Some(session.homepage.clone());
        }

        let captcha_check = match session.captcha_id().map(str::to_string) {
            Some(captcha_id) => {
                data.captcha_id = Some(captcha_id.clone());
                self.check_captcha(&data, captcha_id, session.solution.take()).await
            }
            None => None,
        };
        // Solutions are single use
        session.solution = None;

        if let Some(content_id) = session.content_id() {
            data.id = Some(content_id.to_string());
        }
        if data.unsure.is_none() {
            data.unsure = Some(self.protection.unsure == UnsurePolicy::Captcha);
        }
        if data.checks.is_empty() {
            data.checks = self.protection.checks.clone();
        }

        let checked = self.client.check_content(&data).await;
        let result = match checked {
            Ok(result) if !result.id.is_empty() => result,
            Ok(_) => return self.fallback(&entity_type, "response without content id", data, session),
            Err(e) => return self.fallback(&entity_type, &e.to_string(), data, session),
        };

        tracing::info!(
            entity_type = %entity_type,
            content_id = %result.id,
            classification = ?result.spam_classification,
            profanity = ?result.profanity_score,
            "Content classified"
        );

        session.content_id = Some(result.id.clone());
        data.id = Some(result.id.clone());

        let mut attempt = Attempt {
            captcha_pending: data.captcha_id.is_some(),
            data,
            session,
            errors: Vec::new(),
            captcha_issued: false,
        };

        match result.spam_classification {
            Some(SpamClassification::Spam) => {
                let link = self.report_link(&attempt);
                attempt.reject("spam", SPAM_MESSAGE, link);
            }
            Some(SpamClassification::Unsure) => {
                if attempt.captcha_pending {
                    let link = self.report_link(&attempt);
                    attempt.reject("unsure", CAPTCHA_INCORRECT_MESSAGE, link);
                } else {
                    attempt.reject("unsure", CAPTCHA_REQUIRED_MESSAGE, None);
                }
                self.issue_captcha(&mut attempt).await;
            }
            Some(SpamClassification::Ham) => {
                attempt.session.captcha_id = None;
                attempt.session.captcha_url = None;
            }
            None => {}
        }

        if result.is_profane() {
            let link = self.report_link(&attempt);
            attempt.reject("profanity", PROFANITY_MESSAGE, link);
        }

        // An unanswered CAPTCHA check counts as unsolved
        if self.protection.enforce_captcha_solution
            && attempt.captcha_pending
            && captcha_check.as_ref().is_none_or(|check| !check.solved)
            && !attempt.captcha_issued
        {
            let link = self.report_link(&attempt);
            attempt.reject("captcha", CAPTCHA_INCORRECT_MESSAGE, link);
            self.issue_captcha(&mut attempt).await;
        }

        let status = if attempt.errors.is_empty() {
            SubmissionStatus::Accepted
        } else {
            SubmissionStatus::Rejected
        };

        Ok(SubmissionOutcome {
            status,
            data: attempt.data,
            session: attempt.session,
            errors: attempt.errors,
            classification: Some(result),
            captcha_check,
        })
    }

    async fn check_captcha(
        &self,
        data: &ContentCheck,
        captcha_id: String,
        solution: Option<String>,
    ) -> Option<CaptchaResult> {
        let check = CaptchaCheck {
            id: captcha_id,
            solution: solution.unwrap_or_default(),
            author: data.author.clone(),
            honeypot: data.honeypot.clone(),
        };
        match self.client.check_captcha(&check).await {
            Ok(result) => {
                tracing::debug!(captcha_id = %check.id, solved = result.solved, "CAPTCHA checked");
                Some(result)
            }
            Err(e) => {
                tracing::warn!(captcha_id = %check.id, error = %e, "CAPTCHA check failed");
                None
            }
        }
    }

    async fn issue_captcha(&self, attempt: &mut Attempt) {
        let Some(content_id) = attempt.session.content_id.clone() else {
            return;
        };
        attempt.captcha_issued = true;

        match self.client.create_captcha(&CaptchaRequest::image(&content_id)).await {
            Ok(captcha) => {
                attempt.session.captcha_id = Some(captcha.id);
                attempt.session.captcha_url = Some(captcha.url);
            }
            Err(e) => {
                tracing::warn!(content_id = %content_id, error = %e, "Failed to create CAPTCHA");
                attempt.session.captcha_id = None;
                attempt.session.captcha_url = None;
            }
        }
    }

    fn report_link(&self, attempt: &Attempt) -> Option<String> {
        Some(false_positive_url(
            &self.protection.report_url,
            &self.client.public_key(),
            attempt.session.content_id.as_deref(),
            &attempt.data,
            &self.site_url,
        ))
    }

    fn fallback(
        &self,
        entity_type: &str,
        reason: &str,
        data: ContentCheck,
        session: SubmissionSession,
    ) -> Result<SubmissionOutcome, VigilError> {
        match self.protection.fallback {
            FallbackPolicy::Accept => {
                tracing::warn!(entity_type, reason, "Spam filter unavailable, accepting submission");
                Ok(accepted(data, session))
            }
            FallbackPolicy::Block => {
                tracing::error!(entity_type, reason, "Spam filter unavailable, blocking submission");
                Err(VigilError::ServiceUnavailable(UNAVAILABLE_MESSAGE.to_string()))
            }
        }
    }
}

impl Attempt {
    fn reject(&mut self, code: &str, message: &str, report_url: Option<String>) {
        self.errors.push(ValidationError {
            code: code.to_string(),
            message: message.to_string(),
            report_url,
        });
    }
}

fn accepted(data: ContentCheck, session: SubmissionSession) -> SubmissionOutcome {
    SubmissionOutcome {
        status: SubmissionStatus::Accepted,
        data,
        session,
        errors: Vec::new(),
        classification: None,
        captcha_check: None,
    }
}
