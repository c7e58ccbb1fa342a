//! Scripted `SpamClient` for workflow tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use vigil_common::{
    CaptchaChallenge, CaptchaResult, ClassificationResult, ClientError, SpamClassification,
};

use super::{CaptchaCheck, CaptchaRequest, ContentCheck, Feedback, SpamClient};

/// Answers content checks from a queue and records every call
#[derive(Default)]
pub struct ScriptedClient {
    pub content_replies: Mutex<VecDeque<Result<ClassificationResult, ClientError>>>,
    pub captcha_reply: Mutex<Option<Result<CaptchaResult, ClientError>>>,
    pub content_calls: Mutex<Vec<ContentCheck>>,
    pub captcha_checks: Mutex<Vec<CaptchaCheck>>,
    pub captcha_requests: Mutex<Vec<CaptchaRequest>>,
    pub feedback: Mutex<Vec<Feedback>>,
    pub keys_reply: Mutex<Option<ClientError>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, result: Result<ClassificationResult, ClientError>) -> Self {
        self.content_replies.lock().unwrap().push_back(result);
        self
    }

    pub fn classify(self, id: &str, class: SpamClassification, profanity: Option<f64>) -> Self {
        self.reply(Ok(ClassificationResult {
            id: id.to_string(),
            spam_classification: Some(class),
            spam_score: None,
            profanity_score: profanity,
            reason: None,
        }))
    }

    pub fn captcha_solved(self, solved: bool) -> Self {
        *self.captcha_reply.lock().unwrap() = Some(Ok(CaptchaResult {
            id: "cap-old".to_string(),
            solved,
            reason: None,
        }));
        self
    }

    pub fn content_calls(&self) -> Vec<ContentCheck> {
        self.content_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpamClient for ScriptedClient {
    async fn check_content(&self, data: &ContentCheck) -> Result<ClassificationResult, ClientError> {
        self.content_calls.lock().unwrap().push(data.clone());
        self.content_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Network("no scripted reply".to_string())))
    }

    async fn check_captcha(&self, data: &CaptchaCheck) -> Result<CaptchaResult, ClientError> {
        self.captcha_checks.lock().unwrap().push(data.clone());
        self.captcha_reply
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(ClientError::Network("no scripted reply".to_string())))
    }

    async fn create_captcha(&self, request: &CaptchaRequest) -> Result<CaptchaChallenge, ClientError> {
        let mut requests = self.captcha_requests.lock().unwrap();
        requests.push(request.clone());
        let n = requests.len();
        Ok(CaptchaChallenge {
            id: format!("cap-{}", n),
            url: format!("https://captcha.example.com/cap-{}.png", n),
        })
    }

    async fn send_feedback(&self, feedback: &Feedback) -> Result<(), ClientError> {
        self.feedback.lock().unwrap().push(feedback.clone());
        Ok(())
    }

    async fn verify_keys(&self) -> Result<(), ClientError> {
        match self.keys_reply.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn public_key(&self) -> String {
        "site-pub".to_string()
    }
}
