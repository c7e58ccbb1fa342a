//! OAuth signature verification for inbound webhook requests.

use std::collections::BTreeMap;
use std::sync::Arc;

use vigil_common::constants::REPLAY_WINDOW_SECS;
use vigil_common::constants::oauth::{CONSUMER_KEY, NONCE, SIGNATURE, SIGNATURE_METHOD, TIMESTAMP};
use vigil_common::{AuthFailure, Credentials};

use crate::oauth::{self, Params};
use crate::store::NonceCache;

/// The parts of an HTTP request that take part in authentication
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub method: String,
    /// Absolute URL: site URL plus the request URI (path and query)
    pub url: String,
    /// Query string and form body parameters
    pub params: Params,
    /// Raw `Authorization` header
    pub authorization: Option<String>,
}

/// Verifies that webhook requests are signed with the site's key pair and
/// are not replays.
pub struct RequestAuthenticator {
    credentials: Credentials,
    nonce_cache: Arc<dyn NonceCache>,
}

impl RequestAuthenticator {
    pub fn new(credentials: Credentials, nonce_cache: Arc<dyn NonceCache>) -> Self {
        Self {
            credentials,
            nonce_cache,
        }
    }

    /// Returns true if the request is authentic
    pub async fn verify(&self, request: &InboundRequest, now: i64) -> bool {
        self.authenticate(request, now).await.is_ok()
    }

    /// Like `verify`, but tells why a request was rejected.
    ///
    /// A well-formed request with an unseen nonce registers that nonce
    /// before its signature is checked, so even a forged request burns
    /// the nonce it carries.
    pub async fn authenticate(&self, request: &InboundRequest, now: i64) -> Result<(), AuthFailure> {
        let creds = &self.credentials;
        if !creds.is_configured() {
            tracing::warn!("Missing module configuration");
            return Err(AuthFailure::MissingCredentials);
        }

        let mut header: BTreeMap<String, String> = request
            .authorization
            .as_deref()
            .and_then(oauth::parse_authorization)
            .unwrap_or_default();

        let required = [CONSUMER_KEY, NONCE, TIMESTAMP, SIGNATURE_METHOD, SIGNATURE];
        if required.iter().any(|key| !header.contains_key(*key)) {
            tracing::warn!(
                method = %request.method,
                url = %request.url,
                headers = ?header,
                "Missing protocol parameters"
            );
            return Err(AuthFailure::MissingParameters);
        }

        let sent_signature = header.remove(SIGNATURE).unwrap_or_default();

        if header[CONSUMER_KEY] != creds.public_key {
            tracing::warn!(
                method = %request.method,
                url = %request.url,
                headers = ?header,
                public_key = %creds.public_key,
                "Invalid public/consumer key"
            );
            return Err(AuthFailure::ConsumerKeyMismatch);
        }

        let raw_timestamp = header[TIMESTAMP].trim().to_string();
        let Ok(timestamp) = raw_timestamp.parse::<i64>() else {
            tracing::warn!(
                method = %request.method,
                url = %request.url,
                headers = ?header,
                "Unparseable authentication timestamp"
            );
            return Err(AuthFailure::InvalidTimestamp(raw_timestamp));
        };

        // Only stale timestamps are rejected; future ones pass this gate.
        if timestamp <= now - REPLAY_WINDOW_SECS {
            let age_secs = now.saturating_sub(timestamp);
            tracing::warn!(
                method = %request.method,
                url = %request.url,
                headers = ?header,
                time_difference = %format!("-{}s", age_secs),
                "Outdated authentication timestamp"
            );
            return Err(AuthFailure::ExpiredTimestamp { age_secs });
        }

        let nonce = header[NONCE].clone();
        if nonce.is_empty() {
            tracing::warn!(
                method = %request.method,
                url = %request.url,
                headers = ?header,
                "Missing authentication nonce"
            );
            return Err(AuthFailure::EmptyNonce);
        }

        match self.nonce_cache.has(&nonce).await {
            Ok(false) => {}
            Ok(true) => {
                tracing::warn!(
                    method = %request.method,
                    url = %request.url,
                    headers = ?header,
                    "Replay attack"
                );
                return Err(AuthFailure::Replay);
            }
            Err(e) => return Err(nonce_store_failure(e)),
        }

        if let Err(e) = self.nonce_cache.prune_older_than(now - REPLAY_WINDOW_SECS).await {
            tracing::warn!(error = %e, "Failed to prune webhook nonces");
        }

        match self.nonce_cache.remember(&nonce, now).await {
            Ok(true) => {}
            Ok(false) => {
                // Lost the race against a concurrent delivery of the same nonce
                tracing::warn!(
                    method = %request.method,
                    url = %request.url,
                    headers = ?header,
                    "Replay attack"
                );
                return Err(AuthFailure::Replay);
            }
            Err(e) => return Err(nonce_store_failure(e)),
        }

        let params = signed_params(&request.params, &header);
        let base = oauth::base_string(&request.method, &request.url, &params);

        if !oauth::verify(&base, &creds.private_key, &sent_signature) {
            let expected = oauth::encode(&oauth::sign(&base, &creds.private_key));
            tracing::warn!(
                method = %request.method,
                url = %request.url,
                headers = ?header,
                signature = %oauth::encode(&sent_signature),
                base_string = %base,
                expected_signature = %expected,
                "Invalid authentication signature"
            );
            return Err(AuthFailure::SignatureMismatch);
        }

        tracing::debug!(nonce = %nonce, "Webhook request authenticated");
        Ok(())
    }
}

/// Request parameters plus protocol parameters. A request parameter shadows
/// a protocol parameter of the same name.
fn signed_params(request: &Params, header: &BTreeMap<String, String>) -> Params {
    let mut params = request.clone();
    for (key, value) in header {
        if !request.iter().any(|(k, _)| k == key) {
            params.push((key.clone(), value.clone()));
        }
    }
    params
}

fn nonce_store_failure(e: anyhow::Error) -> AuthFailure {
    tracing::error!(error = %e, "Nonce cache unavailable");
    AuthFailure::NonceStore(e.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::MemoryNonceCache;
    use vigil_common::constants::oauth::HMAC_SHA1;

    pub const NOW: i64 = 1_700_000_000;
    pub const URL: &str = "https://blog.example.com/mollom/moderate/c-1/spam";

    pub fn creds() -> Credentials {
        Credentials::new("site-pub", "site-priv")
    }

    /// A request signed the way the remote service signs its callbacks
    pub fn signed_request(
        creds: &Credentials,
        url: &str,
        nonce: &str,
        timestamp: i64,
        params: Params,
    ) -> InboundRequest {
        let mut protocol: Params = vec![
            (CONSUMER_KEY.to_string(), creds.public_key.clone()),
            (NONCE.to_string(), nonce.to_string()),
            (TIMESTAMP.to_string(), timestamp.to_string()),
            (SIGNATURE_METHOD.to_string(), HMAC_SHA1.to_string()),
        ];
        let header: BTreeMap<String, String> = protocol.iter().cloned().collect();
        let base = oauth::base_string("POST", url, &signed_params(&params, &header));
        protocol.push((SIGNATURE.to_string(), oauth::sign(&base, &creds.private_key)));

        InboundRequest {
            method: "POST".to_string(),
            url: url.to_string(),
            params,
            authorization: Some(oauth::authorization_header(&protocol)),
        }
    }

    fn authenticator() -> (RequestAuthenticator, Arc<MemoryNonceCache>) {
        let cache = Arc::new(MemoryNonceCache::new());
        (RequestAuthenticator::new(creds(), cache.clone()), cache)
    }

    #[tokio::test]
    async fn test_valid_signature_accepted() {
        let (auth, cache) = authenticator();
        let request = signed_request(
            &creds(),
            URL,
            "n-1",
            NOW,
            vec![("extra".to_string(), "a b".to_string())],
        );

        assert!(auth.verify(&request, NOW).await);
        assert!(cache.has("n-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_unconfigured_site_rejects() {
        let cache = Arc::new(MemoryNonceCache::new());
        let auth = RequestAuthenticator::new(Credentials::new("site-pub", ""), cache);
        let request = signed_request(&creds(), URL, "n-1", NOW, vec![]);

        assert_eq!(
            auth.authenticate(&request, NOW).await,
            Err(AuthFailure::MissingCredentials)
        );
    }

    #[tokio::test]
    async fn test_missing_header_or_parameters() {
        let (auth, _) = authenticator();
        let mut request = signed_request(&creds(), URL, "n-1", NOW, vec![]);

        request.authorization = None;
        assert_eq!(auth.authenticate(&request, NOW).await, Err(AuthFailure::MissingParameters));

        request.authorization = Some(r#"OAuth oauth_consumer_key="site-pub", oauth_nonce="n""#.to_string());
        assert_eq!(auth.authenticate(&request, NOW).await, Err(AuthFailure::MissingParameters));
    }

    #[tokio::test]
    async fn test_wrong_consumer_key_rejected_before_nonce() {
        let (auth, cache) = authenticator();
        let other = Credentials::new("other-pub", "site-priv");
        let request = signed_request(&other, URL, "n-1", NOW, vec![]);

        assert_eq!(auth.authenticate(&request, NOW).await, Err(AuthFailure::ConsumerKeyMismatch));
        assert!(!cache.has("n-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_timestamp_rejected_even_if_signed() {
        let (auth, _) = authenticator();

        let request = signed_request(&creds(), URL, "n-1", NOW - REPLAY_WINDOW_SECS, vec![]);
        assert_eq!(
            auth.authenticate(&request, NOW).await,
            Err(AuthFailure::ExpiredTimestamp { age_secs: 900 })
        );

        // One second inside the window is fine
        let request = signed_request(&creds(), URL, "n-2", NOW - REPLAY_WINDOW_SECS + 1, vec![]);
        assert!(auth.verify(&request, NOW).await);
    }

    #[tokio::test]
    async fn test_future_timestamp_not_rejected() {
        let (auth, _) = authenticator();
        let request = signed_request(&creds(), URL, "n-1", NOW + 10 * REPLAY_WINDOW_SECS, vec![]);
        assert!(auth.verify(&request, NOW).await);
    }

    #[tokio::test]
    async fn test_garbage_timestamp_rejected() {
        let (auth, _) = authenticator();
        let mut request = signed_request(&creds(), URL, "n-1", NOW, vec![]);
        let header = request.authorization.take().unwrap();
        request.authorization = Some(header.replace(&format!("\"{}\"", NOW), "\"soon\""));

        assert_eq!(
            auth.authenticate(&request, NOW).await,
            Err(AuthFailure::InvalidTimestamp("soon".to_string()))
        );
    }

    #[tokio::test]
    async fn test_empty_nonce_rejected() {
        let (auth, _) = authenticator();
        let request = signed_request(&creds(), URL, "", NOW, vec![]);
        assert_eq!(auth.authenticate(&request, NOW).await, Err(AuthFailure::EmptyNonce));
    }

    #[tokio::test]
    async fn test_replayed_nonce_rejected() {
        let (auth, _) = authenticator();
        let request = signed_request(&creds(), URL, "n-1", NOW, vec![]);

        assert!(auth.verify(&request, NOW).await);
        assert_eq!(auth.authenticate(&request, NOW + 5).await, Err(AuthFailure::Replay));
    }

    #[tokio::test]
    async fn test_forged_signature_burns_nonce() {
        let (auth, cache) = authenticator();
        let forged = Credentials::new("site-pub", "guessed");
        let request = signed_request(&forged, URL, "n-1", NOW, vec![]);

        assert_eq!(auth.authenticate(&request, NOW).await, Err(AuthFailure::SignatureMismatch));
        assert!(cache.has("n-1").await.unwrap());

        // The correctly signed message with the same nonce is now a replay
        let genuine = signed_request(&creds(), URL, "n-1", NOW, vec![]);
        assert_eq!(auth.authenticate(&genuine, NOW).await, Err(AuthFailure::Replay));
    }

    #[tokio::test]
    async fn test_tampered_params_or_url_rejected() {
        let (auth, _) = authenticator();

        let mut request = signed_request(&creds(), URL, "n-1", NOW, vec![("a".into(), "1".into())]);
        request.params = vec![("a".to_string(), "2".to_string())];
        assert_eq!(auth.authenticate(&request, NOW).await, Err(AuthFailure::SignatureMismatch));

        let mut request = signed_request(&creds(), URL, "n-2", NOW, vec![]);
        request.url = URL.replace("spam", "approve");
        assert_eq!(auth.authenticate(&request, NOW).await, Err(AuthFailure::SignatureMismatch));
    }

    #[tokio::test]
    async fn test_stale_nonces_get_pruned() {
        let (auth, cache) = authenticator();
        cache.remember("ancient", NOW - 2 * REPLAY_WINDOW_SECS).await.unwrap();

        let request = signed_request(&creds(), URL, "n-1", NOW, vec![]);
        assert!(auth.verify(&request, NOW).await);
        assert!(!cache.has("ancient").await.unwrap());
    }

    #[tokio::test]
    async fn test_extreme_timestamp_is_expired() {
        let (auth, _) = authenticator();
        let request = signed_request(&creds(), URL, "n-1", i64::MIN, vec![]);

        assert_eq!(
            auth.authenticate(&request, NOW).await,
            Err(AuthFailure::ExpiredTimestamp { age_secs: i64::MAX })
        );
    }

    #[test]
    fn test_request_params_shadow_protocol_params() {
        let header: BTreeMap<String, String> = [
            (NONCE.to_string(), "from-header".to_string()),
            (TIMESTAMP.to_string(), "1".to_string()),
        ]
        .into_iter()
        .collect();
        let request = vec![
            (NONCE.to_string(), "from-query".to_string()),
            ("a".to_string(), "1".to_string()),
        ];

        assert_eq!(
            signed_params(&request, &header),
            vec![
                (NONCE.to_string(), "from-query".to_string()),
                ("a".to_string(), "1".to_string()),
                (TIMESTAMP.to_string(), "1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_parameter_repeating_protocol_key_signed_once() {
        let (auth, _) = authenticator();
        let request = signed_request(
            &creds(),
            URL,
            "n-1",
            NOW,
            vec![(NONCE.to_string(), "n-1".to_string())],
        );

        assert_eq!(auth.authenticate(&request, NOW).await, Ok(()));
    }
}
