//! Shared constants for Vigil components.

/// Default Redis connection URL
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default Vigil HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8890";

/// Replay window for inbound webhook nonces and timestamps (15 minutes)
pub const REPLAY_WINDOW_SECS: i64 = 900;

/// Profanity score at or above which a submission is rejected
pub const PROFANITY_THRESHOLD: f64 = 0.5;

/// Production classification service
pub const PRODUCTION_SERVER: &str = "https://rest.mollom.com";

/// Development classification service (testing mode)
pub const TESTING_SERVER: &str = "http://dev.mollom.com";

/// REST API version segment
pub const API_VERSION: &str = "v1";

/// Remote request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 3;

/// False-positive report form
pub const DEFAULT_REPORT_URL: &str = "https://mollom.com/false-positive";

/// Redis key prefixes
pub mod redis_keys {
    /// Content mapping by remote id: content:{content_id}
    pub const CONTENT_PREFIX: &str = "vigil:content:";

    /// Reverse mapping by local entity: entity:{entity_type}:{entity_id}
    pub const ENTITY_PREFIX: &str = "vigil:entity:";

    /// Seen webhook nonce: nonce:{nonce}
    pub const NONCE_PREFIX: &str = "vigil:nonce:";
}

/// OAuth 1.0a protocol parameter names
pub mod oauth {
    pub const CONSUMER_KEY: &str = "oauth_consumer_key";
    pub const NONCE: &str = "oauth_nonce";
    pub const TIMESTAMP: &str = "oauth_timestamp";
    pub const SIGNATURE_METHOD: &str = "oauth_signature_method";
    pub const SIGNATURE: &str = "oauth_signature";
    pub const VERSION: &str = "oauth_version";

    /// The only signature method we produce or accept
    pub const HMAC_SHA1: &str = "HMAC-SHA1";
}
