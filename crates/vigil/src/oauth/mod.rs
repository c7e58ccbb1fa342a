//! OAuth 1.0a request signing (HMAC-SHA1).
//!
//! Used in both directions: outbound calls to the classification service
//! are signed with the site's keys, and inbound moderation webhooks are
//! verified against the same scheme.
//!
//! ```text
//! base   = METHOD & enc(url) & enc(sorted "k=v" pairs joined by '&')
//! key    = enc(private_key) & ""
//! sig    = base64(hmac_sha1(key, base))
//! ```

mod header;

pub use header::{authorization_header, parse_authorization};

use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Ordered request parameters. Keys may repeat (list values).
pub type Params = Vec<(String, String)>;

/// RFC 3986 percent-encoding (only `A-Za-z0-9-._~` pass through)
pub fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Encodes every pair, sorts by key then value, and joins them as a query string
pub fn canonical_query(params: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    pairs.sort();

    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Parses a query string or form body into pairs, keeping repeated keys
pub fn parse_query(query: &str) -> Params {
    fn decode(raw: &str) -> String {
        let raw = raw.replace('+', " ");
        match urlencoding::decode(&raw) {
            Ok(value) => value.into_owned(),
            Err(_) => raw,
        }
    }

    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode(k), decode(v)),
            None => (decode(pair), String::new()),
        })
        .collect()
}

/// Builds the signature base string
pub fn base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    [
        method.to_ascii_uppercase(),
        encode(url),
        encode(&canonical_query(params)),
    ]
    .join("&")
}

/// Signing key: the encoded private key plus an empty token secret
fn signing_key(private_key: &str) -> String {
    format!("{}&", encode(private_key))
}

fn mac(base_string: &str, private_key: &str) -> HmacSha1 {
    let mut mac = HmacSha1::new_from_slice(signing_key(private_key).as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(base_string.as_bytes());
    mac
}

/// Base64 HMAC-SHA1 signature of a base string
pub fn sign(base_string: &str, private_key: &str) -> String {
    STANDARD.encode(mac(base_string, private_key).finalize().into_bytes())
}

/// Constant-time check of a base64 signature against a base string
pub fn verify(base_string: &str, private_key: &str, signature: &str) -> bool {
    let Ok(sent) = STANDARD.decode(signature) else {
        return false;
    };
    mac(base_string, private_key).verify_slice(&sent).is_ok()
}

/// Random nonce for outbound requests
pub fn generate_nonce() -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use rand::Rng;

    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
