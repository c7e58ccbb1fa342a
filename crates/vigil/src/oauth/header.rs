//! `Authorization: OAuth ...` header encoding and parsing.

use std::collections::BTreeMap;

use super::encode;

/// Formats protocol parameters as an `OAuth` authorization header value
pub fn authorization_header(params: &[(String, String)]) -> String {
    let fields = params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {}", fields)
}

/// Parses an `OAuth` authorization header into decoded protocol parameters.
///
/// Returns `None` if the header does not use the OAuth scheme. `realm` is
/// dropped since it never takes part in the signature.
pub fn parse_authorization(value: &str) -> Option<BTreeMap<String, String>> {
    let value = value.trim();
    let (scheme, rest) = value.split_once(' ').unwrap_or((value, ""));
    if !scheme.eq_ignore_ascii_case("OAuth") {
        return None;
    }

    let mut params = BTreeMap::new();
    for field in rest.split(',') {
        let Some((key, raw)) = field.trim().split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() || key == "realm" {
            continue;
        }
        let raw = raw.trim().trim_matches('"');
        let decoded = urlencoding::decode(raw)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| raw.to_string());
        params.insert(key.to_string(), decoded);
    }

    Some(params)
}
