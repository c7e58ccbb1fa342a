//! Inbound moderation webhook.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode, Uri, header},
};

use crate::moderation::InboundRequest;
use crate::oauth::{self, Params};
use crate::state::AppState;

/// `/mollom/moderate/{content_id}/{action}`
///
/// Answers `1` or `0` depending on whether the action was applied. Gate
/// failures keep their status code and answer `0`.
pub async fn moderate(
    State(state): State<AppState>,
    Path((content_id, action)): Path<(String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, &'static str) {
    let request = inbound_request(&state.config.site_url, &method, &uri, &headers, &body);

    match state
        .dispatcher
        .handle(&content_id, &action, &request, AppState::now())
        .await
    {
        Ok(true) => (StatusCode::OK, "1"),
        Ok(false) => (StatusCode::OK, "0"),
        Err(e) => {
            let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
            (status, "0")
        }
    }
}

fn inbound_request(
    site_url: &str,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &str,
) -> InboundRequest {
    let mut params: Params = oauth::parse_query(uri.query().unwrap_or_default());

    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));
    if is_form {
        params.extend(oauth::parse_query(body));
    }

    let request_uri = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    InboundRequest {
        method: method.as_str().to_string(),
        url: format!("{}{}", site_url.trim_end_matches('/'), request_uri),
        params,
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}
