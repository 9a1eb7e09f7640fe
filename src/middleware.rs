use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body::{LengthLimitError, Limited};
use serde_json::Value;
use thiserror::Error;

use crate::{
    auth::{resolve_identity, Identity},
    error::ApiError,
    AppState,
};

/// Decoded JSON body of an API request.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload(pub Value);

#[derive(Debug, Error)]
#[error("malformed request body: {0}")]
pub struct MalformedBody(#[from] serde_json::Error);

impl From<MalformedBody> for ApiError {
    fn from(_: MalformedBody) -> Self {
        Self::MalformedBody
    }
}

/// An empty body carries no payload; anything else must be JSON.
pub fn decode_body(bytes: &[u8]) -> Result<Option<Payload>, MalformedBody> {
    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(Payload(serde_json::from_slice(bytes)?)))
}

/// Runs before every API handler: resolve the caller, decode the body, and
/// turn away oversized, malformed or anonymous requests. Bodies are read up
/// to `max_body_bytes` and no further. Handlers behind it can rely on
/// a `CurrentUser` extension and an optional `Payload` extension.
pub async fn api_gateway(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next<Body>,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let identity = match resolve_identity(&state.db, &parts.headers, &state.session_cookie).await
    {
        Ok(identity) => identity,
        Err(err) => return ApiError::from(err).into_response(),
    };

    let bytes = match hyper::body::to_bytes(Limited::new(body, state.max_body_bytes)).await {
        Ok(bytes) => bytes,
        Err(err) if err.is::<LengthLimitError>() => {
            tracing::debug!(limit = state.max_body_bytes, uri = %parts.uri, "request body too large");
            return ApiError::PayloadTooLarge.into_response();
        }
        Err(err) => {
            tracing::debug!(error = %err, "failed to read request body");
            return ApiError::MalformedBody.into_response();
        }
    };
    let payload = match decode_body(&bytes) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::debug!(error = %err, method = %parts.method, uri = %parts.uri, "rejecting request");
            return ApiError::from(err).into_response();
        }
    };

    let Identity::User(user) = identity else {
        tracing::debug!(method = %parts.method, uri = %parts.uri, "rejecting anonymous request");
        return ApiError::Unauthorized.into_response();
    };

    tracing::debug!(user = %user.username, method = %parts.method, uri = %parts.uri, "api request");
    if let Some(payload) = payload {
        parts.extensions.insert(payload);
    }
    parts.extensions.insert(user);

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
