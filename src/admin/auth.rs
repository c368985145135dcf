use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::admin::AdminState;

/// Reject requests without `Authorization: Bearer <api_key>`.
pub async fn admin_auth_middleware(
    State(state): State<AdminState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(token) if !state.api_key.is_empty() && constant_time_eq(token, &state.api_key) => {
            Ok(next.run(request).await)
        }
        _ => {
            tracing::warn!(path = %request.uri().path(), "Unauthorized admin request");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Compare a presented token against the expected key.
///
/// Runs over every byte of `presented` whatever the expected length, so the
/// timing depends only on what the caller sent.
fn constant_time_eq(presented: &str, expected: &str) -> bool {
    let expected = expected.as_bytes();
    if expected.is_empty() {
        return false;
    }

    let mut diff = u8::from(presented.len() != expected.len());
    for (i, byte) in presented.bytes().enumerate() {
        diff |= byte ^ expected[i % expected.len()];
    }
    diff == 0
}
