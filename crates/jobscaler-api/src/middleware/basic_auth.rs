//! HTTP Basic Auth guarding the read endpoints: `/stats`, `/logs/*`,
//! `/audit`, `/audit/log`, `/cluster-info`. Credentials are checked
//! against `UserStore`, which compares password hashes in constant time.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;

use crate::state::AppState;

const CHALLENGE: &str = r#"Basic realm="jobscaler", charset="UTF-8""#;

pub async fn basic_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some((username, password)) = header_value.and_then(decode_basic_auth) else {
        tracing::debug!("basic auth: missing or malformed Authorization header");
        return unauthorized();
    };

    if !state.users.verify(&username, &password).await {
        tracing::warn!(username = %username, "basic auth: credential check failed");
        return unauthorized();
    }

    next.run(request).await
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, CHALLENGE)],
    )
        .into_response()
}

fn decode_basic_auth(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_well_formed_header() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("admin:password");
        let header = format!("Basic {encoded}");
        let (user, pass) = decode_basic_auth(&header).unwrap();
        assert_eq!(user, "admin");
        assert_eq!(pass, "password");
    }

    #[test]
    fn rejects_non_basic_scheme() {
        assert!(decode_basic_auth("Bearer abc123").is_none());
    }

    #[test]
    fn rejects_malformed_base64() {
        assert!(decode_basic_auth("Basic not-base64!!").is_none());
    }
}
