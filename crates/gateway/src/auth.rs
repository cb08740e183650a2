//! API-key authentication for every route except `/health`.

use {
    axum::{
        extract::{Request, State},
        http::{HeaderMap, HeaderValue, header},
        middleware::Next,
        response::{IntoResponse, Response},
    },
    base64::{Engine, engine::general_purpose::STANDARD},
    secrecy::ExposeSecret,
};

use crate::{error::ApiError, state::AppState};

/// Accepts `Authorization: Bearer <key>` or HTTP Basic with the key as the
/// password (any username).
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let expected = state.gateway.api_key.expose_secret();
    match presented_key(request.headers()) {
        Some(key) if constant_time_eq(&key, expected) => next.run(request).await,
        _ => {
            let mut response = ApiError::Unauthorized.into_response();
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(r#"Basic realm="courier""#),
            );
            response
        },
    }
}

/// The key carried by the `Authorization` header, if any.
pub fn presented_key(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;

    if let Some(token) = value.strip_prefix("Bearer ") {
        return Some(token.trim().to_string());
    }

    let payload = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(payload.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (_, password) = decoded.split_once(':')?;
    Some(password.to_string())
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_and_basic() {
        assert_eq!(presented_key(&headers("Bearer s3cret")).as_deref(), Some("s3cret"));

        let basic = format!("Basic {}", STANDARD.encode("admin:s3cret"));
        assert_eq!(presented_key(&headers(&basic)).as_deref(), Some("s3cret"));

        let no_colon = format!("Basic {}", STANDARD.encode("s3cret"));
        assert!(presented_key(&headers(&no_colon)).is_none());
        assert!(presented_key(&headers("Token s3cret")).is_none());
        assert!(presented_key(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(!constant_time_eq("", "a"));
    }
}
