//! Publish endpoints.
//!
//! `POST /{app}` is the simple-text adapter: any client that can send a
//! plain HTTP body (curl, a shell script, an ntfy-compatible tool) can
//! publish. `POST /api/v1/apps/{app}/publish` takes a full notification.

use std::time::{SystemTime, UNIX_EPOCH};

use {
    axum::{
        Json,
        body::Bytes,
        extract::{Path, State},
        http::{HeaderMap, header},
    },
    courier_channels::validate_app_name,
    courier_common::Notification,
    courier_delivery::PublishReport,
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Headers consulted for a title when the body does not carry one.
const TITLE_HEADERS: [&str; 3] = ["x-title", "title", "t"];

#[derive(Debug, Default, Deserialize)]
struct JsonTextPayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Response of the simple-text adapter.
#[derive(Debug, Serialize)]
pub struct TextPublished {
    pub id: u128,
    pub time: u64,
    pub event: &'static str,
    pub topic: String,
    pub message: String,
}

/// Pull `(message, title)` out of a simple-text publish.
///
/// `application/json` reads `{title, message}`, form bodies read `message`
/// and `title`/`t`, anything else is the message verbatim. A body that fails
/// to parse as its declared type is also taken verbatim. The title falls back
/// to the `X-Title`, `Title` and `t` headers.
pub fn parse_text_payload(headers: &HeaderMap, body: &[u8]) -> (String, Option<String>) {
    let media_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default();
    let raw = || String::from_utf8_lossy(body).into_owned();

    let (message, title) = match media_type.as_str() {
        "application/json" => match serde_json::from_slice::<JsonTextPayload>(body) {
            Ok(payload) => (payload.message.unwrap_or_default(), payload.title),
            Err(_) => (raw(), None),
        },
        "application/x-www-form-urlencoded" => {
            let mut message = None;
            let mut title = None;
            let mut short_title = None;
            for (key, value) in url::form_urlencoded::parse(body) {
                match key.as_ref() {
                    "message" => message = Some(value.into_owned()),
                    "title" => title = Some(value.into_owned()),
                    "t" => short_title = Some(value.into_owned()),
                    _ => {},
                }
            }
            let title = non_empty(title).or_else(|| non_empty(short_title));
            (non_empty(message).unwrap_or_else(raw), title)
        },
        _ => (raw(), None),
    };

    let title = non_empty(title).or_else(|| {
        TITLE_HEADERS.iter().find_map(|name| {
            headers
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .filter(|v| !v.is_empty())
        })
    });
    (message, title)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// `POST /{app}`
pub async fn publish_text(
    State(state): State<AppState>,
    Path(app): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<TextPublished>> {
    validate_app_name(&app)?;

    let (message, title) = parse_text_payload(&headers, &body);
    if message.trim().is_empty() {
        return Err(ApiError::bad_request("message is required"));
    }
    let title = title.filter(|t| *t != app);

    let notification = Notification {
        title,
        message: message.clone(),
        ..Notification::default()
    };
    state.gateway.publisher.publish(&app, &notification).await?;
    debug!(app = %app, chars = message.chars().count(), "text notification published");

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Ok(Json(TextPublished {
        id: now.as_nanos(),
        time: now.as_secs(),
        event: "message",
        topic: app,
        message,
    }))
}

/// `POST /api/v1/apps/{app}/publish`
pub async fn publish_json(
    State(state): State<AppState>,
    Path(app): Path<String>,
    Json(notification): Json<Notification>,
) -> ApiResult<Json<PublishReport>> {
    validate_app_name(&app)?;
    if notification.message.trim().is_empty() {
        return Err(ApiError::bad_request("message is required"));
    }

    let report = state.gateway.publisher.publish(&app, &notification).await?;
    Ok(Json(report))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, axum::http::HeaderValue};

    fn with_type(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn plain_body_is_message() {
        let (message, title) = parse_text_payload(&with_type("text/plain"), b"disk full");
        assert_eq!(message, "disk full");
        assert!(title.is_none());

        let (message, _) = parse_text_payload(&HeaderMap::new(), b"no content type");
        assert_eq!(message, "no content type");
    }

    #[test]
    fn json_body() {
        let (message, title) = parse_text_payload(
            &with_type("application/json; charset=utf-8"),
            br#"{"title":"Backup","message":"done"}"#,
        );
        assert_eq!(message, "done");
        assert_eq!(title.as_deref(), Some("Backup"));

        let (message, title) = parse_text_payload(&with_type("application/json"), b"{oops");
        assert_eq!(message, "{oops");
        assert!(title.is_none());
    }

    #[test]
    fn form_body() {
        let headers = with_type("application/x-www-form-urlencoded");
        let (message, title) = parse_text_payload(&headers, b"message=hello+world&t=Short");
        assert_eq!(message, "hello world");
        assert_eq!(title.as_deref(), Some("Short"));

        let (message, title) = parse_text_payload(&headers, b"title=Long&t=Short&message=x");
        assert_eq!(message, "x");
        assert_eq!(title.as_deref(), Some("Long"));

        let (message, _) = parse_text_payload(&headers, b"other=1");
        assert_eq!(message, "other=1");
    }

    #[test]
    fn title_headers_in_order() {
        let mut headers = with_type("text/plain");
        headers.insert("t", HeaderValue::from_static("third"));
        headers.insert("title", HeaderValue::from_static("second"));
        let (_, title) = parse_text_payload(&headers, b"m");
        assert_eq!(title.as_deref(), Some("second"));

        headers.insert("x-title", HeaderValue::from_static("first"));
        let (_, title) = parse_text_payload(&headers, b"m");
        assert_eq!(title.as_deref(), Some("first"));
    }

    #[test]
    fn body_title_beats_headers() {
        let mut headers = with_type("application/json");
        headers.insert("x-title", HeaderValue::from_static("header"));
        let (_, title) = parse_text_payload(&headers, br#"{"title":"body","message":"m"}"#);
        assert_eq!(title.as_deref(), Some("body"));
    }
}
