//! Link and unlink endpoints for the account-backed channels.

use {
    axum::{Json, extract::State},
    courier_signal::{LinkState, SignalIntegration, SignalStatus},
    courier_telegram::TelegramIntegration,
    secrecy::Secret,
    serde::{Deserialize, Serialize},
    serde_json::{Value, json},
};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Chat ids arrive as JSON numbers or as strings copied from a bot client.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ChatId {
    Number(i64),
    Text(String),
}

impl ChatId {
    fn parse(&self) -> ApiResult<i64> {
        match self {
            Self::Number(id) => Ok(*id),
            Self::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| ApiError::bad_request(format!("invalid chat_id: {text}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TelegramLinkRequest {
    pub bot_token: String,
    pub chat_id: ChatId,
}

fn telegram(state: &AppState) -> ApiResult<&TelegramIntegration> {
    state
        .gateway
        .telegram
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("telegram is not enabled"))
}

fn signal(state: &AppState) -> ApiResult<&SignalIntegration> {
    state
        .gateway
        .signal
        .as_ref()
        .ok_or_else(|| ApiError::bad_request("signal is not enabled"))
}

/// `POST /api/v1/telegram/link`
pub async fn link_telegram(
    State(state): State<AppState>,
    Json(request): Json<TelegramLinkRequest>,
) -> ApiResult<Json<Value>> {
    let chat_id = request.chat_id.parse()?;
    telegram(&state)?
        .link(Secret::new(request.bot_token), chat_id)
        .await?;
    Ok(Json(json!({ "status": "success" })))
}

/// `DELETE /api/v1/telegram/link`
pub async fn unlink_telegram(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let removed = telegram(&state)?.unlink().await?;
    Ok(Json(json!({ "status": "deleted", "subscriptionsRemoved": removed })))
}

#[derive(Debug, Default, Deserialize)]
pub struct SignalLinkRequest {
    #[serde(default)]
    pub device_name: Option<String>,
}

/// `POST /api/v1/signal/link`
///
/// Returns the device-link URI right away. The link finishes in the
/// background once the primary device scans it; poll `GET` for the outcome.
pub async fn link_signal(
    State(state): State<AppState>,
    body: Option<Json<SignalLinkRequest>>,
) -> ApiResult<Json<Value>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let started = signal(&state)?
        .start_link(request.device_name.as_deref())
        .await?;
    Ok(Json(json!({ "qr_code": started.uri, "status": "linking" })))
}

#[derive(Debug, Serialize)]
pub struct SignalLinkView {
    #[serde(flatten)]
    pub status: SignalStatus,
    pub link: LinkState,
}

/// `GET /api/v1/signal/link`
pub async fn signal_status(State(state): State<AppState>) -> ApiResult<Json<SignalLinkView>> {
    let signal = signal(&state)?;
    let status = signal.status().await?;
    let link = signal.link_state().borrow().clone();
    Ok(Json(SignalLinkView { status, link }))
}

/// `DELETE /api/v1/signal/link`
pub async fn unlink_signal(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let was_linked = signal(&state)?.unlink().await?;
    Ok(Json(json!({ "status": "deleted", "wasLinked": was_linked })))
}
