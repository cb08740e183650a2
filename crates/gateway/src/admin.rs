//! Admin CRUD over apps and subscriptions.

use {
    axum::{
        Json,
        extract::{Path, State},
        http::StatusCode,
    },
    courier_channels::{
        App, Channel, NewSubscription, SignalGroup, Subscription, SubscriptionTarget,
        TelegramChat, validate_app_name,
    },
    serde::{Deserialize, Serialize},
    serde_json::{Value, json},
    tracing::info,
};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// An app as exposed over HTTP. Web-push keys never leave the server.
#[derive(Debug, Serialize)]
pub struct AppView {
    pub name: String,
    pub subscriptions: Vec<SubscriptionView>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    pub id: String,
    pub channel: Channel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub encrypted: bool,
}

impl From<Subscription> for SubscriptionView {
    fn from(sub: Subscription) -> Self {
        let mut view = Self {
            id: sub.id,
            channel: sub.target.channel(),
            group_id: None,
            chat_id: None,
            endpoint: None,
            encrypted: false,
        };
        match sub.target {
            SubscriptionTarget::Signal(group) => view.group_id = Some(group.group_id),
            SubscriptionTarget::Telegram(chat) => view.chat_id = Some(chat.chat_id),
            SubscriptionTarget::WebPush(target) => {
                view.encrypted = target.is_encrypted();
                view.endpoint = Some(target.endpoint);
            },
        }
        view
    }
}

impl From<App> for AppView {
    fn from(app: App) -> Self {
        Self {
            name: app.name,
            subscriptions: app.subscriptions.into_iter().map(Into::into).collect(),
        }
    }
}

/// `GET /api/v1/apps`
pub async fn list_apps(State(state): State<AppState>) -> ApiResult<Json<Vec<AppView>>> {
    let apps = state.gateway.store().get_all_apps().await?;
    Ok(Json(apps.into_iter().map(Into::into).collect()))
}

/// `GET /api/v1/apps/{app}`
pub async fn get_app(
    State(state): State<AppState>,
    Path(app): Path<String>,
) -> ApiResult<Json<AppView>> {
    let found = state.gateway.store().get_app(&app).await?;
    found
        .map(|a| Json(a.into()))
        .ok_or_else(|| ApiError::not_found(format!("app {app} not found")))
}

/// `DELETE /api/v1/apps/{app}`
pub async fn delete_app(
    State(state): State<AppState>,
    Path(app): Path<String>,
) -> ApiResult<Json<Value>> {
    if !state.gateway.store().remove_app(&app).await? {
        return Err(ApiError::not_found(format!("app {app} not found")));
    }
    info!(app = %app, "app deleted");
    Ok(Json(json!({ "status": "deleted", "appName": app })))
}

#[derive(Debug, Deserialize)]
pub struct AddChannelRequest {
    pub channel: Channel,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub chat_id: Option<i64>,
}

/// `POST /api/v1/apps/{app}/subscriptions`
///
/// Adds a Signal or Telegram subscription. Each app holds at most one
/// subscription per channel through this route.
pub async fn add_channel(
    State(state): State<AppState>,
    Path(app): Path<String>,
    Json(request): Json<AddChannelRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    validate_app_name(&app)?;
    let gateway = &state.gateway;
    let channel = request.channel;

    if !gateway.registry().has_channel(channel) {
        return Err(ApiError::bad_request(format!("channel {channel} is not enabled")));
    }
    if let Some(existing) = gateway.store().get_app(&app).await?
        && existing.has_channel(channel)
    {
        return Err(ApiError::bad_request(format!(
            "app {app} already has a {channel} subscription"
        )));
    }

    let subscription_id = match channel {
        Channel::Signal => add_signal(&state, &app, request.group_id).await?,
        Channel::Telegram => add_telegram(&state, &app, request.chat_id).await?,
        Channel::WebPush => {
            return Err(ApiError::bad_request(
                "web push subscriptions are added through /webpush/app",
            ));
        },
    };

    info!(app = %app, %channel, %subscription_id, "channel added to app");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "appName": app,
            "channel": channel,
            "subscriptionId": subscription_id,
        })),
    ))
}

async fn add_signal(state: &AppState, app: &str, group_id: Option<String>) -> ApiResult<String> {
    let signal = state
        .gateway
        .signal
        .as_ref()
        .ok_or_else(|| ApiError::bad_request("signal is not enabled"))?;

    let Some(group_id) = group_id.filter(|g| !g.trim().is_empty()) else {
        return Ok(signal.sender().subscribe_app(app).await?);
    };

    let account = signal
        .status()
        .await?
        .phone_number
        .ok_or_else(|| ApiError::bad_request("signal is not linked"))?;
    let target = SubscriptionTarget::Signal(SignalGroup { group_id, account });
    Ok(state
        .gateway
        .store()
        .add_subscription(NewSubscription::new(app, target))
        .await?)
}

async fn add_telegram(state: &AppState, app: &str, chat_id: Option<i64>) -> ApiResult<String> {
    let chat_id = match chat_id.filter(|id| *id != 0) {
        Some(id) => id,
        None => {
            let telegram = state
                .gateway
                .telegram
                .as_ref()
                .ok_or_else(|| ApiError::bad_request("telegram is not enabled"))?;
            telegram
                .default_chat_id()
                .await?
                .ok_or_else(|| ApiError::bad_request("chat_id is required"))?
        },
    };
    let target = SubscriptionTarget::Telegram(TelegramChat { chat_id });
    Ok(state
        .gateway
        .store()
        .add_subscription(NewSubscription::new(app, target))
        .await?)
}

/// `DELETE /api/v1/apps/{app}/subscriptions/{id}`
pub async fn delete_subscription(
    State(state): State<AppState>,
    Path((app, id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let store = state.gateway.store();
    match store.get_subscription(&id).await? {
        Some(sub) if sub.app_name == app => {},
        _ => {
            return Err(ApiError::not_found(format!(
                "subscription {id} not found for app {app}"
            )));
        },
    }
    store.delete_subscription(&id).await?;
    info!(app = %app, subscription_id = %id, "subscription deleted");
    Ok(Json(json!({ "status": "deleted", "subscriptionId": id })))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        courier_channels::{WebPushKeys, WebPushTarget},
    };

    #[test]
    fn web_push_view_hides_keys() {
        let sub = Subscription {
            id: "abc".into(),
            app_name: "router".into(),
            target: SubscriptionTarget::WebPush(WebPushTarget {
                endpoint: "https://push.example/1".into(),
                keys: Some(WebPushKeys {
                    p256dh: "pub".into(),
                    auth: "auth".into(),
                    vapid_private_key: "private".into(),
                }),
            }),
        };
        let value = serde_json::to_value(SubscriptionView::from(sub)).unwrap();
        assert_eq!(value["endpoint"], "https://push.example/1");
        assert_eq!(value["encrypted"], true);
        assert_eq!(value["channel"], "webpush");
        let rendered = value.to_string();
        assert!(!rendered.contains("private"));
        assert!(!rendered.contains("auth\""));
    }

    #[test]
    fn telegram_view() {
        let sub = Subscription {
            id: "t1".into(),
            app_name: "backup".into(),
            target: SubscriptionTarget::Telegram(TelegramChat { chat_id: -100 }),
        };
        let value = serde_json::to_value(SubscriptionView::from(sub)).unwrap();
        assert_eq!(value, json!({ "id": "t1", "channel": "telegram", "chat_id": -100 }));
    }

    #[test]
    fn add_channel_request_parses_channel() {
        let req: AddChannelRequest =
            serde_json::from_value(json!({ "channel": "telegram", "chat_id": 7 })).unwrap();
        assert_eq!(req.channel, Channel::Telegram);
        assert_eq!(req.chat_id, Some(7));
        assert!(serde_json::from_value::<AddChannelRequest>(json!({ "channel": "fax" })).is_err());
    }
}
