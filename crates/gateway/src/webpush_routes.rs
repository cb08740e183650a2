use {
    axum::{
        Json,
        extract::{Path, State},
        http::StatusCode,
    },
    courier_channels::Channel,
    courier_webpush::RegistrationRequest,
    serde_json::{Value, json},
};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// `POST /webpush/app`
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegistrationRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let gateway = &state.gateway;
    let id = courier_webpush::register(
        gateway.store().as_ref(),
        &request,
        gateway.require_https_for_encrypted,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "appName": request.app_name,
            "channel": Channel::WebPush,
            "subscriptionId": id,
        })),
    ))
}

/// `DELETE /webpush/app/{subscription_id}`
pub async fn unregister(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !courier_webpush::unregister(state.gateway.store().as_ref(), &subscription_id).await? {
        return Err(ApiError::not_found(format!(
            "subscription {subscription_id} not found"
        )));
    }
    Ok(Json(json!({
        "status": "deleted",
        "subscriptionId": subscription_id,
    })))
}
