use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Json, Router,
        extract::{DefaultBodyLimit, State},
        middleware,
        response::IntoResponse,
        routing::{delete, get, post},
    },
    serde_json::{Map, Value, json},
    tower_http::trace::TraceLayer,
    tracing::{info, warn},
};

use crate::{
    admin,
    auth::require_api_key,
    integrations, publish,
    state::{AppState, GatewayState},
    webpush_routes,
};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1 << 20;

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    let app_state = AppState { gateway: state };

    let protected = Router::new()
        .route("/api/v1/health", get(api_health_handler))
        .route("/api/v1/apps", get(admin::list_apps))
        .route(
            "/api/v1/apps/{app}",
            get(admin::get_app).delete(admin::delete_app),
        )
        .route("/api/v1/apps/{app}/publish", post(publish::publish_json))
        .route("/api/v1/apps/{app}/subscriptions", post(admin::add_channel))
        .route(
            "/api/v1/apps/{app}/subscriptions/{id}",
            delete(admin::delete_subscription),
        )
        .route(
            "/api/v1/telegram/link",
            post(integrations::link_telegram).delete(integrations::unlink_telegram),
        )
        .route(
            "/api/v1/signal/link",
            post(integrations::link_signal)
                .get(integrations::signal_status)
                .delete(integrations::unlink_signal),
        )
        .route("/webpush/app", post(webpush_routes::register))
        .route(
            "/webpush/app/{subscription_id}",
            delete(webpush_routes::unregister),
        )
        .route("/{app}", post(publish::publish_text))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .merge(protected)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Serve the gateway until Ctrl-C.
pub async fn start_gateway(state: Arc<GatewayState>, bind: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    let channels = state.registry().registered_channels();
    let app = build_gateway_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, ?channels, "courier gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("courier gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn api_health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let gateway = &state.gateway;
    let registry = gateway.registry();

    let mut channels = Map::new();
    for channel in registry.registered_channels() {
        let linked = match registry.get(channel) {
            Some(sender) => match sender.link_status() {
                Some(status) => match status.is_linked().await {
                    Ok(linked) => Value::Bool(linked),
                    Err(e) => {
                        warn!(%channel, error = %e, "link status check failed");
                        Value::Bool(false)
                    },
                },
                None => Value::Null,
            },
            None => continue,
        };
        channels.insert(channel.to_string(), json!({ "linked": linked }));
    }

    Json(json!({
        "status": "ok",
        "version": gateway.version,
        "uptime_secs": gateway.started_at.elapsed().as_secs(),
        "channels": channels,
    }))
}
