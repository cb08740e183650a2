use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

/// Error returned by every handler, rendered as `{ "error": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("not authenticated")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    /// An upstream channel or service rejected or failed the request.
    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<courier_channels::Error> for ApiError {
    fn from(err: courier_channels::Error) -> Self {
        use courier_channels::Error;
        match err {
            Error::InvalidInput { .. } | Error::Unavailable { .. } => {
                Self::BadRequest(err.to_string())
            },
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<courier_delivery::PublishError> for ApiError {
    fn from(err: courier_delivery::PublishError) -> Self {
        use courier_delivery::PublishError;
        match err {
            PublishError::Store(inner) => inner.into(),
            delivery @ PublishError::Delivery { .. } => Self::BadGateway(delivery.to_string()),
        }
    }
}

impl From<courier_telegram::Error> for ApiError {
    fn from(err: courier_telegram::Error) -> Self {
        use courier_telegram::Error;
        match err {
            Error::Channel(inner) => inner.into(),
            Error::Telegram(teloxide::RequestError::Api(api)) => {
                Self::BadRequest(format!("telegram rejected the request: {api}"))
            },
            Error::Message { message } => Self::BadRequest(message),
            Error::Vault(inner) => Self::Internal(inner.to_string()),
            other => Self::BadGateway(other.to_string()),
        }
    }
}

impl From<courier_signal::Error> for ApiError {
    fn from(err: courier_signal::Error) -> Self {
        use courier_signal::Error;
        match err {
            Error::Channel(inner) => inner.into(),
            Error::NotInstalled { .. } | Error::NotLinked | Error::Message { .. } => {
                Self::BadRequest(err.to_string())
            },
            Error::Cli { .. } => Self::BadGateway(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, courier_channels::DeliveryError};

    #[test]
    fn maps_domain_errors_to_status() {
        let err: ApiError = courier_channels::Error::invalid_input("bad").into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: ApiError = courier_delivery::PublishError::Delivery {
            subscription_id: "s".into(),
            source: DeliveryError::transient("timeout"),
        }
        .into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

        let err: ApiError = courier_signal::Error::NotLinked.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: ApiError = courier_signal::Error::cli("boom").into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
