//! Registration-time checks for web-push targets.

use {
    base64::{
        Engine,
        engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD},
    },
    courier_channels::{WebPushKeys, WebPushTarget},
};

/// Uncompressed SEC1 point: marker byte + 32-byte X + 32-byte Y.
const P256DH_LEN: usize = 65;
const UNCOMPRESSED_MARKER: u8 = 0x04;
const AUTH_LEN: usize = 16;
const SCALAR_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("endpoint is required")]
    MissingEndpoint,

    #[error("invalid endpoint URL: {0}")]
    InvalidEndpoint(String),

    #[error("encrypted push endpoints must use https")]
    InsecureEndpoint,

    #[error("p256dh, auth and vapid_private_key must be provided together")]
    PartialKeys,

    #[error("{field} is not valid base64")]
    InvalidBase64 { field: &'static str },

    #[error("p256dh must decode to {P256DH_LEN} bytes, got {0}")]
    P256dhLength(usize),

    #[error("p256dh must be an uncompressed point (0x04 prefix)")]
    P256dhNotUncompressed,

    #[error("p256dh is not a point on the P-256 curve")]
    P256dhNotOnCurve,

    #[error("auth must decode to {AUTH_LEN} bytes, got {0}")]
    AuthLength(usize),

    #[error("vapid_private_key must decode to {SCALAR_LEN} bytes, got {0}")]
    VapidKeyLength(usize),

    #[error("vapid_private_key is not a valid P-256 scalar (zero or not below the curve order)")]
    VapidKeyOutOfRange,
}

impl From<ValidationError> for courier_channels::Error {
    fn from(err: ValidationError) -> Self {
        Self::invalid_input(err)
    }
}

/// Decode standard or URL-safe base64, padded or not.
fn decode_flexible(value: &str, field: &'static str) -> Result<Vec<u8>, ValidationError> {
    let trimmed = value.trim().trim_end_matches('=');
    let engine = if trimmed.contains(['+', '/']) {
        &STANDARD_NO_PAD
    } else {
        &URL_SAFE_NO_PAD
    };
    engine
        .decode(trimmed)
        .map_err(|_| ValidationError::InvalidBase64 { field })
}

/// Canonical encoding for stored keys: URL-safe, unpadded.
pub fn normalize_key(value: &str, field: &'static str) -> Result<String, ValidationError> {
    decode_flexible(value, field).map(|bytes| URL_SAFE_NO_PAD.encode(bytes))
}

fn check_p256dh(value: &str) -> Result<Vec<u8>, ValidationError> {
    let bytes = decode_flexible(value, "p256dh")?;
    if bytes.len() != P256DH_LEN {
        return Err(ValidationError::P256dhLength(bytes.len()));
    }
    if bytes[0] != UNCOMPRESSED_MARKER {
        return Err(ValidationError::P256dhNotUncompressed);
    }
    p256::PublicKey::from_sec1_bytes(&bytes).map_err(|_| ValidationError::P256dhNotOnCurve)?;
    Ok(bytes)
}

fn check_auth(value: &str) -> Result<Vec<u8>, ValidationError> {
    let bytes = decode_flexible(value, "auth")?;
    if bytes.len() != AUTH_LEN {
        return Err(ValidationError::AuthLength(bytes.len()));
    }
    Ok(bytes)
}

fn check_vapid_key(value: &str) -> Result<Vec<u8>, ValidationError> {
    let bytes = decode_flexible(value, "vapid_private_key")?;
    if bytes.len() != SCALAR_LEN {
        return Err(ValidationError::VapidKeyLength(bytes.len()));
    }
    p256::SecretKey::from_slice(&bytes).map_err(|_| ValidationError::VapidKeyOutOfRange)?;
    Ok(bytes)
}

fn check_endpoint(endpoint: &str, encrypted: bool, require_https: bool) -> Result<(), ValidationError> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(ValidationError::MissingEndpoint);
    }
    let url = url::Url::parse(endpoint).map_err(|e| ValidationError::InvalidEndpoint(e.to_string()))?;
    match url.scheme() {
        "https" => {},
        "http" if encrypted && require_https => return Err(ValidationError::InsecureEndpoint),
        "http" => {},
        other => {
            return Err(ValidationError::InvalidEndpoint(format!(
                "unsupported scheme {other}"
            )));
        },
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ValidationError::InvalidEndpoint("missing host".into()));
    }
    Ok(())
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

/// Validate a registration and build the target to persist.
///
/// Blank key fields count as absent. Either none or all three keys must be
/// present; keys are stored re-encoded as URL-safe unpadded base64.
pub fn validate_target(
    endpoint: &str,
    p256dh: Option<&str>,
    auth: Option<&str>,
    vapid_private_key: Option<&str>,
    require_https_for_encrypted: bool,
) -> Result<WebPushTarget, ValidationError> {
    let keys = match (present(p256dh), present(auth), present(vapid_private_key)) {
        (None, None, None) => None,
        (Some(p256dh), Some(auth), Some(vapid)) => Some(WebPushKeys {
            p256dh: URL_SAFE_NO_PAD.encode(check_p256dh(p256dh)?),
            auth: URL_SAFE_NO_PAD.encode(check_auth(auth)?),
            vapid_private_key: URL_SAFE_NO_PAD.encode(check_vapid_key(vapid)?),
        }),
        _ => return Err(ValidationError::PartialKeys),
    };

    check_endpoint(endpoint, keys.is_some(), require_https_for_encrypted)?;

    Ok(WebPushTarget {
        endpoint: endpoint.trim().to_string(),
        keys,
    })
}
