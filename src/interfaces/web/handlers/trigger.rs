use axum::{
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use super::super::AppState;
use crate::core::filter::Decision;
use crate::core::signature;

pub(crate) const EVENT_HEADER: &str = "x-github-event";
pub(crate) const SIGNATURE_256_HEADER: &str = "x-hub-signature-256";
pub(crate) const SIGNATURE_HEADER: &str = "x-hub-signature";

/// Why a trigger request was turned away.
#[derive(Debug, Error)]
pub(crate) enum TriggerError {
    #[error("empty body")]
    EmptyBody,
    #[error("{0}")]
    UnreadableBody(String),
    #[error("empty secret header")]
    MissingSignature,
    #[error("invalid secret")]
    InvalidSignature,
    #[error("{0}")]
    MalformedJson(String),
    #[error("{0}")]
    Rejected(&'static str),
}

impl TriggerError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            TriggerError::MissingSignature | TriggerError::InvalidSignature => {
                StatusCode::FORBIDDEN
            }
            TriggerError::EmptyBody
            | TriggerError::UnreadableBody(_)
            | TriggerError::MalformedJson(_)
            | TriggerError::Rejected(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for TriggerError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Prefer the SHA-256 header and fall back to the legacy SHA-1 one.
fn signature_header(headers: &HeaderMap) -> Option<&str> {
    [SIGNATURE_256_HEADER, SIGNATURE_HEADER]
        .iter()
        .filter_map(|name| headers.get(*name))
        .map(|v| v.to_str().unwrap_or_default())
        .find(|v| !v.is_empty())
}

pub(crate) async fn trigger_endpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<StatusCode, TriggerError> {
    let body = body.map_err(|e| TriggerError::UnreadableBody(e.body_text()))?;
    if body.is_empty() {
        return Err(TriggerError::EmptyBody);
    }

    let digest = signature_header(&headers).ok_or(TriggerError::MissingSignature)?;
    if !signature::verify(&body, digest, state.config.secret.as_bytes()) {
        warn!("signature didn't match: {}", digest);
        return Err(TriggerError::InvalidSignature);
    }

    // The signed bytes are decoded as-is; nothing re-serializes the payload.
    let decoded: Value =
        serde_json::from_slice(&body).map_err(|e| TriggerError::MalformedJson(e.to_string()))?;

    let event_type = headers.get(EVENT_HEADER).map(|v| v.to_str().unwrap_or_default());
    match state.filter.should_trigger(&decoded, event_type) {
        Decision::Reject(reason) => Err(TriggerError::Rejected(reason)),
        Decision::Ignore(reason) => {
            let git_ref = decoded.get("ref").and_then(Value::as_str).unwrap_or("-");
            info!(
                "ignoring {} event ({}): ref {}",
                event_type.unwrap_or("untyped"),
                reason,
                git_ref
            );
            Ok(StatusCode::NO_CONTENT)
        }
        Decision::Trigger => {
            state.launcher.launch(state.filter.target_ref());
            Ok(StatusCode::NO_CONTENT)
        }
    }
}
