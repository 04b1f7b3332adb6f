use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::{errors::ServiceError, gateway::verify_webhook_signature, AppState};

/// Inbound payment gateway webhook. The signature is checked against the
/// raw body before anything is parsed; each event id is applied at most
/// once; unhandled event types are acknowledged without action.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    if let Some(secret) = state.config.stripe_webhook_secret.as_deref() {
        let verified = verify_webhook_signature(
            &headers,
            &body,
            secret,
            state.config.webhook_tolerance_secs,
        );
        if !verified {
            warn!("payment webhook signature verification failed");
            return Err(ServiceError::Unauthorized(
                "invalid webhook signature".into(),
            ));
        }
    }

    let event: Value = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::ValidationError(format!("invalid webhook payload: {e}")))?;

    if let Some(event_id) = event.get("id").and_then(|v| v.as_str()) {
        let fresh = state.services.payments.register_webhook_event(event_id).await?;
        if !fresh {
            info!(event_id, "webhook event already processed");
            return Ok((StatusCode::OK, "ok"));
        }
    }

    let event_type = event.get("type").and_then(|v| v.as_str()).unwrap_or("");
    match event_type {
        "payment_intent.succeeded"
        | "payment_intent.payment_failed"
        | "payment_intent.canceled" => {
            let intent_id = event
                .pointer("/data/object/id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    ServiceError::ValidationError("webhook payload missing intent id".into())
                })?;
            let confirmed = state.services.payments.confirm_payment(intent_id).await?;
            info!(intent_id, status = %confirmed.gateway_status, "webhook applied");
        }
        other => {
            info!(event_type = other, "unhandled payment webhook type");
        }
    }

    Ok((StatusCode::OK, "ok"))
}
