use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tracing::{error, warn};

use crate::{
    chain::{
        address::validate_address,
        allowance::{decide, unix_now, Decision},
        msgs, TxOutcome,
    },
    queue::SubmitResult,
    ALLOWANCE_VALIDITY, GRANT_GAS_LIMIT, REVOKE_GAS_LIMIT,
};

use super::ServiceState;

/// Reported when the grant message itself was rejected on chain.
const GRANT_FAILED_STATUS: u16 = 550;

#[derive(Deserialize)]
pub(super) struct ClaimRequest {
    address: String,
}

pub(super) async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub(super) async fn claim_from_path(
    State(state): State<Arc<ServiceState>>,
    Path(address): Path<String>,
) -> Response {
    claim(&state, &address).await
}

/// Body-carried variant of the claim route; behaves exactly like the
/// path-carried one.
pub(super) async fn claim_from_body(
    State(state): State<Arc<ServiceState>>,
    Json(request): Json<ClaimRequest>,
) -> Response {
    claim(&state, &request.address).await
}

async fn claim(state: &ServiceState, address: &str) -> Response {
    if validate_address(address).is_err() {
        return error_response(StatusCode::BAD_REQUEST, "Invalid bech32 address");
    }

    let existing = match state.lcd.allowance(&state.granter, address).await {
        Ok(existing) => existing,
        Err(query_error) => {
            error!(grantee = address, %query_error, "Allowance lookup failed!");

            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to query the existing allowance",
            );
        }
    };

    match decide(existing.as_ref(), state.allowance_amount, unix_now()) {
        Decision::StillActive => error_response(
            StatusCode::BAD_REQUEST,
            "Existing feegrant is full and hasn't expired yet",
        ),
        Decision::Unsupported => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Existing allowance is not a basic allowance",
        ),
        Decision::Grant => grant(state, address).await,
        Decision::RevokeThenGrant => {
            let revocation = state.queue.enqueue(
                msgs::revoke_allowance(&state.granter, address),
                REVOKE_GAS_LIMIT,
                address.to_owned(),
            );

            match await_outcome(revocation).await {
                Ok(outcome) if outcome.is_success() => grant(state, address).await,
                Ok(outcome) => {
                    warn!(
                        grantee = address,
                        code = outcome.code,
                        "Revocation rejected by the chain.",
                    );

                    error_response(
                        StatusCode::TOO_EARLY,
                        "Failed to revoke the existing feegrant",
                    )
                }
                Err(response) => response,
            }
        }
    }
}

async fn grant(state: &ServiceState, address: &str) -> Response {
    let expires_at = unix_now() + ALLOWANCE_VALIDITY.as_secs() as i64;

    let message =
        msgs::grant_allowance(&state.granter, address, state.allowance_amount, expires_at);

    let receiver = state
        .queue
        .enqueue(message, GRANT_GAS_LIMIT, address.to_owned());

    match await_outcome(receiver).await {
        Ok(outcome) if outcome.is_success() => (
            StatusCode::OK,
            Json(json!({ "meta": outcome.meta, "events": outcome.events })),
        )
            .into_response(),
        Ok(outcome) => {
            warn!(
                grantee = address,
                code = outcome.code,
                "Grant rejected by the chain.",
            );

            let body = serde_json::from_str::<Value>(&outcome.raw_response)
                .unwrap_or_else(|_| Value::String(outcome.raw_response.clone()));

            (grant_failed_status(), Json(body)).into_response()
        }
        Err(response) => response,
    }
}

async fn await_outcome(
    receiver: oneshot::Receiver<SubmitResult>,
) -> Result<TxOutcome, Response> {
    match receiver.await {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(submission_error)) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &submission_error.to_string(),
        )),
        Err(_closed) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Broadcasting task is unavailable",
        )),
    }
}

fn grant_failed_status() -> StatusCode {
    StatusCode::from_u16(GRANT_FAILED_STATUS).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
