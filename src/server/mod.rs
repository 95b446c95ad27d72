use std::sync::Arc;

use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::{chain::lcd::LcdClient, queue::BroadcastQueue};

mod claim;

/// Collaborators shared by the claim handlers.
pub struct ServiceState {
    pub queue: Arc<BroadcastQueue>,
    pub lcd: LcdClient,
    pub granter: String,
    pub allowance_amount: u128,
}

pub fn router(state: Arc<ServiceState>) -> Router {
    Router::new()
        .route(
            "/claim/:address",
            get(claim::claim_from_path).options(claim::preflight),
        )
        .route("/claim", post(claim::claim_from_body))
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET"),
        ))
        .layer(TraceLayer::new_for_http())
}
