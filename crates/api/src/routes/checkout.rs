//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use checkout::{CheckoutOutcome, CheckoutRequest};
use store::Store;

use crate::error::ApiError;
use crate::{AppState, Authenticated};

/// POST /checkout: run one checkout pass over the customer's cart.
///
/// Without a `payment_method` the pass stops at a preview. Responds
/// `201 Created` only when an order was placed.
#[tracing::instrument(skip_all)]
pub async fn run<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutOutcome>), ApiError> {
    let outcome = state.checkout.checkout(&session, req).await?;
    let status = match outcome {
        CheckoutOutcome::Completed(_) => StatusCode::CREATED,
        _ => StatusCode::OK,
    };
    tracing::info!(outcome = outcome.name(), "checkout pass finished");
    Ok((status, Json(outcome)))
}
