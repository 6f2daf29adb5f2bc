//! Order history, cancellation and fulfillment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::{Address, OrderNumber, ProductId};
use domain::views::{
    OrderDetailsView, OrderSummaryView, PaymentView, order_details, order_summary, payment_view,
};
use domain::{CommandResult, DomainError, OrderState};
use serde::{Deserialize, Serialize};
use store::Store;

use super::parse_path;
use crate::error::ApiError;
use crate::{AppState, Authenticated};

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShipRequest {
    pub tracking_number: String,
}

/// An order after a command, with the events the command recorded.
#[derive(Serialize)]
pub struct OrderCommandResponse {
    pub order: OrderDetailsView,
    pub events: Vec<&'static str>,
}

impl From<CommandResult> for OrderCommandResponse {
    fn from(result: CommandResult) -> Self {
        Self {
            order: order_details(&result.order),
            events: result.events.iter().map(|e| e.event_type()).collect(),
        }
    }
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub order: OrderDetailsView,
    pub refund: Option<PaymentView>,
    pub restocked: Vec<RestockedLine>,
    pub skipped: Vec<ProductId>,
    pub points_revoked: u32,
}

#[derive(Serialize)]
pub struct RestockedLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

fn order_number(raw: &str) -> Result<OrderNumber, ApiError> {
    parse_path("order number", raw)
}

/// GET /orders: the customer's order history, newest first.
#[tracing::instrument(skip(state, session))]
pub async fn history<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<OrderSummaryView>>, ApiError> {
    let orders = state
        .orders
        .order_history(&session, query.status.as_deref())
        .await?;
    Ok(Json(orders.iter().map(order_summary).collect()))
}

/// GET /orders/:order_number: full details for the owner or an admin.
#[tracing::instrument(skip(state, session))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
    Path(raw): Path<String>,
) -> Result<Json<OrderDetailsView>, ApiError> {
    let order = state
        .orders
        .order_details(&session, order_number(&raw)?)
        .await?;
    Ok(Json(order_details(&order)))
}

/// POST /orders/:order_number/cancel: cancel, refund and restock.
#[tracing::instrument(skip(state, session))]
pub async fn cancel<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
    Path(raw): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let receipt = state
        .cancellation
        .cancel(&session, order_number(&raw)?)
        .await?;

    Ok(Json(CancelResponse {
        order: order_details(&receipt.order),
        refund: receipt.refund.as_ref().map(payment_view),
        restocked: receipt
            .restocked
            .into_iter()
            .map(|(product_id, quantity)| RestockedLine {
                product_id,
                quantity,
            })
            .collect(),
        skipped: receipt.skipped,
        points_revoked: receipt.points_revoked,
    }))
}

/// PUT /orders/:order_number/address: change where an unshipped order goes.
#[tracing::instrument(skip(state, session, address))]
pub async fn change_address<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
    Path(raw): Path<String>,
    Json(address): Json<Address>,
) -> Result<Json<OrderCommandResponse>, ApiError> {
    let result = state
        .orders
        .change_shipping_address(&session, order_number(&raw)?, address)
        .await?;
    Ok(Json(result.into()))
}

/// GET /admin/orders?status=: orders in one status; paid orders awaiting
/// shipment when no status is given.
#[tracing::instrument(skip(state, session))]
pub async fn by_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<OrderSummaryView>>, ApiError> {
    let orders = match query.status.as_deref() {
        Some(status) => {
            let status: OrderState = status.parse().map_err(DomainError::from)?;
            state.orders.orders_in_state(&session, status).await?
        }
        None => state.orders.pending_orders(&session).await?,
    };
    Ok(Json(orders.iter().map(order_summary).collect()))
}

/// POST /admin/orders/:order_number/ship: record the tracking number.
#[tracing::instrument(skip(state, session, req))]
pub async fn ship<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
    Path(raw): Path<String>,
    Json(req): Json<ShipRequest>,
) -> Result<Json<OrderCommandResponse>, ApiError> {
    let result = state
        .orders
        .ship(&session, order_number(&raw)?, &req.tracking_number)
        .await?;
    Ok(Json(result.into()))
}

/// POST /admin/orders/:order_number/deliver: mark delivered and credit
/// loyalty points.
#[tracing::instrument(skip(state, session))]
pub async fn deliver<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
    Path(raw): Path<String>,
) -> Result<Json<OrderCommandResponse>, ApiError> {
    let result = state
        .orders
        .mark_delivered(&session, order_number(&raw)?)
        .await?;
    Ok(Json(result.into()))
}
