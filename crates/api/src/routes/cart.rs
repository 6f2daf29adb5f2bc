//! Cart endpoints for logged-in customers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Money, ProductId};
use domain::views::{CartView, cart_view};
use domain::{DomainError, LoyaltyRedemption};
use serde::{Deserialize, Serialize};
use store::Store;

use super::parse_path;
use crate::error::ApiError;
use crate::{AppState, Authenticated};

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Add whatever stock remains instead of failing when short.
    #[serde(default)]
    pub clamp: bool,
}

#[derive(Serialize)]
pub struct AddItemResponse {
    pub added: u32,
    pub clamped: bool,
    pub cart: CartView,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CouponRequest {
    pub code: String,
}

#[derive(Serialize)]
pub struct CouponResponse {
    pub code: String,
    pub discounted_total: String,
    pub discounted_total_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub points: i64,
}

fn item_not_found(product_id: ProductId) -> ApiError {
    DomainError::NotFound {
        entity: "cart item",
        key: product_id.to_string(),
    }
    .into()
}

/// GET /cart: the customer's cart, created on first view.
pub async fn view<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
) -> Result<Json<CartView>, ApiError> {
    let cart = state.carts.view_cart(&session).await?;
    Ok(Json(cart_view(&cart)))
}

/// DELETE /cart: empty the cart without touching stock.
#[tracing::instrument(skip_all)]
pub async fn clear<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
) -> Result<StatusCode, ApiError> {
    state.carts.clear_cart(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /cart/items: add a product, merging with an existing line.
#[tracing::instrument(skip_all)]
pub async fn add_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<AddItemResponse>, ApiError> {
    let outcome = state
        .carts
        .add_to_cart(&session, req.product_id, req.quantity, req.clamp)
        .await?;
    Ok(Json(AddItemResponse {
        added: outcome.added,
        clamped: outcome.clamped,
        cart: cart_view(&outcome.cart),
    }))
}

/// PUT /cart/items/:product_id: set a line's quantity.
#[tracing::instrument(skip(state, session, req))]
pub async fn update_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
    Path(product_id): Path<String>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<CartView>, ApiError> {
    let product_id: ProductId = parse_path("product id", &product_id)?;
    if !state
        .carts
        .update_quantity(&session, product_id, req.quantity)
        .await?
    {
        return Err(item_not_found(product_id));
    }
    let cart = state.carts.view_cart(&session).await?;
    Ok(Json(cart_view(&cart)))
}

/// DELETE /cart/items/:product_id: drop a line.
#[tracing::instrument(skip(state, session))]
pub async fn remove_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
    Path(product_id): Path<String>,
) -> Result<Json<CartView>, ApiError> {
    let product_id: ProductId = parse_path("product id", &product_id)?;
    if !state.carts.remove_from_cart(&session, product_id).await? {
        return Err(item_not_found(product_id));
    }
    let cart = state.carts.view_cart(&session).await?;
    Ok(Json(cart_view(&cart)))
}

/// POST /cart/coupon: apply a discount code to the cart total.
#[tracing::instrument(skip(state, session, req))]
pub async fn apply_coupon<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
    Json(req): Json<CouponRequest>,
) -> Result<Json<CouponResponse>, ApiError> {
    let total: Money = state.carts.apply_coupon(&session, &req.code).await?;
    Ok(Json(CouponResponse {
        code: req.code,
        discounted_total: total.to_string(),
        discounted_total_cents: total.cents(),
    }))
}

/// POST /cart/loyalty: spend loyalty points against the cart total.
#[tracing::instrument(skip_all)]
pub async fn redeem_loyalty<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
    Json(req): Json<RedeemRequest>,
) -> Result<Json<LoyaltyRedemption>, ApiError> {
    let redemption = state
        .carts
        .redeem_loyalty_points(&session, req.points)
        .await?;
    Ok(Json(redemption))
}
