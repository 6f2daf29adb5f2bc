//! Catalog browsing and administration endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Money, ProductId};
use domain::views::{ProductView, product_view};
use domain::{DomainError, NewProduct, ProductChange};
use serde::{Deserialize, Serialize};
use store::Store;

use super::parse_path;
use crate::error::ApiError;
use crate::{AppState, Authenticated};

/// Fields to change; absent fields are left alone. An empty `description`
/// clears it.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub stock_delta: Option<i64>,
}

impl UpdateProductRequest {
    fn into_changes(self) -> Vec<ProductChange> {
        let mut changes = Vec::new();
        if let Some(name) = self.name {
            changes.push(ProductChange::Rename(name));
        }
        if let Some(description) = self.description {
            changes.push(ProductChange::Describe(Some(description)));
        }
        if let Some(price) = self.price {
            changes.push(ProductChange::Reprice(price));
        }
        if let Some(delta) = self.stock_delta {
            changes.push(ProductChange::AdjustStock(delta));
        }
        changes
    }
}

#[derive(Serialize)]
pub struct UpdateProductResponse {
    /// `None` when a stock change removed the product.
    pub product: Option<ProductView>,
    pub removed: bool,
}

/// GET /products: the full catalog.
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    let products = state.catalog.list_products().await?;
    Ok(Json(products.iter().map(product_view).collect()))
}

/// GET /products/:id: a single product.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductView>, ApiError> {
    let id: ProductId = parse_path("product id", &id)?;
    let product = state.catalog.product(id).await?;
    Ok(Json(product_view(&product)))
}

/// POST /admin/products: add a product to the catalog.
#[tracing::instrument(skip_all)]
pub async fn add<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
    Json(new): Json<NewProduct>,
) -> Result<(StatusCode, Json<ProductView>), ApiError> {
    let product = state.catalog.add_product(&session, new).await?;
    Ok((StatusCode::CREATED, Json(product_view(&product))))
}

/// PATCH /admin/products/:id: rename, describe, reprice or restock.
///
/// Changes are applied in that order, each in its own transaction.
#[tracing::instrument(skip(state, session, req))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
    Path(id): Path<String>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<UpdateProductResponse>, ApiError> {
    let id: ProductId = parse_path("product id", &id)?;
    let changes = req.into_changes();
    if changes.is_empty() {
        return Err(ApiError::BadRequest("No changes requested".to_string()));
    }

    let mut product = None;
    for change in changes {
        product = state.catalog.update_product(&session, id, change).await?;
        if product.is_none() {
            break;
        }
    }

    Ok(Json(UpdateProductResponse {
        removed: product.is_none(),
        product: product.as_ref().map(product_view),
    }))
}

/// DELETE /admin/products/:id: remove a product from the catalog.
#[tracing::instrument(skip(state, session))]
pub async fn remove<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(session): Authenticated,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: ProductId = parse_path("product id", &id)?;
    if !state.catalog.remove_product(&session, id).await? {
        return Err(DomainError::NotFound {
            entity: "product",
            key: id.to_string(),
        }
        .into());
    }
    Ok(StatusCode::NO_CONTENT)
}
