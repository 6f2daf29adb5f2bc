//! HTTP API server with observability for the store fulfillment core.
//!
//! Provides REST endpoints for accounts, the catalog, carts, checkout and
//! orders, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod session;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, patch, post, put};
use checkout::{CancellationCoordinator, CheckoutCoordinator};
use domain::{
    AccountService, CartService, CatalogService, OrderService, PaymentProcessor, Settings,
    SimulatedGateway,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use session::{Authenticated, SessionRegistry};

/// Shared application state.
pub struct AppState<S: Store> {
    pub accounts: AccountService<S>,
    pub catalog: CatalogService<S>,
    pub carts: CartService<S>,
    pub orders: OrderService<S, SimulatedGateway>,
    pub checkout: CheckoutCoordinator<S, SimulatedGateway>,
    pub cancellation: CancellationCoordinator<S, SimulatedGateway>,
    pub sessions: SessionRegistry,
    pub gateway: SimulatedGateway,
}

/// Wires every service to one store, one ledger and one gateway.
pub fn create_state<S: Store>(store: S, settings: Settings) -> Arc<AppState<S>> {
    let ledger = settings.ledger();
    let gateway = settings.gateway();
    let payments = PaymentProcessor::new(gateway.clone());

    Arc::new(AppState {
        accounts: AccountService::new(store.clone()),
        catalog: CatalogService::new(store.clone(), ledger),
        carts: CartService::new(store.clone(), ledger),
        orders: OrderService::new(store.clone(), payments.clone()),
        checkout: CheckoutCoordinator::new(store.clone(), ledger, payments.clone()),
        cancellation: CancellationCoordinator::new(store, ledger, payments),
        sessions: SessionRegistry::new(),
        gateway,
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        // Accounts
        .route("/accounts", post(routes::accounts::register::<S>))
        .route("/sessions", post(routes::accounts::login::<S>))
        .route("/sessions/{token}", delete(routes::accounts::logout::<S>))
        .route(
            "/profile",
            get(routes::accounts::profile::<S>).patch(routes::accounts::update_profile::<S>),
        )
        .route(
            "/profile/address",
            put(routes::accounts::update_address::<S>),
        )
        // Catalog
        .route("/products", get(routes::products::list::<S>))
        .route("/products/{id}", get(routes::products::get::<S>))
        .route("/admin/products", post(routes::products::add::<S>))
        .route(
            "/admin/products/{id}",
            patch(routes::products::update::<S>).delete(routes::products::remove::<S>),
        )
        // Cart
        .route(
            "/cart",
            get(routes::cart::view::<S>).delete(routes::cart::clear::<S>),
        )
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{product_id}",
            put(routes::cart::update_item::<S>).delete(routes::cart::remove_item::<S>),
        )
        .route("/cart/coupon", post(routes::cart::apply_coupon::<S>))
        .route("/cart/loyalty", post(routes::cart::redeem_loyalty::<S>))
        // Checkout and orders
        .route("/checkout", post(routes::checkout::run::<S>))
        .route("/orders", get(routes::orders::history::<S>))
        .route("/orders/{order_number}", get(routes::orders::get::<S>))
        .route(
            "/orders/{order_number}/cancel",
            post(routes::orders::cancel::<S>),
        )
        .route(
            "/orders/{order_number}/address",
            put(routes::orders::change_address::<S>),
        )
        .route("/admin/orders", get(routes::orders::by_status::<S>))
        .route(
            "/admin/orders/{order_number}/ship",
            post(routes::orders::ship::<S>),
        )
        .route(
            "/admin/orders/{order_number}/deliver",
            post(routes::orders::deliver::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
