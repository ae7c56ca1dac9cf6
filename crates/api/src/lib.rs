//! HTTP API server with observability for the shop backend.
//!
//! Provides REST endpoints for customer access, catalog search and carts,
//! with structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use accounts::AccessService;
use axum::Router;
use axum::routing::{get, post, put};
use cart::{CartMutationEngine, QueryService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub engine: CartMutationEngine<S>,
    pub queries: QueryService<S>,
    pub access: AccessService<S>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health))
        .route("/customer/login", post(routes::customers::login::<S>))
        .route(
            "/customer/profile/{id}",
            get(routes::customers::profile::<S>).put(routes::customers::update_address::<S>),
        )
        .route(
            "/customer/changepass/{id}",
            put(routes::customers::change_password::<S>),
        )
        .route("/cart/search", get(routes::cart::search::<S>))
        .route("/cart/{cart_name}/add", post(routes::cart::add::<S>))
        .route("/cart/{cart_name}/items", get(routes::cart::items::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
}

/// Creates the application state, wiring every service to the same store.
pub fn create_default_state<S: Store + Clone + 'static>(
    store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        engine: CartMutationEngine::new(store.clone())
            .with_max_attempts(config.cart_retry_attempts),
        queries: QueryService::new(store.clone()),
        access: AccessService::new(store),
    })
}
