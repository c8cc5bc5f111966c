//! HTTP API for customer operations.
//!
//! Every customer endpoint runs one saga through
//! [`CustomerCommandService`] and maps the saga outcome to a status code,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, patch, post};
use customer::{CustomerCommandService, CustomersClient, InMemoryCustomersClient};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{EngineConfig, ValidationError};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::customers::{self, AppState};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    let customer_routes = Router::new()
        .route("/", post(customers::register))
        .route("/{party_id}/name", patch(customers::update_name))
        .route("/{party_id}/addresses", post(customers::add_address))
        .route(
            "/{party_id}/addresses/{address_id}",
            patch(customers::update_address).delete(customers::remove_address),
        )
        .route("/{party_id}/emails", post(customers::add_email))
        .route("/{party_id}/emails/{email_id}", delete(customers::remove_email))
        .route("/{party_id}/phones", post(customers::add_phone))
        .route("/{party_id}/phones/{phone_id}", delete(customers::remove_phone))
        .route(
            "/{party_id}/preferred-channel",
            post(customers::set_preferred_channel),
        )
        .route("/{party_id}/dormant", post(customers::mark_dormant))
        .route("/{party_id}/reactivate", post(customers::reactivate))
        .route("/{party_id}/deceased", post(customers::mark_deceased))
        .route("/{party_id}/closure-request", post(customers::request_closure))
        .route("/{party_id}/confirm-closure", post(customers::confirm_closure))
        .route("/{party_id}/lock", post(customers::lock_profile))
        .route("/{party_id}/unlock", post(customers::unlock_profile));

    Router::new()
        .route("/health", get(routes::health::check))
        .nest("/api/v1/customers", customer_routes)
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

/// Creates the default application state backed by the in-memory customer
/// service. The client is returned so callers can inspect or script it.
pub fn create_default_state(
    engine: EngineConfig,
) -> Result<(Arc<AppState>, InMemoryCustomersClient), ValidationError> {
    let client = InMemoryCustomersClient::new();
    let shared: Arc<dyn CustomersClient> = Arc::new(client.clone());
    let service = CustomerCommandService::build(shared, engine)?;
    Ok((Arc::new(AppState { service }), client))
}
