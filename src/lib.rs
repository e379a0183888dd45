//! MercadoPago hosted-checkout integration for an e-commerce order
//! pipeline.
//!
//! Three routes own the whole flow: `/mercadopago/redirect` creates a
//! pending order and sends the buyer to the gateway, `/mercadopago/return`
//! and `/mercadopago/webhook` independently reconcile the payment outcome
//! back onto the order, each one idempotent with respect to order state.

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod payment_method;
pub mod services;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Json, Router};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use config::AppConfig;
use events::EventSender;
use gateway::{MercadoPagoClient, PaymentGateway};
use services::{CheckoutService, ReconciliationService};
use store::{
    CartStore, InvoiceStore, OrderStore, SeaOrmCartStore, SeaOrmInvoiceStore, SeaOrmOrderStore,
};

/// Shared application state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub checkout: Arc<CheckoutService>,
    pub reconciliation: Arc<ReconciliationService>,
    pub events: EventSender,
}

impl AppState {
    /// Wires the production components: sea-orm stores and the MercadoPago
    /// REST client.
    pub fn new(config: Arc<AppConfig>, db: Arc<DatabaseConnection>, events: EventSender) -> Self {
        let carts: Arc<dyn CartStore> = Arc::new(SeaOrmCartStore::new(db.clone()));
        let orders: Arc<dyn OrderStore> = Arc::new(SeaOrmOrderStore::new(db.clone()));
        let invoices: Arc<dyn InvoiceStore> = Arc::new(SeaOrmInvoiceStore::new(db));
        let gateway: Arc<dyn PaymentGateway> = Arc::new(MercadoPagoClient::new(&config.mercadopago));
        Self::with_components(config, carts, orders, invoices, gateway, events)
    }

    /// Builds the state from explicit collaborators; the seam tests use to
    /// swap in doubles.
    pub fn with_components(
        config: Arc<AppConfig>,
        carts: Arc<dyn CartStore>,
        orders: Arc<dyn OrderStore>,
        invoices: Arc<dyn InvoiceStore>,
        gateway: Arc<dyn PaymentGateway>,
        events: EventSender,
    ) -> Self {
        let checkout = Arc::new(CheckoutService::new(
            carts,
            orders.clone(),
            gateway.clone(),
            config.clone(),
            events.clone(),
        ));
        let reconciliation = Arc::new(ReconciliationService::new(
            orders,
            invoices,
            gateway,
            config.clone(),
            events.clone(),
        ));
        Self {
            config,
            checkout,
            reconciliation,
            events,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::mercadopago::redirect_to_gateway,
        handlers::mercadopago::handle_return,
        handlers::mercadopago::handle_webhook,
    ),
    components(schemas(errors::ErrorResponse)),
    tags(
        (name = "mercadopago", description = "MercadoPago hosted-checkout integration")
    )
)]
pub struct ApiDoc;

/// Composes the full application router
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(handlers::mercadopago::mercadopago_routes())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "mercadopago-checkout",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
