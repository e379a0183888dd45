use crate::{errors::PaymentError, services::ConfirmationEvent, AppState};
use axum::{
    body::Bytes,
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use utoipa::IntoParams;
use uuid::Uuid;

/// Routes owned by the MercadoPago integration
pub fn mercadopago_routes() -> Router<AppState> {
    Router::new()
        .route("/mercadopago/redirect", get(redirect_to_gateway))
        .route("/mercadopago/return", get(handle_return))
        .route("/mercadopago/webhook", post(handle_webhook))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RedirectQuery {
    /// Cart the buyer is checking out
    pub cart_id: Uuid,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReturnQuery {
    /// Payment identifier; the gateway uses either name depending on flow
    pub payment_id: Option<String>,
    pub collection_id: Option<String>,
    pub status: Option<String>,
}

/// Redirect to a known-good page with a query parameter attached. Falls
/// back to the bare URL if the configured base does not parse.
fn redirect_with(base: &str, key: &str, value: &str) -> Redirect {
    match url::Url::parse(base) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair(key, value);
            Redirect::to(url.as_str())
        }
        Err(_) => Redirect::to(base),
    }
}

fn back_to_cart(state: &AppState, err: &PaymentError) -> Redirect {
    redirect_with(&state.config.cart_url(), "error", &err.user_message())
}

/// GET /mercadopago/redirect — create the pending order and preference,
/// then send the buyer to the gateway's hosted payment page. Every failure
/// lands back on the cart view with a readable reason.
#[utoipa::path(
    get,
    path = "/mercadopago/redirect",
    params(RedirectQuery),
    responses(
        (status = 303, description = "Redirect to the gateway payment page, or back to the cart with an error message")
    ),
    tag = "mercadopago"
)]
pub async fn redirect_to_gateway(
    State(state): State<AppState>,
    Query(query): Query<RedirectQuery>,
) -> Redirect {
    match state.checkout.initiate(query.cart_id).await {
        Ok(target) => Redirect::to(&target.url),
        Err(err) => {
            warn!(cart_id = %query.cart_id, error = %err, "checkout initiation failed");
            back_to_cart(&state, &err)
        }
    }
}

/// GET /mercadopago/return — the buyer coming back from the gateway.
/// Confirms the payment by asking the gateway, then forwards to the
/// success view with the order number attached.
#[utoipa::path(
    get,
    path = "/mercadopago/return",
    params(ReturnQuery),
    responses(
        (status = 303, description = "Redirect to the order-success view, or back to the cart with an error message")
    ),
    tag = "mercadopago"
)]
pub async fn handle_return(
    State(state): State<AppState>,
    Query(query): Query<ReturnQuery>,
) -> Redirect {
    info!(?query, "mercadopago return");

    let payment_id = query.payment_id.or(query.collection_id);
    match state
        .reconciliation
        .reconcile(ConfirmationEvent::user_return(payment_id))
        .await
    {
        Ok(order) => {
            redirect_with(&state.config.success_url(), "order", &order.increment_id)
        }
        Err(err) => {
            warn!(error = %err, "return-path reconciliation failed");
            back_to_cart(&state, &err)
        }
    }
}

/// POST /mercadopago/webhook — gateway-initiated confirmation.
///
/// Always acknowledges with 200 so the gateway never goes into a retry
/// storm; failures are logged instead. Only `payment`-typed notifications
/// are processed, everything else is acknowledged untouched.
#[utoipa::path(
    post,
    path = "/mercadopago/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Always acknowledged")
    ),
    tag = "mercadopago"
)]
pub async fn handle_webhook(State(state): State<AppState>, body: Bytes) -> Json<Value> {
    let ack = Json(json!({ "ok": true }));

    // Acknowledge anything unparseable; the gateway only speaks JSON
    let Ok(payload) = serde_json::from_slice::<Value>(&body) else {
        warn!("mercadopago webhook with non-JSON body");
        return ack;
    };
    info!(%payload, "mercadopago webhook");

    if payload.get("type").and_then(Value::as_str) != Some("payment") {
        return ack;
    }

    let Some(payment_id) = webhook_payment_id(&payload) else {
        return ack;
    };

    match state
        .reconciliation
        .reconcile(ConfirmationEvent::webhook(Some(payment_id)))
        .await
    {
        Ok(order) => info!(order_id = order.id, "order confirmed via webhook"),
        Err(err) => error!(error = %err, "webhook reconciliation failed"),
    }

    ack
}

/// The notification carries the payment id at data.id, as a string or a
/// number depending on the notification version.
fn webhook_payment_id(payload: &Value) -> Option<String> {
    match payload.pointer("/data/id") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
