use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::gateway::GatewayError;

/// Error body returned on the JSON surface (health/docs); the buyer-facing
/// routes never render this directly, they redirect with a flash message.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Gateway")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Everything that can go wrong between the cart and a confirmed payment.
///
/// One variant per failure the checkout and reconciliation flows can hit;
/// buyer-facing handlers turn these into a redirect with a readable reason,
/// the webhook handler logs them and acknowledges anyway.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("payment method is not configured")]
    Unconfigured,

    #[error("gateway error: {0}")]
    GatewayUnreachable(String),

    #[error("gateway returned no redirect target")]
    NoRedirectTarget,

    #[error("no payment identifier received")]
    MissingIdentifier,

    #[error("payment not approved (status: {0})")]
    NotApproved(String),

    #[error("payment is not linked to an order")]
    UnlinkedPayment,

    #[error("order not found")]
    OrderNotFound,

    #[error("internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    /// Message shown to the buyer when a user-facing path redirects back to
    /// the cart.
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::EmptyCart => "Your cart is empty.".to_string(),
            PaymentError::Unconfigured => {
                "Mercado Pago is not configured. Please contact the store.".to_string()
            }
            PaymentError::GatewayUnreachable(_) => {
                "Mercado Pago could not process the request. Please try again.".to_string()
            }
            PaymentError::NoRedirectTarget => {
                "Mercado Pago did not return a payment link.".to_string()
            }
            PaymentError::MissingIdentifier => {
                "No payment identifier was received from Mercado Pago.".to_string()
            }
            PaymentError::NotApproved(status) => {
                format!("Payment was not approved ({status}).")
            }
            PaymentError::UnlinkedPayment => {
                "The payment could not be linked to an order.".to_string()
            }
            PaymentError::OrderNotFound => "Order not found.".to_string(),
            PaymentError::Internal(_) => {
                "Something went wrong while confirming the payment.".to_string()
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::EmptyCart
            | PaymentError::MissingIdentifier
            | PaymentError::UnlinkedPayment => StatusCode::BAD_REQUEST,
            PaymentError::NotApproved(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PaymentError::OrderNotFound => StatusCode::NOT_FOUND,
            PaymentError::Unconfigured => StatusCode::SERVICE_UNAVAILABLE,
            PaymentError::GatewayUnreachable(_) | PaymentError::NoRedirectTarget => {
                StatusCode::BAD_GATEWAY
            }
            PaymentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sea_orm::DbErr> for PaymentError {
    fn from(err: sea_orm::DbErr) -> Self {
        PaymentError::Internal(format!("database error: {err}"))
    }
}

impl From<GatewayError> for PaymentError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Api { status, content } => {
                PaymentError::GatewayUnreachable(format!("API error (status {status}): {content}"))
            }
            GatewayError::Transport(msg) => PaymentError::GatewayUnreachable(msg),
        }
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string(),
            message: self.user_message(),
            details: Some(self.to_string()),
            timestamp: Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_api_error_maps_to_unreachable_with_context() {
        let err = PaymentError::from(GatewayError::Api {
            status: 401,
            content: "invalid access token".to_string(),
        });
        match err {
            PaymentError::GatewayUnreachable(msg) => {
                assert!(msg.contains("401"));
                assert!(msg.contains("invalid access token"));
            }
            other => panic!("expected GatewayUnreachable, got {other:?}"),
        }
    }

    #[test]
    fn not_approved_carries_gateway_status_for_diagnostics() {
        let err = PaymentError::NotApproved("in_process".to_string());
        assert!(err.to_string().contains("in_process"));
        assert!(err.user_message().contains("in_process"));
    }

    #[test]
    fn user_messages_never_leak_internal_details() {
        let err = PaymentError::Internal("db connection refused at 10.0.0.5".to_string());
        assert!(!err.user_message().contains("10.0.0.5"));
    }
}
