pub mod mercadopago;

pub use mercadopago::MercadoPagoClient;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Failures the gateway client can report. Provider-level rejections keep
/// the HTTP status and response body for the logs; everything else is a
/// transport problem.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway API error (status {status}): {content}")]
    Api { status: u16, content: String },

    #[error("gateway transport error: {0}")]
    Transport(String),
}

/// One line of a checkout preference. This integration always sends a
/// single line summarizing the whole order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceItem {
    pub title: String,
    pub quantity: u32,
    /// The preferences API wants a JSON number here, not Decimal's default
    /// string form
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub currency_id: String,
}

/// Return URLs for the three gateway outcomes. All three point at the same
/// handler; the gateway reports the outcome in the return query parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

impl BackUrls {
    pub fn shared(url: &str) -> Self {
        Self {
            success: url.to_string(),
            failure: url.to_string(),
            pending: url.to_string(),
        }
    }
}

/// Checkout preference submitted to the gateway to obtain a hosted payment
/// page. Transient: discarded once the gateway hands back the redirect URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferencePayload {
    pub items: Vec<PreferenceItem>,
    pub back_urls: BackUrls,
    /// Stringified order id; carries the order identity through the payment
    /// lifecycle and back
    pub external_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_return: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_url: Option<String>,
}

/// The slice of the gateway's preference response this integration consumes
#[derive(Debug, Clone, Deserialize)]
pub struct PreferenceResponse {
    #[serde(default)]
    pub id: Option<String>,
    /// Hosted payment page the buyer is redirected to
    #[serde(default)]
    pub init_point: Option<String>,
    #[serde(default)]
    pub sandbox_init_point: Option<String>,
}

/// The slice of a gateway payment record this integration consumes
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRecord {
    #[serde(default)]
    pub id: Option<i64>,
    pub status: String,
    #[serde(default)]
    pub external_reference: Option<String>,
}

impl PaymentRecord {
    pub fn is_approved(&self) -> bool {
        self.status == "approved"
    }
}

/// Payment gateway collaborator: creates checkout preferences and fetches
/// authoritative payment status.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_preference(
        &self,
        payload: &PreferencePayload,
    ) -> Result<PreferenceResponse, GatewayError>;

    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentRecord, GatewayError>;
}
