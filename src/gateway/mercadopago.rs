use super::{GatewayError, PaymentGateway, PaymentRecord, PreferencePayload, PreferenceResponse};
use crate::config::MercadoPagoSettings;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::instrument;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// MercadoPago REST client.
///
/// Credentials and base URL are injected at construction; nothing is read
/// from ambient state. The base URL is overridable so tests can point the
/// client at a local mock server.
#[derive(Clone)]
pub struct MercadoPagoClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl MercadoPagoClient {
    pub fn new(settings: &MercadoPagoSettings) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap(),
            base_url: settings.api_url.trim_end_matches('/').to_string(),
            access_token: settings.access_token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let content = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                content,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoClient {
    #[instrument(skip(self, payload), fields(external_reference = %payload.external_reference))]
    async fn create_preference(
        &self,
        payload: &PreferencePayload,
    ) -> Result<PreferenceResponse, GatewayError> {
        let response = self
            .http
            .post(self.url("/checkout/preferences"))
            .bearer_auth(&self.access_token)
            .json(payload)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Self::read_response(response).await
    }

    #[instrument(skip(self))]
    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentRecord, GatewayError> {
        let response = self
            .http
            .get(self.url(&format!("/v1/payments/{payment_id}")))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Self::read_response(response).await
    }
}
