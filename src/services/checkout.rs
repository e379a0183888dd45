use crate::{
    config::AppConfig,
    errors::PaymentError,
    events::{Event, EventSender},
    gateway::{BackUrls, PaymentGateway, PreferenceItem, PreferencePayload},
    store::{CartStore, NewOrder, Order, OrderStore},
};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Where to send the buyer next: the gateway's hosted payment page
#[derive(Debug, Clone)]
pub struct RedirectTarget {
    pub url: String,
    pub order_id: i64,
}

/// Intent initiator: turns an active cart into a pending order plus a
/// gateway checkout preference, and hands back the redirect URL.
///
/// All collaborators are injected at construction; the service holds no
/// ambient state.
#[derive(Clone)]
pub struct CheckoutService {
    carts: Arc<dyn CartStore>,
    orders: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    config: Arc<AppConfig>,
    events: EventSender,
}

impl CheckoutService {
    pub fn new(
        carts: Arc<dyn CartStore>,
        orders: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: Arc<AppConfig>,
        events: EventSender,
    ) -> Self {
        Self {
            carts,
            orders,
            gateway,
            config,
            events,
        }
    }

    /// Creates a pending order from the cart and obtains the gateway
    /// redirect.
    ///
    /// The pending order is left in place when a later step fails; it
    /// carries no charge yet and the buyer can retry from the cart view.
    #[instrument(skip(self))]
    pub async fn initiate(&self, cart_id: Uuid) -> Result<RedirectTarget, PaymentError> {
        let cart = self
            .carts
            .find_active(cart_id)
            .await?
            .ok_or(PaymentError::EmptyCart)?;
        if cart.is_empty() {
            return Err(PaymentError::EmptyCart);
        }

        let order = self
            .orders
            .create(NewOrder::from_cart(&cart, &self.config.default_currency))
            .await?;
        self.events.send_or_log(Event::OrderCreated(order.id)).await;

        // Same cart must not spawn a second pending order
        self.carts.deactivate(cart.id).await?;
        self.events
            .send_or_log(Event::CartDeactivated(cart.id))
            .await;

        if !self.config.mercadopago.has_credentials() {
            return Err(PaymentError::Unconfigured);
        }

        let payload = self.build_preference(&order);
        let preference = self
            .gateway
            .create_preference(&payload)
            .await
            .map_err(|err| {
                error!(order_id = order.id, error = %err, "preference creation failed");
                PaymentError::from(err)
            })?;

        let url = preference
            .init_point
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                error!(order_id = order.id, "preference response carried no init_point");
                PaymentError::NoRedirectTarget
            })?;

        info!(order_id = order.id, "redirecting buyer to gateway");
        Ok(RedirectTarget {
            url,
            order_id: order.id,
        })
    }

    fn build_preference(&self, order: &Order) -> PreferencePayload {
        let currency = if order.currency.trim().is_empty() {
            self.config.default_currency.clone()
        } else {
            order.currency.clone()
        };

        // Sandboxes reject auto_return and webhooks over plain http, so both
        // ride on the transport policy rather than a separate toggle
        let (auto_return, notification_url) = if self.config.is_secure_transport() {
            (
                Some("approved".to_string()),
                Some(self.config.webhook_url()),
            )
        } else {
            (None, None)
        };

        PreferencePayload {
            items: vec![PreferenceItem {
                title: format!("Order #{}", order.increment_id),
                quantity: 1,
                unit_price: order.grand_total,
                currency_id: currency,
            }],
            back_urls: BackUrls::shared(&self.config.return_url()),
            external_reference: order.id.to_string(),
            auto_return,
            notification_url,
        }
    }
}
