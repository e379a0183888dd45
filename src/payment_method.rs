use crate::{config::AppConfig, store::Cart};
use std::sync::Arc;

/// Capability surface a storefront needs from a redirect-style payment
/// method: whether it can be offered for a given cart, and where to send
/// the buyer to start paying.
pub trait PaymentMethod: Send + Sync {
    /// Stable machine identifier of the method
    fn code(&self) -> &'static str;

    /// Display title shown at checkout
    fn title(&self) -> &str;

    fn is_available(&self, cart: &Cart) -> bool;

    /// Entry point the storefront redirects the buyer to
    fn redirect_target(&self) -> String;
}

/// MercadoPago hosted checkout
pub struct MercadoPago {
    config: Arc<AppConfig>,
}

impl MercadoPago {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }
}

impl PaymentMethod for MercadoPago {
    fn code(&self) -> &'static str {
        "mercadopago"
    }

    fn title(&self) -> &str {
        &self.config.mercadopago.title
    }

    fn is_available(&self, cart: &Cart) -> bool {
        self.config.mercadopago.active && !cart.is_empty()
    }

    fn redirect_target(&self) -> String {
        self.config.redirect_url()
    }
}
