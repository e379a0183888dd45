use crate::{
    config::AppConfig,
    errors::PaymentError,
    events::{Event, EventSender},
    gateway::PaymentGateway,
    store::{InvoiceStore, NewInvoice, Order, OrderStatus, OrderStore},
};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Which confirmation path delivered the signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConfirmationSource {
    UserReturn,
    Webhook,
}

/// One confirmation signal: its source and the payment identifier it
/// carried, if any.
#[derive(Debug, Clone)]
pub struct ConfirmationEvent {
    pub source: ConfirmationSource,
    pub payment_id: Option<String>,
}

impl ConfirmationEvent {
    pub fn user_return(payment_id: Option<String>) -> Self {
        Self {
            source: ConfirmationSource::UserReturn,
            payment_id,
        }
    }

    pub fn webhook(payment_id: Option<String>) -> Self {
        Self {
            source: ConfirmationSource::Webhook,
            payment_id,
        }
    }
}

/// Confirmation reconciler: fetches the authoritative payment status from
/// the gateway and applies it to the linked order.
///
/// Both confirmation paths run the same logic, so a payment may be
/// reconciled zero, one or two times. The status check in `confirm` is what
/// makes the second run a no-op.
#[derive(Clone)]
pub struct ReconciliationService {
    orders: Arc<dyn OrderStore>,
    invoices: Arc<dyn InvoiceStore>,
    gateway: Arc<dyn PaymentGateway>,
    config: Arc<AppConfig>,
    events: EventSender,
}

impl ReconciliationService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        invoices: Arc<dyn InvoiceStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: Arc<AppConfig>,
        events: EventSender,
    ) -> Self {
        Self {
            orders,
            invoices,
            gateway,
            config,
            events,
        }
    }

    #[instrument(skip(self, event), fields(source = %event.source))]
    pub async fn reconcile(&self, event: ConfirmationEvent) -> Result<Order, PaymentError> {
        let payment_id = event
            .payment_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(PaymentError::MissingIdentifier)?;

        if !self.config.mercadopago.has_credentials() {
            return Err(PaymentError::Unconfigured);
        }

        let payment = self.gateway.fetch_payment(payment_id).await.map_err(|err| {
            error!(payment_id, error = %err, "payment lookup failed");
            PaymentError::from(err)
        })?;

        if !payment.is_approved() {
            return Err(PaymentError::NotApproved(payment.status));
        }

        let order_id = payment
            .external_reference
            .as_deref()
            .and_then(|reference| reference.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .ok_or(PaymentError::UnlinkedPayment)?;

        let order = self
            .orders
            .find(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound)?;

        self.confirm(order, payment_id).await
    }

    /// Applies an approved payment to the order. Safe to run repeatedly: a
    /// confirmation arriving second observes `processing` and skips the
    /// transition, and invoice creation is a no-op once nothing invoiceable
    /// remains.
    async fn confirm(&self, mut order: Order, payment_id: &str) -> Result<Order, PaymentError> {
        if order.status != OrderStatus::Processing {
            self.orders
                .set_status(order.id, OrderStatus::Processing)
                .await?;
            order.status = OrderStatus::Processing;
            self.events
                .send_or_log(Event::PaymentConfirmed {
                    order_id: order.id,
                    payment_id: payment_id.to_string(),
                })
                .await;
            info!(order_id = order.id, payment_id, "order confirmed");
        }

        if order.can_invoice() {
            self.invoices.create(NewInvoice::covering(&order)).await?;
            self.events
                .send_or_log(Event::InvoiceCreated { order_id: order.id })
                .await;
        }

        Ok(order)
    }
}
