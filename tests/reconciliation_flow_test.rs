//! End-to-end checkout and reconciliation flow over in-memory
//! collaborators: cart to pending order to gateway redirect, then payment
//! confirmation through both paths, exercising the idempotency guarantees.

use async_trait::async_trait;
use mercadopago_checkout::{
    config::{AppConfig, MercadoPagoSettings},
    errors::PaymentError,
    events::EventSender,
    gateway::{
        GatewayError, PaymentGateway, PaymentRecord, PreferencePayload, PreferenceResponse,
    },
    services::{CheckoutService, ConfirmationEvent, ReconciliationService},
    store::{
        Cart, CartLine, CartStore, InvoiceStore, NewInvoice, NewOrder, Order, OrderLine,
        OrderStatus, OrderStore,
    },
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

fn test_config(access_token: &str) -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 8080,
        environment: "test".to_string(),
        log_level: "info".to_string(),
        log_json: false,
        app_url: "https://shop.example.com".to_string(),
        cart_path: "/checkout/cart".to_string(),
        success_path: "/checkout/success".to_string(),
        default_currency: "MXN".to_string(),
        db_max_connections: 5,
        db_connect_timeout_secs: 5,
        mercadopago: MercadoPagoSettings {
            active: true,
            access_token: access_token.to_string(),
            public_key: "TEST-pub".to_string(),
            title: "Mercado Pago".to_string(),
            description: String::new(),
            api_url: "https://api.mercadopago.com".to_string(),
        },
    }
}

/// In-memory order pipeline standing in for the order-management side
#[derive(Default)]
struct InMemoryPipeline {
    carts: Mutex<HashMap<Uuid, (Cart, bool)>>,
    orders: Mutex<HashMap<i64, Order>>,
    invoices: Mutex<Vec<NewInvoice>>,
    next_order_id: Mutex<i64>,
}

impl InMemoryPipeline {
    fn seed_cart(&self, items: Vec<CartLine>) -> Uuid {
        let id = Uuid::new_v4();
        let cart = Cart {
            id,
            currency: "MXN".to_string(),
            items,
        };
        self.carts.lock().unwrap().insert(id, (cart, true));
        id
    }

    fn order(&self, id: i64) -> Order {
        self.orders.lock().unwrap().get(&id).cloned().expect("order")
    }

    fn invoice_count(&self) -> usize {
        self.invoices.lock().unwrap().len()
    }
}

#[async_trait]
impl CartStore for InMemoryPipeline {
    async fn find_active(&self, cart_id: Uuid) -> Result<Option<Cart>, PaymentError> {
        Ok(self
            .carts
            .lock()
            .unwrap()
            .get(&cart_id)
            .filter(|(_, active)| *active)
            .map(|(cart, _)| cart.clone()))
    }

    async fn deactivate(&self, cart_id: Uuid) -> Result<(), PaymentError> {
        if let Some((_, active)) = self.carts.lock().unwrap().get_mut(&cart_id) {
            *active = false;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryPipeline {
    async fn create(&self, new_order: NewOrder) -> Result<Order, PaymentError> {
        let mut next = self.next_order_id.lock().unwrap();
        *next += 1;
        let id = *next;
        drop(next);

        let order = Order {
            id,
            increment_id: format!("ORD-{id:09}"),
            status: OrderStatus::PendingPayment,
            grand_total: new_order.grand_total(),
            currency: new_order.currency.clone(),
            items: new_order
                .items
                .iter()
                .enumerate()
                .map(|(index, line)| OrderLine {
                    id: (index + 1) as i64,
                    sku: line.sku.clone(),
                    name: line.name.clone(),
                    unit_price: line.unit_price,
                    qty_ordered: line.quantity,
                    qty_invoiced: 0,
                })
                .collect(),
        };
        self.orders.lock().unwrap().insert(id, order.clone());
        Ok(order)
    }

    async fn find(&self, order_id: i64) -> Result<Option<Order>, PaymentError> {
        Ok(self.orders.lock().unwrap().get(&order_id).cloned())
    }

    async fn set_status(&self, order_id: i64, status: OrderStatus) -> Result<(), PaymentError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders.get_mut(&order_id).ok_or(PaymentError::OrderNotFound)?;
        order.status = status;
        Ok(())
    }
}

#[async_trait]
impl InvoiceStore for InMemoryPipeline {
    async fn create(&self, invoice: NewInvoice) -> Result<(), PaymentError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(&invoice.order_id)
            .ok_or(PaymentError::OrderNotFound)?;

        let mut covered_any = false;
        for line in &mut order.items {
            let outstanding = (line.qty_ordered - line.qty_invoiced).max(0);
            let quantity = invoice.items.get(&line.id).copied().unwrap_or(0).min(outstanding);
            if quantity > 0 {
                line.qty_invoiced += quantity;
                covered_any = true;
            }
        }
        if covered_any {
            self.invoices.lock().unwrap().push(invoice);
        }
        Ok(())
    }
}

/// Scripted gateway double: records preference payloads and serves
/// registered payment records.
#[derive(Default)]
struct ScriptedGateway {
    preferences: Mutex<Vec<PreferencePayload>>,
    payments: Mutex<HashMap<String, PaymentRecord>>,
}

impl ScriptedGateway {
    fn register_payment(&self, payment_id: &str, status: &str, external_reference: Option<&str>) {
        self.payments.lock().unwrap().insert(
            payment_id.to_string(),
            PaymentRecord {
                id: payment_id.parse().ok(),
                status: status.to_string(),
                external_reference: external_reference.map(str::to_string),
            },
        );
    }

    fn last_preference(&self) -> PreferencePayload {
        self.preferences
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("preference")
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_preference(
        &self,
        payload: &PreferencePayload,
    ) -> Result<PreferenceResponse, GatewayError> {
        self.preferences.lock().unwrap().push(payload.clone());
        Ok(PreferenceResponse {
            id: Some(format!("pref-{}", payload.external_reference)),
            init_point: Some(format!(
                "https://mp.example.com/init/{}",
                payload.external_reference
            )),
            sandbox_init_point: None,
        })
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentRecord, GatewayError> {
        self.payments
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or(GatewayError::Api {
                status: 404,
                content: "Payment not found".to_string(),
            })
    }
}

struct Harness {
    pipeline: Arc<InMemoryPipeline>,
    gateway: Arc<ScriptedGateway>,
    checkout: CheckoutService,
    reconciliation: ReconciliationService,
    _event_rx: mpsc::Receiver<mercadopago_checkout::events::Event>,
}

fn harness(access_token: &str) -> Harness {
    let pipeline = Arc::new(InMemoryPipeline::default());
    let gateway = Arc::new(ScriptedGateway::default());
    let config = Arc::new(test_config(access_token));
    let (tx, rx) = mpsc::channel(64);
    let events = EventSender::new(tx);

    let checkout = CheckoutService::new(
        pipeline.clone(),
        pipeline.clone(),
        gateway.clone(),
        config.clone(),
        events.clone(),
    );
    let reconciliation = ReconciliationService::new(
        pipeline.clone(),
        pipeline.clone(),
        gateway.clone(),
        config,
        events,
    );

    Harness {
        pipeline,
        gateway,
        checkout,
        reconciliation,
        _event_rx: rx,
    }
}

fn one_mug() -> Vec<CartLine> {
    vec![CartLine {
        sku: "MUG-BLUE".to_string(),
        name: "Blue mug".to_string(),
        quantity: 1,
        unit_price: dec!(100.00),
    }]
}

#[tokio::test]
async fn happy_path_confirms_once_across_both_paths() {
    let h = harness("TEST-token");
    let cart_id = h.pipeline.seed_cart(one_mug());

    // Cart -> pending order -> gateway redirect
    let target = h.checkout.initiate(cart_id).await.expect("initiate");
    let preference = h.gateway.last_preference();
    let order_id: i64 = preference.external_reference.parse().expect("numeric reference");
    assert_eq!(order_id, target.order_id);
    assert_eq!(preference.items.len(), 1);
    assert_eq!(preference.items[0].unit_price, dec!(100.00));
    assert_eq!(preference.items[0].currency_id, "MXN");
    assert_eq!(
        h.pipeline.order(order_id).status,
        OrderStatus::PendingPayment
    );

    // The same cart cannot spawn a second order
    let again = h.checkout.initiate(cart_id).await;
    assert!(matches!(again, Err(PaymentError::EmptyCart)));

    // Gateway approves; the user-return path arrives first
    h.gateway
        .register_payment("314", "approved", Some(&order_id.to_string()));
    let confirmed = h
        .reconciliation
        .reconcile(ConfirmationEvent::user_return(Some("314".to_string())))
        .await
        .expect("reconcile");
    assert_eq!(confirmed.id, order_id);

    let order = h.pipeline.order(order_id);
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(h.pipeline.invoice_count(), 1);
    assert!(!order.can_invoice(), "everything should be invoiced");

    // The webhook arrives second: no second transition, no second invoice
    h.reconciliation
        .reconcile(ConfirmationEvent::webhook(Some("314".to_string())))
        .await
        .expect("second reconcile");
    assert_eq!(h.pipeline.order(order_id).status, OrderStatus::Processing);
    assert_eq!(h.pipeline.invoice_count(), 1);
}

#[tokio::test]
async fn back_to_back_confirmations_create_one_invoice() {
    let h = harness("TEST-token");
    let cart_id = h.pipeline.seed_cart(one_mug());
    let target = h.checkout.initiate(cart_id).await.expect("initiate");

    h.gateway
        .register_payment("314", "approved", Some(&target.order_id.to_string()));

    for event in [
        ConfirmationEvent::webhook(Some("314".to_string())),
        ConfirmationEvent::user_return(Some("314".to_string())),
    ] {
        h.reconciliation.reconcile(event).await.expect("reconcile");
    }

    assert_eq!(h.pipeline.invoice_count(), 1);
    assert_eq!(
        h.pipeline.order(target.order_id).status,
        OrderStatus::Processing
    );
}

#[tokio::test]
async fn rejected_payment_leaves_the_order_untouched() {
    let h = harness("TEST-token");
    let cart_id = h.pipeline.seed_cart(one_mug());
    let target = h.checkout.initiate(cart_id).await.expect("initiate");

    h.gateway
        .register_payment("777", "rejected", Some(&target.order_id.to_string()));

    let result = h
        .reconciliation
        .reconcile(ConfirmationEvent::user_return(Some("777".to_string())))
        .await;
    assert!(matches!(result, Err(PaymentError::NotApproved(status)) if status == "rejected"));

    assert_eq!(
        h.pipeline.order(target.order_id).status,
        OrderStatus::PendingPayment
    );
    assert_eq!(h.pipeline.invoice_count(), 0);
}

#[tokio::test]
async fn payment_for_unknown_order_is_rejected() {
    let h = harness("TEST-token");
    h.gateway.register_payment("314", "approved", Some("9999"));

    let result = h
        .reconciliation
        .reconcile(ConfirmationEvent::webhook(Some("314".to_string())))
        .await;
    assert!(matches!(result, Err(PaymentError::OrderNotFound)));
}

#[tokio::test]
async fn unconfigured_service_never_reaches_the_gateway() {
    let h = harness("");
    let cart_id = h.pipeline.seed_cart(one_mug());

    let initiate = h.checkout.initiate(cart_id).await;
    assert!(matches!(initiate, Err(PaymentError::Unconfigured)));
    assert!(h.gateway.preferences.lock().unwrap().is_empty());

    let reconcile = h
        .reconciliation
        .reconcile(ConfirmationEvent::webhook(Some("314".to_string())))
        .await;
    assert!(matches!(reconcile, Err(PaymentError::Unconfigured)));
}

#[tokio::test]
async fn order_totals_follow_cart_contents() {
    let h = harness("TEST-token");
    let cart_id = h.pipeline.seed_cart(vec![
        CartLine {
            sku: "MUG-BLUE".to_string(),
            name: "Blue mug".to_string(),
            quantity: 2,
            unit_price: dec!(75.50),
        },
        CartLine {
            sku: "TEE-RED".to_string(),
            name: "Red tee".to_string(),
            quantity: 1,
            unit_price: dec!(149.00),
        },
    ]);

    let target = h.checkout.initiate(cart_id).await.expect("initiate");
    let order = h.pipeline.order(target.order_id);
    assert_eq!(order.grand_total, dec!(300.00));
    assert_eq!(h.gateway.last_preference().items[0].unit_price, dec!(300.00));
    assert_eq!(order.grand_total, order.items.iter().map(|line| line.unit_price * Decimal::from(line.qty_ordered)).sum::<Decimal>());
}
