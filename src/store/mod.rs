pub mod db;

pub use db::{SeaOrmCartStore, SeaOrmInvoiceStore, SeaOrmOrderStore};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::PaymentError;

/// Order lifecycle states this service knows by name. Everything else the
/// order-management side defines lands in `Other` untouched.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Processing,
    Completed,
    Canceled,
    #[strum(default)]
    Other(String),
}

/// Active shopping cart as seen by the checkout flow
#[derive(Debug, Clone)]
pub struct Cart {
    pub id: Uuid,
    pub currency: String,
    pub items: Vec<CartLine>,
}

#[derive(Debug, Clone)]
pub struct CartLine {
    pub sku: String,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.items.iter().all(|line| line.quantity <= 0)
    }

    pub fn grand_total(&self) -> Decimal {
        self.items
            .iter()
            .map(|line| line.unit_price * Decimal::from(line.quantity))
            .sum()
    }
}

/// Order line as seen by the reconciliation flow
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub unit_price: Decimal,
    pub qty_ordered: i32,
    pub qty_invoiced: i32,
}

impl OrderLine {
    pub fn qty_to_invoice(&self) -> i32 {
        (self.qty_ordered - self.qty_invoiced).max(0)
    }
}

/// Order as seen by this service: identity, status, money, lines
#[derive(Debug, Clone)]
pub struct Order {
    pub id: i64,
    pub increment_id: String,
    pub status: OrderStatus,
    pub grand_total: Decimal,
    pub currency: String,
    pub items: Vec<OrderLine>,
}

impl Order {
    /// Whether any line still has invoiceable quantity outstanding. This is
    /// the guard that makes invoice creation a no-op on a fully invoiced
    /// order.
    pub fn can_invoice(&self) -> bool {
        self.items.iter().any(|line| line.qty_to_invoice() > 0)
    }
}

/// Data for a new pending order, built from a cart
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub currency: String,
    pub items: Vec<CartLine>,
}

impl NewOrder {
    pub fn from_cart(cart: &Cart, fallback_currency: &str) -> Self {
        let currency = if cart.currency.trim().is_empty() {
            fallback_currency.to_string()
        } else {
            cart.currency.clone()
        };
        Self {
            currency,
            items: cart.items.clone(),
        }
    }

    pub fn grand_total(&self) -> Decimal {
        self.items
            .iter()
            .map(|line| line.unit_price * Decimal::from(line.quantity))
            .sum()
    }
}

/// Data for a new invoice: order id plus order-item id -> quantity to bill
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub order_id: i64,
    pub items: HashMap<i64, i32>,
}

impl NewInvoice {
    /// Invoice covering all remaining invoiceable quantity per line item
    pub fn covering(order: &Order) -> Self {
        let items = order
            .items
            .iter()
            .filter(|line| line.qty_to_invoice() > 0)
            .map(|line| (line.id, line.qty_to_invoice()))
            .collect();
        Self {
            order_id: order.id,
            items,
        }
    }
}

/// Cart collaborator: fetch the active cart and take it out of circulation
/// once an order has been spawned from it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_active(&self, cart_id: Uuid) -> Result<Option<Cart>, PaymentError>;

    /// Best-effort duplicate-order prevention; missing carts are ignored.
    async fn deactivate(&self, cart_id: Uuid) -> Result<(), PaymentError>;
}

/// Order collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create(&self, order: NewOrder) -> Result<Order, PaymentError>;

    async fn find(&self, order_id: i64) -> Result<Option<Order>, PaymentError>;

    async fn set_status(&self, order_id: i64, status: OrderStatus) -> Result<(), PaymentError>;
}

/// Invoice collaborator. Creation clamps to the outstanding quantity per
/// line, so re-invoking against a fully invoiced order changes nothing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn create(&self, invoice: NewInvoice) -> Result<(), PaymentError>;
}
