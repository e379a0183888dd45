use super::{
    Cart, CartLine, CartStore, InvoiceStore, NewInvoice, NewOrder, Order, OrderLine, OrderStatus,
    OrderStore,
};
use crate::{
    entities::{cart, cart_item, invoice, invoice_item, order, order_item},
    errors::PaymentError,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Cart store over sea-orm
#[derive(Clone)]
pub struct SeaOrmCartStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmCartStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CartStore for SeaOrmCartStore {
    async fn find_active(&self, cart_id: Uuid) -> Result<Option<Cart>, PaymentError> {
        let Some(model) = cart::Entity::find_by_id(cart_id)
            .filter(cart::Column::Status.eq(cart::CartStatus::Active))
            .one(&*self.db)
            .await?
        else {
            return Ok(None);
        };

        let items = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .all(&*self.db)
            .await?;

        Ok(Some(Cart {
            id: model.id,
            currency: model.currency,
            items: items
                .into_iter()
                .map(|item| CartLine {
                    sku: item.sku,
                    name: item.name,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
        }))
    }

    #[instrument(skip(self))]
    async fn deactivate(&self, cart_id: Uuid) -> Result<(), PaymentError> {
        if let Some(model) = cart::Entity::find_by_id(cart_id).one(&*self.db).await? {
            let mut active: cart::ActiveModel = model.into();
            active.status = Set(cart::CartStatus::Inactive);
            active.updated_at = Set(Utc::now());
            active.update(&*self.db).await?;
            info!("deactivated cart {cart_id}");
        }
        Ok(())
    }
}

/// Order store over sea-orm
#[derive(Clone)]
pub struct SeaOrmOrderStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmOrderStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn to_domain(model: order::Model, items: Vec<order_item::Model>) -> Order {
        let status = model
            .status
            .parse()
            .unwrap_or(OrderStatus::Other(model.status.clone()));
        Order {
            id: model.id,
            increment_id: model.increment_id,
            status,
            grand_total: model.grand_total,
            currency: model.currency,
            items: items
                .into_iter()
                .map(|item| OrderLine {
                    id: item.id,
                    sku: item.sku,
                    name: item.name,
                    unit_price: item.unit_price,
                    qty_ordered: item.qty_ordered,
                    qty_invoiced: item.qty_invoiced,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl OrderStore for SeaOrmOrderStore {
    #[instrument(skip(self, new_order))]
    async fn create(&self, new_order: NewOrder) -> Result<Order, PaymentError> {
        let txn = self.db.begin().await?;

        let inserted = order::ActiveModel {
            increment_id: Set(String::new()),
            status: Set(OrderStatus::PendingPayment.to_string()),
            grand_total: Set(new_order.grand_total()),
            currency: Set(new_order.currency.clone()),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        // The display number needs the generated id
        let order_id = inserted.id;
        let mut active: order::ActiveModel = inserted.into();
        active.increment_id = Set(format!("ORD-{order_id:09}"));
        let model = active.update(&txn).await?;

        let mut lines = Vec::with_capacity(new_order.items.len());
        for item in &new_order.items {
            let line = order_item::ActiveModel {
                order_id: Set(model.id),
                sku: Set(item.sku.clone()),
                name: Set(item.name.clone()),
                unit_price: Set(item.unit_price),
                qty_ordered: Set(item.quantity),
                qty_invoiced: Set(0),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            lines.push(line);
        }

        txn.commit().await?;

        info!(order_id = model.id, increment_id = %model.increment_id, "created pending order");
        Ok(Self::to_domain(model, lines))
    }

    async fn find(&self, order_id: i64) -> Result<Option<Order>, PaymentError> {
        let Some(model) = order::Entity::find_by_id(order_id).one(&*self.db).await? else {
            return Ok(None);
        };

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        Ok(Some(Self::to_domain(model, items)))
    }

    #[instrument(skip(self))]
    async fn set_status(&self, order_id: i64, status: OrderStatus) -> Result<(), PaymentError> {
        let active = order::ActiveModel {
            id: Set(order_id),
            status: Set(status.to_string()),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        };
        active.update(&*self.db).await?;
        Ok(())
    }
}

/// Invoice store over sea-orm.
///
/// Requested quantities are clamped to the outstanding quantity per line
/// inside one transaction, which is what keeps double invoice creation from
/// over-billing when two confirmations race.
#[derive(Clone)]
pub struct SeaOrmInvoiceStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmInvoiceStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InvoiceStore for SeaOrmInvoiceStore {
    #[instrument(skip(self, new_invoice), fields(order_id = new_invoice.order_id))]
    async fn create(&self, new_invoice: NewInvoice) -> Result<(), PaymentError> {
        let txn = self.db.begin().await?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(new_invoice.order_id))
            .all(&txn)
            .await?;

        let mut covered = Vec::new();
        let mut total = Decimal::ZERO;
        for item in items {
            let outstanding = (item.qty_ordered - item.qty_invoiced).max(0);
            let quantity = new_invoice
                .items
                .get(&item.id)
                .copied()
                .unwrap_or(0)
                .min(outstanding);
            if quantity > 0 {
                total += item.unit_price * Decimal::from(quantity);
                covered.push((item, quantity));
            }
        }

        // Nothing left to bill: the order store's own guard decided this is
        // a no-op
        if covered.is_empty() {
            txn.commit().await?;
            return Ok(());
        }

        let inserted = invoice::ActiveModel {
            order_id: Set(new_invoice.order_id),
            total: Set(total),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for (item, quantity) in covered {
            invoice_item::ActiveModel {
                invoice_id: Set(inserted.id),
                order_item_id: Set(item.id),
                quantity: Set(quantity),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            let qty_invoiced = item.qty_invoiced + quantity;
            let mut active: order_item::ActiveModel = item.into();
            active.qty_invoiced = Set(qty_invoiced);
            active.update(&txn).await?;
        }

        txn.commit().await?;

        info!(
            invoice_id = inserted.id,
            order_id = new_invoice.order_id,
            %total,
            "created invoice"
        );
        Ok(())
    }
}
