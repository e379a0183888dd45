pub mod cart;
pub mod cart_item;
pub mod invoice;
pub mod invoice_item;
pub mod order;
pub mod order_item;

pub use cart::Entity as Cart;
pub use cart_item::Entity as CartItem;
pub use invoice::Entity as Invoice;
pub use invoice_item::Entity as InvoiceItem;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
