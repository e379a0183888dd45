pub mod checkout;
pub mod reconciliation;

pub use checkout::{CheckoutService, RedirectTarget};
pub use reconciliation::{ConfirmationEvent, ConfirmationSource, ReconciliationService};
