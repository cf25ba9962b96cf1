pub mod order;
pub mod payment;
pub mod payment_method;

pub use order::{CheckoutState, Entity as Order};
pub use payment::{Entity as Payment, PaymentState};
pub use payment_method::Entity as PaymentMethod;
