/// Gateway id recorded on payments and used as the key into the order's
/// per-gateway data bag.
pub const GATEWAY_ID: &str = "saferpay_paymentpage";

pub mod orders;
pub mod reconcile;
pub mod session;
pub mod templating;
