pub mod health;
pub mod saferpay;

pub use crate::AppState;
