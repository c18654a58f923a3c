//! Saferpay JSON API adapter: the outbound client plus the typed wire
//! schemas for the three calls this gateway uses (Initialize, Assert,
//! Capture).

pub mod client;
pub mod types;

pub use client::{SaferpayClient, ASSERT_PATH, CAPTURE_PATH, INITIALIZE_PATH, SPEC_VERSION};
