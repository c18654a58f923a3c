//! Extension points invoked after a successful Assert, before the payment
//! row is written. Observers can inspect the provider response (e.g. to pick
//! up a registered card alias) and adjust the pending payment. Observer
//! failures are logged and do not abort reconciliation.

use crate::entities::{order, payment};
use crate::saferpay::types::AssertResponse;
use async_trait::async_trait;
use tracing::warn;

#[async_trait]
pub trait AssertObserver: Send + Sync {
    /// Name used in logs when the observer fails.
    fn name(&self) -> &str;

    async fn on_assert(
        &self,
        response: &AssertResponse,
        order: &order::Model,
        payment: &mut payment::ActiveModel,
    ) -> anyhow::Result<()>;
}

/// Registry of observers, invoked in registration order.
#[derive(Default)]
pub struct AssertHooks {
    observers: Vec<Box<dyn AssertObserver>>,
}

impl AssertHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Box<dyn AssertObserver>) {
        self.observers.push(observer);
    }

    pub async fn notify(
        &self,
        response: &AssertResponse,
        order: &order::Model,
        payment: &mut payment::ActiveModel,
    ) {
        for observer in &self.observers {
            if let Err(e) = observer.on_assert(response, order, payment).await {
                warn!(
                    observer = observer.name(),
                    order_id = %order.id,
                    error = %e,
                    "Assert observer failed, continuing"
                );
            }
        }
    }
}
