//! Payment-page session initialization: builds the Initialize request from
//! an order and the gateway configuration and sends it. The caller is
//! responsible for storing the returned token on the order.

use crate::config::AppConfig;
use crate::entities::order;
use crate::errors::ServiceError;
use crate::money::to_minor_units;
use crate::saferpay::types::{
    Amount, InitializeRequest, InitializeResponse, Notification, Payer, PaymentDescriptor,
    RegisterAlias, ReturnUrls,
};
use crate::saferpay::{SaferpayClient, INITIALIZE_PATH};
use crate::services::templating::{OrderTemplater, PlaceholderTemplater};
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub struct SessionInitializer {
    client: Arc<SaferpayClient>,
    templater: Box<dyn OrderTemplater>,
    public_base_url: String,
}

/// Result of a successful initialization: where to send the payer, plus the
/// session token the caller must persist on the order.
#[derive(Debug, Clone)]
pub struct PaymentSession {
    pub token: String,
    pub expiration: String,
    pub redirect_url: String,
}

impl SessionInitializer {
    pub fn new(client: Arc<SaferpayClient>, config: &AppConfig) -> Self {
        Self {
            client,
            templater: Box::new(PlaceholderTemplater),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The endpoint Saferpay calls server-to-server once the transaction is
    /// authorized. Carries the order id so the notification can be matched
    /// without a payer session.
    pub fn notify_url(&self, order: &order::Model) -> String {
        format!(
            "{}/api/v1/saferpay/notify?order={}",
            self.public_base_url, order.id
        )
    }

    #[instrument(skip(self, order, return_urls), fields(order_id = %order.id))]
    pub async fn initialize(
        &self,
        order: &order::Model,
        return_urls: ReturnUrls,
        language: Option<&str>,
    ) -> Result<PaymentSession, ServiceError> {
        if order.is_paid {
            return Err(ServiceError::Conflict(format!(
                "order {} is already paid",
                order.id
            )));
        }

        let config = self.client.config();

        let payer = language
            .filter(|code| crate::saferpay::types::is_supported_language(code))
            .map(|code| Payer {
                language_code: code.to_string(),
            });

        let request = InitializeRequest {
            terminal_id: config.terminal_id.clone(),
            payment: PaymentDescriptor {
                amount: Amount {
                    value: to_minor_units(order.total_amount, &order.currency)?,
                    currency_code: order.currency.clone(),
                },
                order_id: self.templater.render(&config.order_identifier, order),
                description: self.templater.render(&config.order_description, order),
            },
            notification: Notification {
                notify_url: self.notify_url(order),
            },
            return_urls,
            register_alias: config.request_alias.then(RegisterAlias::random),
            payer,
            payment_methods: (!config.payment_methods.is_empty())
                .then(|| config.payment_methods.clone()),
        };

        if config.debug {
            debug!(
                order_id = %order.id,
                payload = %serde_json::to_string(&request).unwrap_or_default(),
                "Initialize request payload"
            );
        }

        let response: InitializeResponse = self
            .client
            .post(INITIALIZE_PATH, &order.id.to_string(), &request)
            .await?;

        info!(
            order_id = %order.id,
            expiration = %response.expiration,
            "Payment page session initialized"
        );

        Ok(PaymentSession {
            token: response.token,
            expiration: response.expiration,
            redirect_url: response.redirect_url,
        })
    }
}
