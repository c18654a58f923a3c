use crate::config::SaferpayConfig;
use crate::errors::ServiceError;
use metrics::{counter, histogram};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::types::{ProviderErrorBody, RequestHeader};

/// The supported api version.
pub const SPEC_VERSION: &str = "1.10";

/// Production api url.
pub const API_URL_PROD: &str = "https://www.saferpay.com/api";

/// Test api url.
pub const API_URL_TEST: &str = "https://test.saferpay.com/api";

pub const INITIALIZE_PATH: &str = "/Payment/v1/PaymentPage/Initialize";
pub const ASSERT_PATH: &str = "/Payment/v1/PaymentPage/Assert";
pub const CAPTURE_PATH: &str = "/Payment/v1/Transaction/Capture";

/// Outbound client for the Saferpay JSON API.
///
/// Every call goes through [`SaferpayClient::post`], which merges the
/// request header block into the payload, sends the basic-auth credentials
/// and translates transport/provider failures into
/// [`ServiceError::Provider`]. No retries happen at this layer; the retry
/// indicator is always 0 and replays only come from the provider re-sending
/// its notification.
pub struct SaferpayClient {
    http: reqwest::Client,
    config: SaferpayConfig,
    base_url: String,
}

impl SaferpayClient {
    pub fn new(config: SaferpayConfig) -> Self {
        let base_url = if config.is_live() {
            API_URL_PROD.to_string()
        } else {
            API_URL_TEST.to_string()
        };

        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            config,
            base_url,
        }
    }

    /// Points the client at a different API host. Used by tests to target a
    /// local mock server instead of the mode-selected Saferpay host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Does a POST request using default parameters.
    ///
    /// `path` is the call suffix (e.g. `/Payment/v1/Transaction/Capture`),
    /// `request_id` the unique identifier for this set of transactions
    /// (the order uuid throughout this gateway).
    pub async fn post<T, B>(&self, path: &str, request_id: &str, body: &B) -> Result<T, ServiceError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let mut payload = serde_json::to_value(body)
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;

        let header = RequestHeader {
            spec_version: SPEC_VERSION.to_string(),
            customer_id: self.config.customer_id.clone(),
            request_id: request_id.to_string(),
            retry_indicator: 0,
        };
        match payload {
            Value::Object(ref mut map) => {
                map.insert(
                    "RequestHeader".to_string(),
                    serde_json::to_value(&header)
                        .map_err(|e| ServiceError::SerializationError(e.to_string()))?,
                );
            }
            _ => {
                return Err(ServiceError::SerializationError(
                    "request payload must be a JSON object".to_string(),
                ))
            }
        }

        let url = format!("{}{}", self.base_url, path);
        debug!(%url, %request_id, "Sending Saferpay request");

        let start = Instant::now();
        let result = self
            .http
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("Content-Type", "application/json; charset=utf-8")
            .header("Accept", "application/json")
            .json(&payload)
            .send()
            .await;
        histogram!("saferpay_client.request.duration", start.elapsed(), "path" => path.to_string());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                counter!("saferpay_client.request.transport_error", 1, "path" => path.to_string());
                return Err(ServiceError::provider_transport(format!(
                    "Transport error: {}.",
                    e
                )));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(self.provider_failure(path, status, response).await);
        }

        counter!("saferpay_client.request.ok", 1, "path" => path.to_string());
        response.json::<T>().await.map_err(|e| {
            ServiceError::provider_transport(format!("Failed to decode response: {}.", e))
        })
    }

    /// Builds the combined failure detail for a non-success HTTP status,
    /// appending the provider error name/message when the body decodes.
    async fn provider_failure(
        &self,
        path: &str,
        status: StatusCode,
        response: reqwest::Response,
    ) -> ServiceError {
        counter!("saferpay_client.request.provider_error", 1, "path" => path.to_string());

        let mut messages = vec![format!("HTTP status {}.", status)];
        match response.text().await {
            Ok(body) if !body.is_empty() => {
                match serde_json::from_str::<ProviderErrorBody>(&body) {
                    Ok(error) => {
                        messages.push(format!("Error name: {}", error.error_name));
                        messages.push(format!("Error message: {}", error.error_message));
                    }
                    Err(_) => {
                        warn!(%path, %status, "Saferpay error body was not decodable");
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(%path, %status, error = %e, "Failed to read Saferpay error body");
            }
        }

        ServiceError::Provider { messages }
    }

    pub fn config(&self) -> &SaferpayConfig {
        &self.config
    }
}
