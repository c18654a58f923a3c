//! Typed request/response schemas for the three Saferpay JSON API calls
//! used by this gateway. Field names follow the wire format so that
//! missing or renamed fields fail at decode time instead of deep inside
//! the orchestrator.

use serde::{Deserialize, Serialize};

/// Saferpay transaction status for an authorized transaction.
pub const TRANSACTION_AUTHORIZED: &str = "AUTHORIZED";

/// Saferpay transaction status for a captured transaction.
pub const TRANSACTION_CAPTURED: &str = "CAPTURED";

/// Request header block merged into every outbound payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestHeader {
    pub spec_version: String,
    pub customer_id: String,
    pub request_id: String,
    pub retry_indicator: u8,
}

/// Amount in minor units plus ISO currency code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Amount {
    pub value: i64,
    pub currency_code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PaymentDescriptor {
    pub amount: Amount,
    pub order_id: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Notification {
    pub notify_url: String,
}

/// The three URLs the payment page redirects the payer back to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReturnUrls {
    pub success: String,
    pub fail: String,
    pub abort: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegisterAlias {
    pub id_generator: String,
}

impl RegisterAlias {
    pub fn random() -> Self {
        Self {
            id_generator: "RANDOM".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Payer {
    pub language_code: String,
}

/// Body of `/Payment/v1/PaymentPage/Initialize`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InitializeRequest {
    pub terminal_id: String,
    pub payment: PaymentDescriptor,
    pub notification: Notification,
    pub return_urls: ReturnUrls,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub register_alias: Option<RegisterAlias>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<Payer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_methods: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InitializeResponse {
    pub token: String,
    pub expiration: String,
    pub redirect_url: String,
}

/// Body of `/Payment/v1/PaymentPage/Assert`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssertRequest {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Transaction {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Alias {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegistrationResult {
    pub alias: Alias,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssertResponse {
    pub transaction: Transaction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_result: Option<RegistrationResult>,
}

/// Body of `/Payment/v1/Transaction/Capture`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactionReference {
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CaptureRequest {
    pub transaction_reference: TransactionReference,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CaptureResponse {
    pub status: String,
}

/// Provider error body, see https://saferpay.github.io/jsonapi/#errorhandling
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProviderErrorBody {
    pub error_name: String,
    pub error_message: String,
}

/// Language codes supported by the Saferpay payment page.
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "de", "en", "fr", "da", "cs", "es", "hr", "it", "hu", "nl", "no", "pl", "pt", "ru", "ro",
    "sk", "sl", "fi", "sv", "tr", "el", "ja", "zh",
];

/// Payment method identifiers accepted by the gateway configuration.
pub const KNOWN_PAYMENT_METHODS: &[&str] = &[
    "ALIPAY",
    "AMEX",
    "BANCONTACT",
    "BONUS",
    "DINERS",
    "DIRECTDEBIT",
    "EPRZELEWY",
    "EPS",
    "GIROPAY",
    "IDEAL",
    "INVOICE",
    "JCB",
    "MAESTRO",
    "MASTERCARD",
    "MYONE",
    "PAYPAL",
    "PAYDIREKT",
    "POSTCARD",
    "POSTFINANCE",
    "SAFERPAYTEST",
    "SOFORT",
    "TWINT",
    "UNIONPAY",
    "VISA",
    "VPAY",
];

pub fn is_supported_language(code: &str) -> bool {
    SUPPORTED_LANGUAGES.contains(&code)
}

pub fn is_known_payment_method(method: &str) -> bool {
    KNOWN_PAYMENT_METHODS.contains(&method)
}
