use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use saferpay_gateway::{
    config::{AppConfig, SaferpayConfig},
    db,
    entities::order,
    hooks::AssertHooks,
    lock::InMemoryLockManager,
    saferpay::SaferpayClient,
    services::GATEWAY_ID,
    AppState,
};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::MockServer;

/// Helper harness: application state backed by an in-memory SQLite database,
/// an in-process lock manager and a wiremock stand-in for the Saferpay API.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub saferpay_server: MockServer,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::with_config_tweak(|_| {}).await
    }

    /// Like [`TestApp::new`] but lets the test adjust the configuration
    /// before the state is built (e.g. disable autocomplete).
    pub async fn with_config_tweak(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = test_config();
        tweak(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let saferpay_server = MockServer::start().await;
        let client = SaferpayClient::new(cfg.saferpay.clone()).with_base_url(saferpay_server.uri());

        let state = AppState {
            db: Arc::new(pool),
            config: cfg.clone(),
            saferpay: Arc::new(client),
            lock: Arc::new(InMemoryLockManager::new()),
            hooks: Arc::new(AssertHooks::new()),
            redis: None,
        };

        let router = saferpay_gateway::app_router(state.clone());

        Self {
            router,
            state,
            saferpay_server,
        }
    }

    /// Send a request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Insert an order row and return it as stored.
    pub async fn seed_order(
        &self,
        order_number: &str,
        amount: Decimal,
        currency: &str,
    ) -> order::Model {
        let active = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_number: Set(order_number.to_string()),
            total_amount: Set(amount),
            currency: Set(currency.to_string()),
            is_paid: Set(false),
            data: Set(json!({})),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };
        active
            .insert(&*self.state.db)
            .await
            .expect("seed order for tests")
    }

    /// Insert an order that already carries a payment page session token,
    /// as it would after a checkout call.
    pub async fn seed_order_with_token(
        &self,
        order_number: &str,
        amount: Decimal,
        currency: &str,
        token: &str,
    ) -> order::Model {
        let order = self.seed_order(order_number, amount, currency).await;
        self.state
            .orders()
            .store_session_token(&order, GATEWAY_ID, token)
            .await
            .expect("store session token for tests")
    }

    /// Re-read an order from storage.
    pub async fn reload_order(&self, order_id: Uuid) -> order::Model {
        order::Entity::find_by_id(order_id)
            .one(&*self.state.db)
            .await
            .expect("order lookup in tests")
            .expect("seeded order should exist")
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        redis_url: "redis://127.0.0.1:6379".to_string(),
        host: "127.0.0.1".to_string(),
        port: 18_080,
        environment: "test".to_string(),
        log_level: "info".to_string(),
        log_json: false,
        auto_migrate: false,
        public_base_url: "https://shop.example.com".to_string(),
        lock_namespace: "saferpay:lock".to_string(),
        lock_ttl_secs: 300,
        return_wait_secs: 1,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
        db_idle_timeout_secs: 600,
        db_acquire_timeout_secs: 5,
        saferpay: SaferpayConfig {
            customer_id: "123456".to_string(),
            terminal_id: "17999999".to_string(),
            username: "API_123456_99999999".to_string(),
            password: "JsonApiPwd1_test".to_string(),
            order_identifier: "{order_number}".to_string(),
            order_description: "Order {order_number}".to_string(),
            autocomplete: true,
            debug: false,
            request_alias: false,
            payment_methods: vec![],
            mode: "test".to_string(),
        },
    }
}

/// Read a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}

/// Read a response body as a UTF-8 string.
pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    String::from_utf8(bytes.to_vec()).expect("response body should be UTF-8")
}
