//! Saferpay Payment Page Gateway
//!
//! Off-site checkout against the Saferpay JSON API: session initialization,
//! payer return handling and idempotent server-to-server notification
//! processing.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod hooks;
pub mod lock;
pub mod migrator;
pub mod money;
pub mod openapi;
pub mod saferpay;
pub mod services;

use axum::Router;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::hooks::AssertHooks;
use crate::lock::LockManager;
use crate::saferpay::SaferpayClient;
use crate::services::orders::OrderService;
use crate::services::reconcile::ReconcileService;
use crate::services::session::SessionInitializer;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub saferpay: Arc<SaferpayClient>,
    pub lock: Arc<dyn LockManager>,
    pub hooks: Arc<AssertHooks>,
    pub redis: Option<Arc<redis::Client>>,
}

impl AppState {
    pub fn orders(&self) -> OrderService {
        OrderService::new(self.db.clone())
    }

    pub fn session_initializer(&self) -> SessionInitializer {
        SessionInitializer::new(self.saferpay.clone(), &self.config)
    }

    pub fn reconciler(&self) -> ReconcileService {
        ReconcileService::new(
            self.db.clone(),
            self.saferpay.clone(),
            self.orders(),
            self.hooks.clone(),
        )
    }
}

// Common response wrapper
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
        }
    }
}

/// Routes under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    handlers::saferpay::routes()
}

/// Full application router: versioned API, health and the OpenAPI document.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_v1_routes())
        .merge(handlers::health::routes())
        .merge(openapi::routes())
        .with_state(state)
}
