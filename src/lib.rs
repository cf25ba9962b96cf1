//! Affirm checkout callbacks
//!
//! Confirms financed checkouts coming back from Affirm, records the captured
//! payment and moves the order forward in its checkout.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{middleware, routing::get, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::timeout::TimeoutLayer;

use crate::{
    circuit_breaker::CircuitBreaker,
    config::AppConfig,
    gateway::{AffirmGateway, GatewayError, PaymentGateway},
    services::affirm_confirmation::AffirmConfirmationService,
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: AppConfig,
    pub confirmation: AffirmConfirmationService,
}

impl AppState {
    /// Wires services around an existing gateway.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: AppConfig,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let confirmation = AffirmConfirmationService::new(db.clone(), gateway);
        Self {
            db,
            config,
            confirmation,
        }
    }

    /// Wires services around the Affirm HTTP client built from `config`.
    pub fn with_affirm(
        db: Arc<DatabaseConnection>,
        config: AppConfig,
    ) -> Result<Self, GatewayError> {
        let breaker = CircuitBreaker::new("affirm", config.circuit_breaker());
        let gateway = AffirmGateway::new(&config.affirm, breaker)?;
        Ok(Self::new(db, config, Arc::new(gateway)))
    }
}

/// Full application router with tracing, timeouts and request ids.
pub fn app_router(state: AppState) -> Router {
    let request_timeout = state.config.request_timeout();

    Router::new()
        .nest("/affirm", handlers::affirm::affirm_routes())
        .route("/health", get(handlers::health::health_check))
        .merge(openapi::openapi_routes())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(crate::tracing::configure_http_tracing())
        .layer(middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}
