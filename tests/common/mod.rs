#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use affirm_checkout::{
    app_router,
    config::AppConfig,
    db,
    entities::{order, payment, payment_method, CheckoutState},
    gateway::{GatewayCredentials, GatewayError, GatewayTransaction, PaymentGateway},
    services::payments,
    AppState,
};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use tempfile::TempDir;
use tower::ServiceExt;

/// What the stub gateway answers with.
#[derive(Clone)]
pub enum StubOutcome {
    Capture,
    Fail(fn() -> GatewayError),
}

/// In-process gateway that counts calls and answers with a fixed outcome.
pub struct StubGateway {
    outcome: Mutex<StubOutcome>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubGateway {
    pub fn capturing() -> Self {
        Self::with_outcome(StubOutcome::Capture)
    }

    pub fn failing(err: fn() -> GatewayError) -> Self {
        Self::with_outcome(StubOutcome::Fail(err))
    }

    pub fn with_outcome(outcome: StubOutcome) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Holds every call for `delay` so concurrent requests overlap.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn authorize_and_capture(
        &self,
        _credentials: &GatewayCredentials,
        checkout_token: &str,
        amount: Decimal,
        _order_reference: &str,
    ) -> Result<GatewayTransaction, GatewayError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let outcome = self.outcome.lock().unwrap().clone();
        match outcome {
            StubOutcome::Capture => Ok(GatewayTransaction {
                charge_id: format!("CHG-{}", checkout_token),
                transaction_id: format!("TXN-{}", call),
                amount,
                currency: Some("USD".to_string()),
            }),
            StubOutcome::Fail(make_err) => Err(make_err()),
        }
    }
}

/// Router plus a migrated temp-file SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub db: Arc<DatabaseConnection>,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        let (cfg, dir) = test_config();
        Self::build(cfg, dir, |db, cfg| AppState::new(db, cfg, gateway)).await
    }

    /// Uses the real Affirm client pointed at `affirm_base_url` for both modes.
    pub async fn with_affirm_api(affirm_base_url: &str) -> Self {
        Self::with_affirm_api_configured(affirm_base_url, |_| {}).await
    }

    /// Like [`TestApp::with_affirm_api`], with a hook to adjust the config.
    pub async fn with_affirm_api_configured<F>(affirm_base_url: &str, configure: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let (mut cfg, dir) = test_config();
        cfg.affirm.sandbox_base_url = affirm_base_url.to_string();
        cfg.affirm.production_base_url = affirm_base_url.to_string();
        cfg.affirm.timeout_secs = 2;
        configure(&mut cfg);
        Self::build(cfg, dir, |db, cfg| {
            AppState::with_affirm(db, cfg).expect("failed to build Affirm client")
        })
        .await
    }

    async fn build<F>(cfg: AppConfig, dir: TempDir, make_state: F) -> Self
    where
        F: FnOnce(Arc<DatabaseConnection>, AppConfig) -> AppState,
    {
        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db = Arc::new(pool);
        let state = make_state(db.clone(), cfg);
        let router = app_router(state.clone());

        Self {
            router,
            state,
            db,
            _dir: dir,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Posts the confirmation form; `None` fields are left out of the body.
    pub async fn post_confirm(
        &self,
        order_id: Option<&str>,
        payment_method_id: Option<&str>,
        checkout_token: Option<&str>,
    ) -> axum::response::Response {
        let body = [
            ("order_id", order_id),
            ("payment_method_id", payment_method_id),
            ("checkout_token", checkout_token),
        ]
        .iter()
        .filter_map(|(key, value)| value.map(|v| format!("{}={}", key, v)))
        .collect::<Vec<_>>()
        .join("&");

        let request = Request::builder()
            .method(Method::POST)
            .uri("/affirm/confirm")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("failed to build request");
        self.request(request).await
    }

    /// Posts a raw body with the given content type to the confirm endpoint.
    pub async fn post_confirm_raw(&self, content_type: &str, body: &str) -> axum::response::Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/affirm/confirm")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body.to_string()))
            .expect("failed to build request");
        self.request(request).await
    }

    /// Polls until `order_id` has `count` payments or a few seconds pass.
    pub async fn wait_for_payments(&self, order_id: i32, count: usize) -> Vec<payment::Model> {
        let mut found = Vec::new();
        for _ in 0..50 {
            found = self.payments_for(order_id).await;
            if found.len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        found
    }

    pub async fn get(&self, uri: &str) -> axum::response::Response {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("failed to build request");
        self.request(request).await
    }

    pub async fn seed_order(&self, number: &str, state: CheckoutState, total: Decimal) -> order::Model {
        let now = Utc::now();
        order::ActiveModel {
            number: Set(number.to_string()),
            state: Set(state),
            total: Set(total),
            currency: Set("USD".to_string()),
            email: Set(Some("shopper@example.com".to_string())),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            version: Set(1),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .expect("failed to seed order")
    }

    pub async fn seed_affirm_method(&self) -> payment_method::Model {
        payment_method::ActiveModel {
            name: Set("Affirm".to_string()),
            kind: Set(payment_method::AFFIRM_KIND.to_string()),
            public_api_key: Set("PUBLIC".to_string()),
            private_api_key: Set("PRIVATE".to_string()),
            test_mode: Set(true),
            active: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .expect("failed to seed payment method")
    }

    pub async fn reload_order(&self, id: i32) -> order::Model {
        order::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .expect("failed to load order")
            .expect("order disappeared")
    }

    pub async fn payments_for(&self, order_id: i32) -> Vec<payment::Model> {
        payments::for_order(&*self.db, order_id)
            .await
            .expect("failed to load payments")
    }
}

fn test_config() -> (AppConfig, TempDir) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let db_path = dir.path().join("checkout_test.db");

    let mut cfg = AppConfig::new(
        format!("sqlite://{}?mode=rwc", db_path.display()),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    cfg.db_max_connections = 4;
    cfg.db_min_connections = 1;
    (cfg, dir)
}

pub fn location(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    serde_json::from_slice(&bytes).expect("body is not json")
}
