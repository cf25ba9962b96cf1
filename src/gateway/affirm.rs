use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use super::{GatewayCredentials, GatewayError, GatewayTransaction, PaymentGateway};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerError};
use crate::config::AffirmConfig;

#[derive(Debug, Serialize)]
struct AuthorizeRequest<'a> {
    checkout_token: &'a str,
    order_id: &'a str,
}

#[derive(Debug, Serialize)]
struct CaptureRequest<'a> {
    order_id: &'a str,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct Charge {
    id: String,
    amount: i64,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChargeEvent {
    transaction_id: String,
    amount: i64,
    #[serde(default)]
    currency: Option<String>,
}

/// Error body returned by the Affirm API on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Affirm Transactions (v2 charges) client.
#[derive(Clone)]
pub struct AffirmGateway {
    client: reqwest::Client,
    sandbox_base_url: String,
    production_base_url: String,
    /// Budget for the whole authorize + capture exchange
    deadline: Duration,
    breaker: CircuitBreaker,
}

impl AffirmGateway {
    pub fn new(config: &AffirmConfig, breaker: CircuitBreaker) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, config, breaker))
    }

    pub fn with_client(
        client: reqwest::Client,
        config: &AffirmConfig,
        breaker: CircuitBreaker,
    ) -> Self {
        Self {
            client,
            sandbox_base_url: config.sandbox_base_url.trim_end_matches('/').to_string(),
            production_base_url: config.production_base_url.trim_end_matches('/').to_string(),
            deadline: Duration::from_secs(config.timeout_secs),
            breaker,
        }
    }

    fn base_url(&self, credentials: &GatewayCredentials) -> &str {
        if credentials.test_mode {
            &self.sandbox_base_url
        } else {
            &self.production_base_url
        }
    }

    async fn post<B, R>(
        &self,
        credentials: &GatewayCredentials,
        path: &str,
        body: &B,
    ) -> Result<R, GatewayError>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.base_url(credentials), path);
        let response = self
            .client
            .post(&url)
            .basic_auth(
                &credentials.public_api_key,
                Some(&credentials.private_api_key),
            )
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(GatewayError::ProviderUnavailable {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("error").to_string(),
            });
        }
        if !status.is_success() {
            let body: Option<ApiErrorBody> = response.json().await.ok();
            let (code, message) = body
                .map(|b| (b.code, b.message))
                .unwrap_or((None, None));
            return Err(GatewayError::Declined {
                status: status.as_u16(),
                code: code.unwrap_or_else(|| "unknown".to_string()),
                message: message.unwrap_or_else(|| {
                    status.canonical_reason().unwrap_or("error").to_string()
                }),
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }

    async fn void(&self, credentials: &GatewayCredentials, charge_id: &str) {
        let path = format!("/charges/{}/void", charge_id);
        if let Err(err) = self
            .post::<_, serde_json::Value>(credentials, &path, &serde_json::json!({}))
            .await
        {
            warn!(%charge_id, error = %err, "failed to void Affirm charge");
        }
    }

    async fn charge(
        &self,
        credentials: &GatewayCredentials,
        checkout_token: &str,
        amount: Decimal,
        order_reference: &str,
    ) -> Result<GatewayTransaction, GatewayError> {
        let expected_cents = to_cents(amount)?;

        let charge: Charge = self
            .post(
                credentials,
                "/charges",
                &AuthorizeRequest {
                    checkout_token,
                    order_id: order_reference,
                },
            )
            .await?;

        if charge.amount != expected_cents {
            warn!(
                charge_id = %charge.id,
                expected_cents,
                authorized_cents = charge.amount,
                "Affirm authorization amount mismatch, voiding"
            );
            self.void(credentials, &charge.id).await;
            return Err(GatewayError::AmountMismatch {
                expected_cents,
                authorized_cents: charge.amount,
            });
        }

        let captured = self
            .post::<_, ChargeEvent>(
                credentials,
                &format!("/charges/{}/capture", charge.id),
                &CaptureRequest {
                    order_id: order_reference,
                    amount: expected_cents,
                },
            )
            .await;
        let capture = match captured {
            Ok(capture) => capture,
            // The provider may have captured; leave the charge for reconciliation.
            Err(err @ (GatewayError::Timeout | GatewayError::InvalidResponse(_))) => {
                error!(charge_id = %charge.id, error = %err, "Affirm capture outcome unknown");
                return Err(err);
            }
            Err(err) => {
                warn!(charge_id = %charge.id, error = %err, "Affirm capture failed, voiding");
                self.void(credentials, &charge.id).await;
                return Err(err);
            }
        };

        info!(charge_id = %charge.id, transaction_id = %capture.transaction_id, "Affirm charge captured");

        Ok(GatewayTransaction {
            charge_id: charge.id,
            transaction_id: capture.transaction_id,
            amount: Decimal::new(capture.amount, 2),
            currency: capture.currency.or(charge.currency),
        })
    }
}

#[async_trait]
impl PaymentGateway for AffirmGateway {
    #[instrument(skip(self, credentials, checkout_token), fields(test_mode = credentials.test_mode))]
    async fn authorize_and_capture(
        &self,
        credentials: &GatewayCredentials,
        checkout_token: &str,
        amount: Decimal,
        order_reference: &str,
    ) -> Result<GatewayTransaction, GatewayError> {
        let deadline = self.deadline;
        self.breaker
            .call(|| async move {
                let charge = self.charge(credentials, checkout_token, amount, order_reference);
                match tokio::time::timeout(deadline, charge).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(?deadline, "Affirm charge exceeded its deadline");
                        Err(GatewayError::Timeout)
                    }
                }
            })
            .await
            .map_err(|e| match e {
                CircuitBreakerError::CircuitOpen => GatewayError::CircuitOpen,
                CircuitBreakerError::Inner(err) => err,
            })
    }
}

fn map_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(err.to_string())
    }
}

/// Converts a major-unit amount into provider cents, refusing fractional cents.
pub fn to_cents(amount: Decimal) -> Result<i64, GatewayError> {
    let cents = amount * Decimal::ONE_HUNDRED;
    if !cents.fract().is_zero() || cents.is_sign_negative() {
        return Err(GatewayError::InvalidAmount(amount));
    }
    cents.to_i64().ok_or(GatewayError::InvalidAmount(amount))
}
