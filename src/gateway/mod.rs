//! Payment gateway seam.
//!
//! The confirmation flow only needs one capability from a provider: turn a
//! client-side checkout token into captured funds. [`PaymentGateway`] is that
//! capability; [`affirm::AffirmGateway`] is the production implementation.

pub mod affirm;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::circuit_breaker::BreakerFailure;
use crate::entities::payment_method;

pub use affirm::AffirmGateway;

/// API credentials taken from a configured payment method.
#[derive(Clone, PartialEq, Eq)]
pub struct GatewayCredentials {
    pub public_api_key: String,
    pub private_api_key: String,
    pub test_mode: bool,
}

impl std::fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("public_api_key", &self.public_api_key)
            .field("private_api_key", &"<redacted>")
            .field("test_mode", &self.test_mode)
            .finish()
    }
}

impl From<&payment_method::Model> for GatewayCredentials {
    fn from(method: &payment_method::Model) -> Self {
        Self {
            public_api_key: method.public_api_key.clone(),
            private_api_key: method.private_api_key.clone(),
            test_mode: method.test_mode,
        }
    }
}

/// Result of a successful authorize + capture.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayTransaction {
    /// Provider charge id (the authorization)
    pub charge_id: String,
    /// Provider transaction id of the capture
    pub transaction_id: String,
    pub amount: Decimal,
    pub currency: Option<String>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("charge declined by provider ({status}): {code}: {message}")]
    Declined {
        status: u16,
        code: String,
        message: String,
    },

    #[error("authorized amount {authorized_cents} does not match expected {expected_cents}")]
    AmountMismatch {
        expected_cents: i64,
        authorized_cents: i64,
    },

    #[error("amount {0} cannot be expressed in minor units")]
    InvalidAmount(Decimal),

    #[error("provider error ({status}): {message}")]
    ProviderUnavailable { status: u16, message: String },

    #[error("provider request timed out")]
    Timeout,

    #[error("provider unreachable: {0}")]
    Transport(String),

    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),

    #[error("provider circuit open")]
    CircuitOpen,
}

impl GatewayError {
    /// Stable short code, safe to show to shoppers and to put in URLs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Declined { .. } => "payment_declined",
            Self::AmountMismatch { .. } => "amount_mismatch",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::ProviderUnavailable { .. } => "gateway_error",
            Self::Timeout => "gateway_timeout",
            Self::Transport(_) => "gateway_unreachable",
            Self::InvalidResponse(_) => "invalid_gateway_response",
            Self::CircuitOpen => "gateway_unavailable",
        }
    }
}

impl BreakerFailure for GatewayError {
    fn trips_breaker(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable { .. }
                | Self::Timeout
                | Self::Transport(_)
                | Self::InvalidResponse(_)
        )
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Authorizes the checkout token and captures `amount`.
    ///
    /// `order_reference` is forwarded to the provider so the charge can be
    /// matched to the order in the merchant dashboard.
    async fn authorize_and_capture(
        &self,
        credentials: &GatewayCredentials,
        checkout_token: &str,
        amount: Decimal,
        order_reference: &str,
    ) -> Result<GatewayTransaction, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_redacts_private_key() {
        let creds = GatewayCredentials {
            public_api_key: "PUB".into(),
            private_api_key: "very-secret".into(),
            test_mode: true,
        };
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("PUB"));
        assert!(!rendered.contains("very-secret"));
    }

    #[test]
    fn only_provider_health_failures_trip_the_breaker() {
        assert!(GatewayError::Timeout.trips_breaker());
        assert!(GatewayError::Transport("reset".into()).trips_breaker());
        assert!(GatewayError::ProviderUnavailable {
            status: 503,
            message: "Service Unavailable".into(),
        }
        .trips_breaker());
        assert!(!GatewayError::Declined {
            status: 400,
            code: "checkout-token-used".into(),
            message: "used".into(),
        }
        .trips_breaker());
        assert!(!GatewayError::AmountMismatch {
            expected_cents: 100,
            authorized_cents: 90,
        }
        .trips_breaker());
    }

    #[test]
    fn provider_outage_is_not_reported_as_a_decline() {
        let outage = GatewayError::ProviderUnavailable {
            status: 502,
            message: "Bad Gateway".into(),
        };
        assert_eq!(outage.code(), "gateway_error");
        assert_ne!(outage.code(), "payment_declined");
    }
}
