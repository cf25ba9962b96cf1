use std::sync::Arc;

use metrics::counter;
use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::{error, info, instrument, warn, Instrument};

use crate::{
    config::StorefrontConfig,
    entities::{order, payment_method, CheckoutState},
    errors::ServiceError,
    gateway::{GatewayCredentials, GatewayTransaction, PaymentGateway},
    services::{
        checkout_state::{Advance, CheckoutStateMachine, OrderCheckoutStateMachine},
        order_locks::OrderLocks,
        orders::OrderService,
        payment_methods::PaymentMethodService,
        payments::{self, NewPayment},
    },
};

/// Where the shopper is sent after a confirm or cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutRedirect {
    /// Back to the cart, used for cancellations and missing tokens
    Cart,
    /// The order is already complete; show it
    OrderDetail(String),
    /// Payment recorded; continue to the confirm step
    Confirm,
    /// The provider rejected or could not process the charge
    PaymentFailed(&'static str),
}

impl CheckoutRedirect {
    /// Site-relative redirect target.
    pub fn location(&self, storefront: &StorefrontConfig) -> String {
        match self {
            Self::Cart => storefront.cart_path.clone(),
            Self::OrderDetail(number) => format!(
                "{}/{}",
                storefront.order_path_prefix.trim_end_matches('/'),
                number
            ),
            Self::Confirm => storefront.confirm_path.clone(),
            Self::PaymentFailed(code) => format!("{}?error={}", storefront.payment_path, code),
        }
    }

    /// Label used for the `affirm_confirm_total` counter.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::OrderDetail(_) => "already_complete",
            Self::Confirm => "confirmed",
            Self::PaymentFailed(_) => "payment_failed",
        }
    }
}

/// Parameters of one confirmation callback.
#[derive(Debug, Clone)]
pub struct ConfirmRequest {
    pub order_id: i32,
    pub payment_method_id: Option<i32>,
    pub checkout_token: Option<String>,
}

/// Finalizes Affirm checkouts: captures the charge, records the payment and
/// moves the order from `payment` to `confirm`.
#[derive(Clone)]
pub struct AffirmConfirmationService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    orders: OrderService,
    payment_methods: PaymentMethodService,
    state_machine: OrderCheckoutStateMachine,
    locks: OrderLocks,
}

impl AffirmConfirmationService {
    pub fn new(db: Arc<DatabaseConnection>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            orders: OrderService::new(db.clone()),
            payment_methods: PaymentMethodService::new(db.clone()),
            db,
            gateway,
            state_machine: OrderCheckoutStateMachine,
            locks: OrderLocks::new(),
        }
    }

    #[instrument(
        skip(self, request),
        fields(order_id = request.order_id, payment_method_id = ?request.payment_method_id)
    )]
    pub async fn confirm(&self, request: ConfirmRequest) -> Result<CheckoutRedirect, ServiceError> {
        // Detached so that a dropped request cannot stop between capture and commit.
        let service = self.clone();
        let result = tokio::spawn(async move { service.run_confirm(request).await }.in_current_span())
            .await
            .map_err(|e| ServiceError::InternalError(format!("confirmation task failed: {}", e)))?;
        if let Ok(redirect) = &result {
            counter!("affirm_confirm_total", 1, "outcome" => redirect.outcome());
        }
        result
    }

    /// Records a shopper backing out of the Affirm flow. Nothing is looked up
    /// or changed.
    pub fn cancel(&self, order_id: Option<&str>, payment_method_id: Option<&str>) -> CheckoutRedirect {
        info!(
            order_id = order_id.unwrap_or("-"),
            payment_method_id = payment_method_id.unwrap_or("-"),
            "Affirm checkout cancelled"
        );
        counter!("affirm_confirm_total", 1, "outcome" => "cancelled");
        CheckoutRedirect::Cart
    }

    async fn run_confirm(&self, request: ConfirmRequest) -> Result<CheckoutRedirect, ServiceError> {
        let order = self.orders.find_order(request.order_id).await?;

        let Some(token) = request
            .checkout_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
        else {
            info!(order_number = %order.number, "Confirmation without checkout token");
            return Ok(CheckoutRedirect::Cart);
        };

        if order.state.is_complete() {
            info!(order_number = %order.number, "Order already complete");
            return Ok(CheckoutRedirect::OrderDetail(order.number));
        }

        let _guard = self.locks.lock(order.id).await;

        // Another request may have moved the order while we waited.
        let state = self.state_machine.current_state(&*self.db, order.id).await?;
        if state.is_complete() {
            info!(order_number = %order.number, "Order completed while waiting for lock");
            return Ok(CheckoutRedirect::OrderDetail(order.number));
        }

        let payment_method_id = request
            .payment_method_id
            .ok_or_else(|| ServiceError::NotFound("Payment method not found".to_string()))?;
        let method = self.payment_methods.find_affirm(payment_method_id).await?;

        if let Some(existing) =
            payments::find_by_checkout_token(&*self.db, order.id, token).await?
        {
            info!(
                order_number = %order.number,
                payment_id = %existing.id,
                "Checkout token already recorded, skipping capture"
            );
            self.advance_past_payment(&*self.db, &order).await?;
            return Ok(CheckoutRedirect::Confirm);
        }

        let credentials = GatewayCredentials::from(&method);
        let transaction = match self
            .gateway
            .authorize_and_capture(&credentials, token, order.total, &order.number)
            .await
        {
            Ok(transaction) => transaction,
            Err(err) => {
                warn!(order_number = %order.number, error = %err, "Affirm charge failed");
                counter!("affirm_gateway_failures_total", 1, "kind" => err.code());
                return Ok(CheckoutRedirect::PaymentFailed(err.code()));
            }
        };

        self.record_and_advance(&order, &method, token, &transaction)
            .await?;
        Ok(CheckoutRedirect::Confirm)
    }

    /// Inserts the payment and advances the order in one transaction.
    async fn record_and_advance(
        &self,
        order: &order::Model,
        method: &payment_method::Model,
        token: &str,
        transaction: &GatewayTransaction,
    ) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let inserted = payments::record_completed(
            &txn,
            NewPayment {
                order_id: order.id,
                payment_method_id: method.id,
                amount: order.total,
                currency: transaction.currency.as_deref().unwrap_or(&order.currency),
                checkout_token: token,
                charge_id: &transaction.charge_id,
                transaction_id: &transaction.transaction_id,
            },
        )
        .await;

        match inserted {
            Ok(payment) => {
                self.advance_past_payment(&txn, order).await?;
                txn.commit().await.map_err(|e| {
                    error!(
                        order_number = %order.number,
                        transaction_id = %transaction.transaction_id,
                        "Captured Affirm charge could not be recorded: {}",
                        e
                    );
                    ServiceError::DatabaseError(e)
                })?;
                info!(
                    order_number = %order.number,
                    payment_id = %payment.id,
                    transaction_id = %transaction.transaction_id,
                    "Affirm payment recorded"
                );
                Ok(())
            }
            Err(err) if payments::is_unique_violation(&err) => {
                txn.rollback().await?;
                warn!(
                    order_number = %order.number,
                    "Checkout token recorded concurrently, treating as replay"
                );
                self.advance_past_payment(&*self.db, order).await?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn advance_past_payment<C>(&self, conn: &C, order: &order::Model) -> Result<(), ServiceError>
    where
        C: sea_orm::ConnectionTrait,
    {
        match self
            .state_machine
            .advance_if(conn, order.id, CheckoutState::Payment)
            .await?
        {
            Advance::Advanced { .. } => {}
            Advance::Unchanged(current) => {
                info!(order_number = %order.number, state = %current, "Order left in current state");
            }
        }
        Ok(())
    }
}
