use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveEnum, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QuerySelect,
};
use tracing::{debug, info};

use crate::{
    entities::order::{self, CheckoutState},
    errors::ServiceError,
};

/// Outcome of a conditional transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Advanced {
        from: CheckoutState,
        to: CheckoutState,
    },
    /// The order was not in the expected state; carries the state it is in.
    Unchanged(CheckoutState),
}

impl Advance {
    pub fn advanced(&self) -> bool {
        matches!(self, Advance::Advanced { .. })
    }
}

/// Moves orders through the checkout stages.
///
/// Every method takes the connection to run on so transitions can join a
/// caller's transaction.
#[async_trait]
pub trait CheckoutStateMachine: Send + Sync {
    async fn current_state<C>(&self, conn: &C, order_id: i32) -> Result<CheckoutState, ServiceError>
    where
        C: ConnectionTrait;

    /// Moves the order one stage forward, but only if it is currently in
    /// `expected`. Safe to repeat: later calls report `Unchanged`.
    async fn advance_if<C>(
        &self,
        conn: &C,
        order_id: i32,
        expected: CheckoutState,
    ) -> Result<Advance, ServiceError>
    where
        C: ConnectionTrait;
}

/// State machine backed by a conditional update on the `orders` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderCheckoutStateMachine;

#[async_trait]
impl CheckoutStateMachine for OrderCheckoutStateMachine {
    async fn current_state<C>(&self, conn: &C, order_id: i32) -> Result<CheckoutState, ServiceError>
    where
        C: ConnectionTrait,
    {
        order::Entity::find_by_id(order_id)
            .select_only()
            .column(order::Column::State)
            .into_tuple::<CheckoutState>()
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))
    }

    async fn advance_if<C>(
        &self,
        conn: &C,
        order_id: i32,
        expected: CheckoutState,
    ) -> Result<Advance, ServiceError>
    where
        C: ConnectionTrait,
    {
        let Some(next) = expected.next() else {
            let current = self.current_state(conn, order_id).await?;
            return Ok(Advance::Unchanged(current));
        };

        let result = order::Entity::update_many()
            .col_expr(order::Column::State, Expr::value(next.to_value()))
            .col_expr(
                order::Column::Version,
                Expr::col(order::Column::Version).add(1),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::State.eq(expected))
            .exec(conn)
            .await?;

        if result.rows_affected == 1 {
            info!(order_id, from = %expected, to = %next, "Order advanced");
            return Ok(Advance::Advanced { from: expected, to: next });
        }

        let current = self.current_state(conn, order_id).await?;
        debug!(order_id, expected = %expected, current = %current, "Order not advanced");
        Ok(Advance::Unchanged(current))
    }
}
