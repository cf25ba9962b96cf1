use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set, SqlErr,
};
use uuid::Uuid;

use crate::entities::payment::{self, PaymentState};

/// Fields of a captured payment about to be recorded.
#[derive(Debug, Clone)]
pub struct NewPayment<'a> {
    pub order_id: i32,
    pub payment_method_id: i32,
    pub amount: Decimal,
    pub currency: &'a str,
    pub checkout_token: &'a str,
    pub charge_id: &'a str,
    pub transaction_id: &'a str,
}

/// Finds the payment already recorded for a confirmation event.
pub async fn find_by_checkout_token<C>(
    conn: &C,
    order_id: i32,
    checkout_token: &str,
) -> Result<Option<payment::Model>, DbErr>
where
    C: ConnectionTrait,
{
    payment::Entity::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .filter(payment::Column::CheckoutToken.eq(checkout_token))
        .one(conn)
        .await
}

/// Payments recorded against an order, oldest first.
pub async fn for_order<C>(conn: &C, order_id: i32) -> Result<Vec<payment::Model>, DbErr>
where
    C: ConnectionTrait,
{
    payment::Entity::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .order_by_asc(payment::Column::CreatedAt)
        .all(conn)
        .await
}

/// Inserts a completed payment. Fails with a unique violation when the
/// `(order_id, checkout_token)` pair was already recorded.
pub async fn record_completed<C>(conn: &C, new: NewPayment<'_>) -> Result<payment::Model, DbErr>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    payment::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(new.order_id),
        payment_method_id: Set(new.payment_method_id),
        amount: Set(new.amount),
        currency: Set(new.currency.to_string()),
        state: Set(PaymentState::Completed),
        checkout_token: Set(new.checkout_token.to_string()),
        charge_id: Set(Some(new.charge_id.to_string())),
        response_code: Set(Some(new.transaction_id.to_string())),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
}

pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
