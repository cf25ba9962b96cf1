use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Checkout stages in the order a shopper walks through them.
///
/// The derived `Ord` follows declaration order, so `Payment < Confirm`.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckoutState {
    #[sea_orm(string_value = "cart")]
    Cart,
    #[sea_orm(string_value = "address")]
    Address,
    #[sea_orm(string_value = "delivery")]
    Delivery,
    #[sea_orm(string_value = "payment")]
    Payment,
    #[sea_orm(string_value = "confirm")]
    Confirm,
    #[sea_orm(string_value = "complete")]
    Complete,
}

impl CheckoutState {
    /// The stage that follows this one, `None` once the order is complete.
    pub fn next(self) -> Option<CheckoutState> {
        match self {
            CheckoutState::Cart => Some(CheckoutState::Address),
            CheckoutState::Address => Some(CheckoutState::Delivery),
            CheckoutState::Delivery => Some(CheckoutState::Payment),
            CheckoutState::Payment => Some(CheckoutState::Confirm),
            CheckoutState::Confirm => Some(CheckoutState::Complete),
            CheckoutState::Complete => None,
        }
    }

    pub fn is_complete(self) -> bool {
        self == CheckoutState::Complete
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Shopper-facing order number, e.g. `R123456789`
    #[sea_orm(unique)]
    pub number: String,

    pub state: CheckoutState,

    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub total: Decimal,

    pub currency: String,
    pub email: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Bumped on every state transition
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
