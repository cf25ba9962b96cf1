use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const AFFIRM_KIND: &str = "affirm";

/// Configured payment gateway integration.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_methods")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    /// Integration kind, `affirm` for this service
    pub kind: String,
    pub public_api_key: String,
    #[serde(skip_serializing)]
    pub private_api_key: String,
    pub test_mode: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn is_affirm(&self) -> bool {
        self.kind.eq_ignore_ascii_case(AFFIRM_KIND)
    }
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
