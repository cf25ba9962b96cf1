use std::sync::Arc;

use sea_orm::{DatabaseConnection, EntityTrait};
use tracing::{instrument, warn};

use crate::{
    entities::order::{Entity as OrderEntity, Model as OrderModel},
    errors::ServiceError,
};

/// Read access to orders.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Looks up an order by id.
    #[instrument(skip(self))]
    pub async fn find_order(&self, order_id: i32) -> Result<OrderModel, ServiceError> {
        OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                warn!(order_id, "Order not found");
                ServiceError::not_found("Order", order_id)
            })
    }
}
