use std::sync::Arc;

use sea_orm::{DatabaseConnection, EntityTrait};
use tracing::{instrument, warn};

use crate::{
    entities::payment_method::{Entity as PaymentMethodEntity, Model as PaymentMethodModel},
    errors::ServiceError,
};

#[derive(Clone)]
pub struct PaymentMethodService {
    db: Arc<DatabaseConnection>,
}

impl PaymentMethodService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Resolves an active Affirm payment method.
    ///
    /// Methods that are missing, inactive, or backed by another provider are
    /// all reported as not found so callers cannot probe configuration.
    #[instrument(skip(self))]
    pub async fn find_affirm(&self, id: i32) -> Result<PaymentMethodModel, ServiceError> {
        let method = PaymentMethodEntity::find_by_id(id).one(&*self.db).await?;
        match method {
            Some(method) if method.active && method.is_affirm() => Ok(method),
            Some(method) => {
                warn!(
                    payment_method_id = id,
                    kind = %method.kind,
                    active = method.active,
                    "Payment method cannot confirm Affirm checkouts"
                );
                Err(ServiceError::not_found("Payment method", id))
            }
            None => Err(ServiceError::not_found("Payment method", id)),
        }
    }
}
