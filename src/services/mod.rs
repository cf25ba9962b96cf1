pub mod affirm_confirmation;
pub mod checkout_state;
pub mod order_locks;
pub mod orders;
pub mod payment_methods;
pub mod payments;

#[cfg(test)]
pub(crate) mod testing {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
    use std::sync::Arc;
    use tempfile::TempDir;

    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use crate::entities::{order, payment_method, CheckoutState};

    /// A migrated SQLite database that lives as long as the returned dir.
    pub async fn test_db() -> (Arc<DatabaseConnection>, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkout.db");
        let config = DbConfig {
            url: format!("sqlite://{}?mode=rwc", path.display()),
            max_connections: 4,
            ..Default::default()
        };
        let db = establish_connection_with_config(&config).await.unwrap();
        run_migrations(&db).await.unwrap();
        (Arc::new(db), dir)
    }

    pub async fn insert_order(
        db: &DatabaseConnection,
        number: &str,
        state: CheckoutState,
        total: Decimal,
    ) -> order::Model {
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
        .insert(db)
        .await
        .unwrap()
    }

    pub async fn insert_affirm_method(db: &DatabaseConnection, active: bool) -> payment_method::Model {
        payment_method::ActiveModel {
            name: Set("Affirm".to_string()),
            kind: Set(payment_method::AFFIRM_KIND.to_string()),
            public_api_key: Set("PUBLIC".to_string()),
            private_api_key: Set("PRIVATE".to_string()),
            test_mode: Set(true),
            active: Set(active),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }
}
