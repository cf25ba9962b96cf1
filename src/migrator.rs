use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_orders_table::Migration),
            Box::new(m20240101_000002_create_payment_methods_table::Migration),
            Box::new(m20240101_000003_create_payments_table::Migration),
        ]
    }
}

mod m20240101_000001_create_orders_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Orders::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Orders::Number).string().not_null())
                        .col(
                            ColumnDef::new(Orders::State)
                                .string_len(32)
                                .not_null()
                                .default("cart"),
                        )
                        .col(
                            ColumnDef::new(Orders::Total)
                                .decimal_len(10, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::Currency)
                                .string_len(3)
                                .not_null()
                                .default("USD"),
                        )
                        .col(ColumnDef::new(Orders::Email).string().null())
                        .col(ColumnDef::new(Orders::CompletedAt).timestamp_with_time_zone().null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_orders_number")
                        .table(Orders::Table)
                        .col(Orders::Number)
                        .unique()
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Orders {
        Table,
        Id,
        Number,
        State,
        Total,
        Currency,
        Email,
        CompletedAt,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20240101_000002_create_payment_methods_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_payment_methods_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PaymentMethods::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentMethods::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(PaymentMethods::Name).string().not_null())
                        .col(ColumnDef::new(PaymentMethods::Kind).string_len(32).not_null())
                        .col(
                            ColumnDef::new(PaymentMethods::PublicApiKey)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentMethods::PrivateApiKey)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentMethods::TestMode)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(PaymentMethods::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(PaymentMethods::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PaymentMethods::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum PaymentMethods {
        Table,
        Id,
        Name,
        Kind,
        PublicApiKey,
        PrivateApiKey,
        TestMode,
        Active,
        CreatedAt,
    }
}

mod m20240101_000003_create_payments_table {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000001_create_orders_table::Orders;
    use super::m20240101_000002_create_payment_methods_table::PaymentMethods;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_payments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Payments::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Payments::OrderId).integer().not_null())
                        .col(ColumnDef::new(Payments::PaymentMethodId).integer().not_null())
                        .col(ColumnDef::new(Payments::Amount).decimal_len(10, 2).not_null())
                        .col(ColumnDef::new(Payments::Currency).string_len(3).not_null())
                        .col(ColumnDef::new(Payments::State).string_len(32).not_null())
                        .col(ColumnDef::new(Payments::CheckoutToken).string().not_null())
                        .col(ColumnDef::new(Payments::ChargeId).string().null())
                        .col(ColumnDef::new(Payments::ResponseCode).string().null())
                        .col(
                            ColumnDef::new(Payments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Payments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_payments_order")
                                .from(Payments::Table, Payments::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_payments_payment_method")
                                .from(Payments::Table, Payments::PaymentMethodId)
                                .to(PaymentMethods::Table, PaymentMethods::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // One row per confirmation event; replays hit this index.
            manager
                .create_index(
                    Index::create()
                        .name("idx_payments_order_checkout_token")
                        .table(Payments::Table)
                        .col(Payments::OrderId)
                        .col(Payments::CheckoutToken)
                        .unique()
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Payments {
        Table,
        Id,
        OrderId,
        PaymentMethodId,
        Amount,
        Currency,
        State,
        CheckoutToken,
        ChargeId,
        ResponseCode,
        CreatedAt,
        UpdatedAt,
    }
}
