//! Seed data script - creates an Affirm payment method and a few orders
//! waiting at the payment step so the callbacks can be tried by hand.
//!
//! Run with: cargo run --bin seed-data -- --orders 5

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use tracing::info;

use affirm_checkout::{
    config::load_config,
    db::{establish_connection_from_app_config, run_migrations},
    entities::{order, payment_method, CheckoutState},
};

#[derive(Debug, Parser)]
#[command(name = "seed-data", about = "Populate the checkout database with demo data")]
struct Args {
    /// Number of orders to create in the `payment` state
    #[arg(long, default_value_t = 3)]
    orders: u32,

    /// Affirm public API key for the seeded payment method
    #[arg(long, env = "AFFIRM_PUBLIC_KEY", default_value = "sandbox-public-key")]
    public_key: String,

    /// Affirm private API key for the seeded payment method
    #[arg(long, env = "AFFIRM_PRIVATE_KEY", default_value = "sandbox-private-key")]
    private_key: String,

    /// Seed a live (non sandbox) payment method
    #[arg(long)]
    live: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let cfg = load_config().context("failed to load configuration")?;

    info!("Connecting to database: {}", cfg.database_url());
    let db = establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to database")?;
    run_migrations(&db).await.context("failed to run migrations")?;

    let method = payment_method::ActiveModel {
        name: Set("Affirm".to_string()),
        kind: Set(payment_method::AFFIRM_KIND.to_string()),
        public_api_key: Set(args.public_key),
        private_api_key: Set(args.private_key),
        test_mode: Set(!args.live),
        active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&db)
    .await
    .context("failed to create payment method")?;
    info!("Created payment method {} (test_mode={})", method.id, method.test_mode);

    let mut rng = rand::thread_rng();
    for _ in 0..args.orders {
        let now = Utc::now();
        let number = format!("R{:09}", rng.gen_range(0..1_000_000_000u32));
        let total = Decimal::new(rng.gen_range(5_000..250_000i64), 2);

        let order = order::ActiveModel {
            number: Set(number),
            state: Set(CheckoutState::Payment),
            total: Set(total),
            currency: Set("USD".to_string()),
            email: Set(Some("shopper@example.com".to_string())),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            version: Set(1),
            ..Default::default()
        }
        .insert(&db)
        .await
        .context("failed to create order")?;

        info!(
            "Created order {} (id={}, total={} {})",
            order.number, order.id, order.total, order.currency
        );
    }

    info!("");
    info!("Try a confirmation:");
    info!(
        "  curl -i -d 'order_id=1&payment_method_id={}&checkout_token=TOKEN' http://localhost:{}/affirm/confirm",
        method.id, cfg.port
    );

    Ok(())
}
