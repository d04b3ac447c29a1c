use migration::{Migrator, MigratorTrait};

use crate::{prelude::*, sv::ReceiptClient};

pub struct Config {
  pub webhook_secret: String,
  pub receipt_shared_secret: String,
}

impl Config {
  pub fn load() -> Self {
    Self {
      webhook_secret: std::env::var("WEBHOOK_SECRET")
        .expect("WEBHOOK_SECRET not set"),
      receipt_shared_secret: std::env::var("RECEIPT_SHARED_SECRET")
        .expect("RECEIPT_SHARED_SECRET not set"),
    }
  }
}

pub struct AppState {
  pub db: DatabaseConnection,
  pub config: Config,
  pub receipts: ReceiptClient,
}

impl AppState {
  pub async fn new(db_url: &str, config: Config) -> anyhow::Result<Self> {
    let db = Database::connect(db_url).await?;
    Migrator::up(&db, None).await?;

    let receipts = ReceiptClient::new(&config.receipt_shared_secret);
    Ok(Self { db, config, receipts })
  }
}
