pub use sea_orm_migration::prelude::*;

mod m20260810_000001_create_users;
mod m20260810_000002_create_subscriptions;
mod m20260810_000003_create_affiliate_codes;
mod m20260810_000004_create_user_referrals;
mod m20260810_000005_create_affiliate_commissions;
mod m20260810_000006_create_affiliate_payments;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20260810_000001_create_users::Migration),
      Box::new(m20260810_000002_create_subscriptions::Migration),
      Box::new(m20260810_000003_create_affiliate_codes::Migration),
      Box::new(m20260810_000004_create_user_referrals::Migration),
      Box::new(m20260810_000005_create_affiliate_commissions::Migration),
      Box::new(m20260810_000006_create_affiliate_payments::Migration),
    ]
  }
}
