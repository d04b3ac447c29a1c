//! Shared test utilities for database setup

#[cfg(test)]
pub mod test_db {
  use chrono::Utc;
  use sea_orm::{
    ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection,
    DbBackend, Schema, Set,
  };

  use crate::entity::*;

  /// Creates an in-memory SQLite database with all required tables
  pub async fn setup() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let schema = Schema::new(DbBackend::Sqlite);

    let stmt = schema.create_table_from_entity(user::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(subscription::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(affiliate_code::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(user_referral::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(affiliate_commission::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(affiliate_payment::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    // mirror the composite unique index from the migration; the
    // exactly-once guarantee under test depends on it
    db.execute_unprepared(
      "CREATE UNIQUE INDEX idx_commissions_user_code_period \
       ON affiliate_commissions \
       (user_id, affiliate_code, period_start, period_end)",
    )
    .await
    .unwrap();

    db
  }

  pub async fn seed_user(
    db: &DatabaseConnection,
    id: i64,
    is_admin: bool,
    is_affiliate: bool,
  ) -> user::Model {
    user::ActiveModel {
      id: Set(id),
      email: Set(format!("user{id}@example.com")),
      is_admin: Set(is_admin),
      is_affiliate: Set(is_affiliate),
      created_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await
    .unwrap()
  }
}

#[cfg(test)]
mod tests {
  use migration::{Migrator, MigratorTrait};
  use sea_orm::Database;

  #[tokio::test]
  async fn migrations_apply_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nutrifit.db");
    let url = format!("sqlite://{}?mode=rwc", path.display());

    let db = Database::connect(&url).await.unwrap();
    Migrator::up(&db, None).await.unwrap();

    // re-running is a no-op
    Migrator::up(&db, None).await.unwrap();
  }
}
