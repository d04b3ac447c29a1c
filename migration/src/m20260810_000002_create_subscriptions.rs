use sea_orm_migration::prelude::*;

use super::m20260810_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Subscriptions::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Subscriptions::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Subscriptions::UserId).big_integer().not_null())
          .col(ColumnDef::new(Subscriptions::ProductId).string().not_null())
          .col(
            ColumnDef::new(Subscriptions::TransactionId).string().not_null(),
          )
          .col(
            ColumnDef::new(Subscriptions::OriginalTransactionId)
              .string()
              .not_null(),
          )
          .col(
            ColumnDef::new(Subscriptions::PurchaseDate).date_time().not_null(),
          )
          .col(
            ColumnDef::new(Subscriptions::ExpiresDate).date_time().not_null(),
          )
          .col(
            ColumnDef::new(Subscriptions::IsActive)
              .boolean()
              .not_null()
              .default(true),
          )
          .col(
            ColumnDef::new(Subscriptions::IsTrialPeriod)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(
            ColumnDef::new(Subscriptions::AutoRenewStatus)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(ColumnDef::new(Subscriptions::Environment).text().not_null())
          .col(ColumnDef::new(Subscriptions::ReceiptData).text().null())
          .col(
            ColumnDef::new(Subscriptions::CreatedAt).date_time().not_null(),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_subscriptions_user")
              .from(Subscriptions::Table, Subscriptions::UserId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_subscriptions_user_active")
          .table(Subscriptions::Table)
          .col(Subscriptions::UserId)
          .col(Subscriptions::IsActive)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(Subscriptions::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum Subscriptions {
  Table,
  Id,
  UserId,
  ProductId,
  TransactionId,
  OriginalTransactionId,
  PurchaseDate,
  ExpiresDate,
  IsActive,
  IsTrialPeriod,
  AutoRenewStatus,
  Environment,
  ReceiptData,
  CreatedAt,
}
