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
          .table(AffiliateCommissions::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(AffiliateCommissions::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(
            ColumnDef::new(AffiliateCommissions::AffiliateCode)
              .string()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliateCommissions::UserId)
              .big_integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliateCommissions::SubscriptionId)
              .string()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliateCommissions::CommissionCents)
              .big_integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliateCommissions::CommissionPercentage)
              .double()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliateCommissions::SubscriptionCents)
              .big_integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliateCommissions::PeriodStart).date().not_null(),
          )
          .col(
            ColumnDef::new(AffiliateCommissions::PeriodEnd).date().not_null(),
          )
          .col(
            ColumnDef::new(AffiliateCommissions::IsPaid)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(ColumnDef::new(AffiliateCommissions::PaidDate).date_time().null())
          .col(
            ColumnDef::new(AffiliateCommissions::PaymentMethod).string().null(),
          )
          .col(
            ColumnDef::new(AffiliateCommissions::PaymentReference)
              .string()
              .null(),
          )
          .col(
            ColumnDef::new(AffiliateCommissions::CreatedAt)
              .date_time()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliateCommissions::UpdatedAt)
              .date_time()
              .not_null(),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_affiliate_commissions_user")
              .from(AffiliateCommissions::Table, AffiliateCommissions::UserId)
              .to(Users::Table, Users::Id),
          )
          .to_owned(),
      )
      .await?;

    // Storage-level exactly-once guarantee: one commission per user, code
    // and billing period. Concurrent renewal reconciliations race down to
    // one winning insert; the loser gets a unique violation.
    manager
      .create_index(
        Index::create()
          .name("idx_commissions_user_code_period")
          .table(AffiliateCommissions::Table)
          .col(AffiliateCommissions::UserId)
          .col(AffiliateCommissions::AffiliateCode)
          .col(AffiliateCommissions::PeriodStart)
          .col(AffiliateCommissions::PeriodEnd)
          .unique()
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_commissions_code")
          .table(AffiliateCommissions::Table)
          .col(AffiliateCommissions::AffiliateCode)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(AffiliateCommissions::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum AffiliateCommissions {
  Table,
  Id,
  AffiliateCode,
  UserId,
  SubscriptionId,
  CommissionCents,
  CommissionPercentage,
  SubscriptionCents,
  PeriodStart,
  PeriodEnd,
  IsPaid,
  PaidDate,
  PaymentMethod,
  PaymentReference,
  CreatedAt,
  UpdatedAt,
}
