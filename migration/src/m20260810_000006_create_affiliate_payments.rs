use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(AffiliatePayments::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(AffiliatePayments::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(
            ColumnDef::new(AffiliatePayments::AffiliateCode)
              .string()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliatePayments::TotalCents)
              .big_integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliatePayments::CommissionCount)
              .integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliatePayments::PaymentMethod).string().not_null(),
          )
          .col(
            ColumnDef::new(AffiliatePayments::PaymentReference).string().null(),
          )
          .col(ColumnDef::new(AffiliatePayments::Status).text().not_null())
          .col(
            ColumnDef::new(AffiliatePayments::CreatedAt).date_time().not_null(),
          )
          .col(ColumnDef::new(AffiliatePayments::PaidAt).date_time().null())
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_payments_code")
          .table(AffiliatePayments::Table)
          .col(AffiliatePayments::AffiliateCode)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(AffiliatePayments::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum AffiliatePayments {
  Table,
  Id,
  AffiliateCode,
  TotalCents,
  CommissionCount,
  PaymentMethod,
  PaymentReference,
  Status,
  CreatedAt,
  PaidAt,
}
