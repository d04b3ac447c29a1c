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
          .table(AffiliateCodes::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(AffiliateCodes::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(
            ColumnDef::new(AffiliateCodes::Code)
              .string()
              .not_null()
              .unique_key(),
          )
          .col(
            ColumnDef::new(AffiliateCodes::CreatedBy).big_integer().not_null(),
          )
          .col(
            ColumnDef::new(AffiliateCodes::CommissionPercentage)
              .double()
              .not_null()
              .default(30.0),
          )
          .col(
            ColumnDef::new(AffiliateCodes::IsActive)
              .boolean()
              .not_null()
              .default(true),
          )
          .col(
            ColumnDef::new(AffiliateCodes::CreatedAt).date_time().not_null(),
          )
          .col(
            ColumnDef::new(AffiliateCodes::UpdatedAt).date_time().not_null(),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_affiliate_codes_creator")
              .from(AffiliateCodes::Table, AffiliateCodes::CreatedBy)
              .to(Users::Table, Users::Id),
          )
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(AffiliateCodes::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum AffiliateCodes {
  Table,
  Id,
  Code,
  CreatedBy,
  CommissionPercentage,
  IsActive,
  CreatedAt,
  UpdatedAt,
}
