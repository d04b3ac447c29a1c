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
          .table(UserReferrals::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(UserReferrals::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(UserReferrals::UserId).big_integer().not_null())
          .col(
            ColumnDef::new(UserReferrals::AffiliateCode).string().not_null(),
          )
          .col(
            ColumnDef::new(UserReferrals::ReferralDate).date_time().not_null(),
          )
          .col(
            ColumnDef::new(UserReferrals::IsPremium)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(
            ColumnDef::new(UserReferrals::PremiumConversionDate)
              .date_time()
              .null(),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_user_referrals_user")
              .from(UserReferrals::Table, UserReferrals::UserId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    // One referral per user, ever
    manager
      .create_index(
        Index::create()
          .name("idx_user_referrals_user")
          .table(UserReferrals::Table)
          .col(UserReferrals::UserId)
          .unique()
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_user_referrals_code")
          .table(UserReferrals::Table)
          .col(UserReferrals::AffiliateCode)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(UserReferrals::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum UserReferrals {
  Table,
  Id,
  UserId,
  AffiliateCode,
  ReferralDate,
  IsPremium,
  PremiumConversionDate,
}
