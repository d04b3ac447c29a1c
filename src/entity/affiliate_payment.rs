use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum PaymentStatus {
  #[sea_orm(string_value = "pending")]
  #[default]
  Pending,
  #[sea_orm(string_value = "completed")]
  Completed,
}

/// Summary row created by a bulk payout: the sum and count of the
/// commissions it settled.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "affiliate_payments")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub affiliate_code: String,
  pub total_cents: i64,
  pub commission_count: i32,
  pub payment_method: String,
  pub payment_reference: Option<String>,
  pub status: PaymentStatus,
  pub created_at: DateTime,
  pub paid_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
