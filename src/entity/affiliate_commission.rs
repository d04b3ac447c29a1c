use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::user;

/// One commission row per referred user per billing period.
/// `commission_percentage` is a snapshot taken at creation time; later edits
/// to the affiliate code never touch rows that already exist.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "affiliate_commissions")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub affiliate_code: String,
  pub user_id: i64,
  pub subscription_id: String,
  pub commission_cents: i64,
  pub commission_percentage: f64,
  pub subscription_cents: i64,
  pub period_start: Date,
  pub period_end: Date,
  pub is_paid: bool,
  pub paid_date: Option<DateTime>,
  pub payment_method: Option<String>,
  pub payment_reference: Option<String>,
  pub created_at: DateTime,
  pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "user::Entity",
    from = "Column::UserId",
    to = "user::Column::Id"
  )]
  User,
}

impl Related<user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::User.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
