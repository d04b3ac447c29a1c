use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::user;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum Environment {
  #[sea_orm(string_value = "production")]
  #[default]
  Production,
  #[sea_orm(string_value = "sandbox")]
  Sandbox,
}

/// Plan tier derived from the store product id. Not a column: the store
/// product id is the source of truth and the mapping is recomputed on read.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionType {
  Monthly,
  Yearly,
  Lifetime,
}

impl SubscriptionType {
  pub fn from_product_id(product_id: &str) -> Self {
    let id = product_id.to_ascii_lowercase();
    if id.contains("lifetime") {
      Self::Lifetime
    } else if id.contains("year") || id.contains("annual") {
      Self::Yearly
    } else {
      Self::Monthly
    }
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub user_id: i64,
  pub product_id: String,
  pub transaction_id: String,
  pub original_transaction_id: String,
  pub purchase_date: DateTime,
  pub expires_date: DateTime,
  pub is_active: bool,
  pub is_trial_period: bool,
  pub auto_renew_status: bool,
  pub environment: Environment,
  pub receipt_data: Option<String>,
  pub created_at: DateTime,
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
