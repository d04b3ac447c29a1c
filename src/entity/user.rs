use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{subscription, user_referral};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i64,
  pub email: String,
  pub is_admin: bool,
  pub is_affiliate: bool,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "subscription::Entity")]
  Subscriptions,
  #[sea_orm(has_one = "user_referral::Entity")]
  Referral,
}

impl Related<subscription::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Subscriptions.def()
  }
}

impl Related<user_referral::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Referral.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
