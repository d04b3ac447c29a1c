use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::user;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "affiliate_codes")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  #[sea_orm(unique)]
  pub code: String,
  pub created_by: i64,
  pub commission_percentage: f64,
  pub is_active: bool,
  pub created_at: DateTime,
  pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "user::Entity",
    from = "Column::CreatedBy",
    to = "user::Column::Id"
  )]
  Creator,
}

impl Related<user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Creator.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
