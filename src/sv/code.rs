use rand::Rng;
use serde::Serialize;

use crate::{
  entity::{affiliate_code, affiliate_commission, user_referral},
  prelude::*,
};

pub struct Codes<'a> {
  db: &'a DatabaseConnection,
}

pub const DEFAULT_COMMISSION_PERCENT: f64 = 30.0;

impl<'a> Codes<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Create an affiliate code. Codes are stored uppercase; when no code is
  /// supplied one is generated from the current timestamp plus a random
  /// suffix.
  pub async fn create(
    &self,
    code: Option<String>,
    commission_percentage: Option<f64>,
    created_by: i64,
  ) -> Result<affiliate_code::Model> {
    let percentage =
      commission_percentage.unwrap_or(DEFAULT_COMMISSION_PERCENT);
    validate_percentage(percentage)?;

    let code = match code {
      Some(c) if !c.trim().is_empty() => c.trim().to_uppercase(),
      _ => generate_code(),
    };

    let now = Utc::now().naive_utc();
    let created = affiliate_code::ActiveModel {
      id: NotSet,
      code: Set(code),
      created_by: Set(created_by),
      commission_percentage: Set(percentage),
      is_active: Set(true),
      created_at: Set(now),
      updated_at: Set(now),
    }
    .insert(self.db)
    .await;

    match created {
      Ok(model) => Ok(model),
      Err(err)
        if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
      {
        Err(Error::Validation("affiliate code already exists".into()))
      }
      Err(err) => Err(err.into()),
    }
  }

  /// Resolve a code to its row. Inactive codes resolve to `None`.
  pub async fn by_code(
    &self,
    code: &str,
  ) -> Result<Option<affiliate_code::Model>> {
    Ok(
      affiliate_code::Entity::find()
        .filter(affiliate_code::Column::Code.eq(code.trim().to_uppercase()))
        .filter(affiliate_code::Column::IsActive.eq(true))
        .one(self.db)
        .await?,
    )
  }

  pub async fn by_id(&self, id: i32) -> Result<Option<affiliate_code::Model>> {
    Ok(affiliate_code::Entity::find_by_id(id).one(self.db).await?)
  }

  /// Idempotent activation toggle. Deactivating an already-inactive code is
  /// a no-op success.
  pub async fn set_active(&self, id: i32, active: bool) -> Result<()> {
    let code = affiliate_code::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::NotFound("affiliate code"))?;

    if code.is_active == active {
      return Ok(());
    }

    affiliate_code::ActiveModel {
      is_active: Set(active),
      updated_at: Set(Utc::now().naive_utc()),
      ..code.into()
    }
    .update(self.db)
    .await?;

    Ok(())
  }

  /// Change the percentage for future commissions. Rows already in the
  /// ledger keep the percentage they were created with.
  pub async fn set_percentage(
    &self,
    id: i32,
    percentage: f64,
  ) -> Result<affiliate_code::Model> {
    validate_percentage(percentage)?;

    let code = affiliate_code::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::NotFound("affiliate code"))?;

    Ok(
      affiliate_code::ActiveModel {
        commission_percentage: Set(percentage),
        updated_at: Set(Utc::now().naive_utc()),
        ..code.into()
      }
      .update(self.db)
      .await?,
    )
  }

  /// Aggregate read over all active codes. No side effects.
  pub async fn active_with_stats(&self) -> Result<Vec<CodeStats>> {
    let codes = affiliate_code::Entity::find()
      .filter(affiliate_code::Column::IsActive.eq(true))
      .order_by_asc(affiliate_code::Column::Code)
      .all(self.db)
      .await?;

    let mut stats = Vec::with_capacity(codes.len());
    for code in codes {
      let total_referrals = user_referral::Entity::find()
        .filter(user_referral::Column::AffiliateCode.eq(&code.code))
        .count(self.db)
        .await?;

      let premium_referrals = user_referral::Entity::find()
        .filter(user_referral::Column::AffiliateCode.eq(&code.code))
        .filter(user_referral::Column::IsPremium.eq(true))
        .count(self.db)
        .await?;

      let total_commission_cents = affiliate_commission::Entity::find()
        .filter(affiliate_commission::Column::AffiliateCode.eq(&code.code))
        .all(self.db)
        .await?
        .iter()
        .map(|c| c.commission_cents)
        .sum();

      stats.push(CodeStats {
        code: code.code,
        commission_percentage: code.commission_percentage,
        total_referrals,
        premium_referrals,
        total_commission_cents,
      });
    }

    Ok(stats)
  }
}

fn validate_percentage(percentage: f64) -> Result<()> {
  if !(0.0..=100.0).contains(&percentage) {
    return Err(Error::Validation(format!(
      "commission percentage must be between 0 and 100, got {percentage}"
    )));
  }
  Ok(())
}

fn generate_code() -> String {
  let suffix: u32 = rand::thread_rng().gen_range(0..10_000);
  format!("NF{}{suffix:04}", Utc::now().timestamp() % 100_000)
}

#[derive(Debug, Serialize)]
pub struct CodeStats {
  pub code: String,
  pub commission_percentage: f64,
  pub total_referrals: u64,
  pub premium_referrals: u64,
  pub total_commission_cents: i64,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::test_utils::test_db;

  #[tokio::test]
  async fn test_create_generates_uppercase_code() {
    let db = test_db::setup().await;
    test_db::seed_user(&db, 1, false, false).await;

    let code = Codes::new(&db)
      .create(Some("fit10".into()), Some(15.0), 1)
      .await
      .unwrap();

    assert_eq!(code.code, "FIT10");
    assert_eq!(code.commission_percentage, 15.0);
    assert!(code.is_active);
  }

  #[tokio::test]
  async fn test_create_rejects_out_of_range_percentage() {
    let db = test_db::setup().await;
    test_db::seed_user(&db, 1, false, false).await;

    let result = Codes::new(&db).create(None, Some(130.0), 1).await;
    assert!(matches!(result, Err(Error::Validation(_))));

    let result = Codes::new(&db).create(None, Some(-5.0), 1).await;
    assert!(matches!(result, Err(Error::Validation(_))));
  }

  #[tokio::test]
  async fn test_default_percentage_is_thirty() {
    let db = test_db::setup().await;
    test_db::seed_user(&db, 1, false, false).await;

    let code = Codes::new(&db).create(None, None, 1).await.unwrap();
    assert_eq!(code.commission_percentage, 30.0);
    assert!(code.code.starts_with("NF"));
  }

  #[tokio::test]
  async fn test_by_code_ignores_inactive() {
    let db = test_db::setup().await;
    test_db::seed_user(&db, 1, false, false).await;

    let sv = Codes::new(&db);
    let code = sv.create(Some("FIT10".into()), None, 1).await.unwrap();

    assert!(sv.by_code("fit10").await.unwrap().is_some());

    sv.set_active(code.id, false).await.unwrap();
    assert!(sv.by_code("FIT10").await.unwrap().is_none());

    // deactivating again is a no-op success
    sv.set_active(code.id, false).await.unwrap();
  }

  #[tokio::test]
  async fn test_duplicate_code_rejected() {
    let db = test_db::setup().await;
    test_db::seed_user(&db, 1, false, false).await;

    let sv = Codes::new(&db);
    sv.create(Some("FIT10".into()), None, 1).await.unwrap();

    let result = sv.create(Some("fit10".into()), None, 1).await;
    assert!(matches!(result, Err(Error::Validation(_))));
  }

  #[tokio::test]
  async fn test_set_percentage() {
    let db = test_db::setup().await;
    test_db::seed_user(&db, 1, false, false).await;

    let sv = Codes::new(&db);
    let code = sv.create(Some("FIT10".into()), Some(30.0), 1).await.unwrap();

    let updated = sv.set_percentage(code.id, 50.0).await.unwrap();
    assert_eq!(updated.commission_percentage, 50.0);

    assert!(matches!(
      sv.set_percentage(9999, 50.0).await,
      Err(Error::NotFound(_))
    ));
  }
}
