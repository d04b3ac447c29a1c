use serde::Serialize;

use crate::{entity::user_referral, prelude::*, sv::Codes};

pub struct Referrals<'a> {
  db: &'a DatabaseConnection,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ListOpts {
  pub limit: Option<u64>,
  pub offset: Option<u64>,
  pub premium_only: bool,
}

impl<'a> Referrals<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Attribute a user to an affiliate code. First registration wins: a user
  /// can never re-register under a different code.
  pub async fn register(
    &self,
    user_id: i64,
    code: &str,
  ) -> Result<user_referral::Model> {
    if self.by_user(user_id).await?.is_some() {
      return Err(Error::DuplicateReferral);
    }

    let code = Codes::new(self.db)
      .by_code(code)
      .await?
      .ok_or(Error::InvalidCode)?;

    let created = user_referral::ActiveModel {
      id: NotSet,
      user_id: Set(user_id),
      affiliate_code: Set(code.code),
      referral_date: Set(Utc::now().naive_utc()),
      is_premium: Set(false),
      premium_conversion_date: Set(None),
    }
    .insert(self.db)
    .await;

    match created {
      Ok(model) => Ok(model),
      // two concurrent registrations race down to the unique user_id index
      Err(err)
        if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
      {
        Err(Error::DuplicateReferral)
      }
      Err(err) => Err(err.into()),
    }
  }

  pub async fn by_user(
    &self,
    user_id: i64,
  ) -> Result<Option<user_referral::Model>> {
    Ok(
      user_referral::Entity::find()
        .filter(user_referral::Column::UserId.eq(user_id))
        .one(self.db)
        .await?,
    )
  }

  /// Flip the referral to premium. Idempotent: a second call neither errors
  /// nor moves the original conversion date.
  pub async fn mark_premium(&self, id: i32) -> Result<user_referral::Model> {
    let referral = user_referral::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::NotFound("referral"))?;

    if referral.is_premium {
      return Ok(referral);
    }

    Ok(
      user_referral::ActiveModel {
        is_premium: Set(true),
        premium_conversion_date: Set(Some(Utc::now().naive_utc())),
        ..referral.into()
      }
      .update(self.db)
      .await?,
    )
  }

  pub async fn by_code(
    &self,
    code: &str,
    opts: ListOpts,
  ) -> Result<Vec<user_referral::Model>> {
    let mut query = user_referral::Entity::find()
      .filter(user_referral::Column::AffiliateCode.eq(code.trim().to_uppercase()))
      .order_by_desc(user_referral::Column::ReferralDate);

    if opts.premium_only {
      query = query.filter(user_referral::Column::IsPremium.eq(true));
    }
    if let Some(limit) = opts.limit {
      query = query.limit(limit);
    }
    if let Some(offset) = opts.offset {
      query = query.offset(offset);
    }

    Ok(query.all(self.db).await?)
  }

  pub async fn conversion_stats(&self, code: &str) -> Result<ConversionStats> {
    let referrals = self.by_code(code, ListOpts::default()).await?;

    let total_referrals = referrals.len() as u64;
    let converted: Vec<_> =
      referrals.iter().filter(|r| r.is_premium).collect();
    let premium_conversions = converted.len() as u64;

    let conversion_rate = if total_referrals == 0 {
      0.0
    } else {
      premium_conversions as f64 / total_referrals as f64 * 100.0
    };

    // averaged over the converted subset only
    let days: Vec<f64> = converted
      .iter()
      .filter_map(|r| {
        r.premium_conversion_date
          .map(|conv| (conv - r.referral_date).num_seconds() as f64 / 86_400.0)
      })
      .collect();

    let avg_days_to_conversion = if days.is_empty() {
      0.0
    } else {
      days.iter().sum::<f64>() / days.len() as f64
    };

    Ok(ConversionStats {
      total_referrals,
      premium_conversions,
      conversion_rate,
      avg_days_to_conversion,
    })
  }
}

#[derive(Debug, Serialize)]
pub struct ConversionStats {
  pub total_referrals: u64,
  pub premium_conversions: u64,
  pub conversion_rate: f64,
  pub avg_days_to_conversion: f64,
}
