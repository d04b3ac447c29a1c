use serde::Serialize;

use crate::{
  entity::{Environment, SubscriptionType, subscription, user},
  prelude::*,
};

/// Owns the subscription rows and answers the one authoritative question:
/// is this user premium right now. Everything else in the app must go
/// through [`Subscriptions::status`] instead of reading rows directly,
/// otherwise the admin/affiliate auto-grant is missed.
pub struct Subscriptions<'a> {
  db: &'a DatabaseConnection,
}

#[derive(Debug, Serialize)]
pub struct Status {
  pub is_premium: bool,
  pub subscription_type: Option<SubscriptionType>,
  pub expires_at: Option<DateTime>,
  pub is_trial_period: bool,
  pub auto_renew_status: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<&'static str>,
}

impl Status {
  fn free() -> Self {
    Self {
      is_premium: false,
      subscription_type: None,
      expires_at: None,
      is_trial_period: false,
      auto_renew_status: false,
      reason: None,
    }
  }
}

/// Content fields of a freshly verified purchase, decoupled from the row
/// shape.
#[derive(Debug, Clone)]
pub struct NewSubscription {
  pub product_id: String,
  pub transaction_id: String,
  pub original_transaction_id: String,
  pub purchase_date: DateTime,
  pub expires_date: DateTime,
  pub is_trial_period: bool,
  pub auto_renew_status: bool,
  pub environment: Environment,
  pub receipt_data: Option<String>,
}

impl<'a> Subscriptions<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Resolve the premium verdict. Order: account-level auto-grant first,
  /// then the most recent active row with its expiry rechecked against the
  /// clock, because `is_active` is only as fresh as the last write.
  pub async fn status(&self, user_id: i64) -> Result<Status> {
    let user = user::Entity::find_by_id(user_id)
      .one(self.db)
      .await?
      .ok_or(Error::NotFound("user"))?;

    if user.is_admin || user.is_affiliate {
      return Ok(Status {
        is_premium: true,
        subscription_type: Some(SubscriptionType::Lifetime),
        expires_at: None,
        is_trial_period: false,
        auto_renew_status: false,
        reason: Some(if user.is_admin { "admin" } else { "affiliate" }),
      });
    }

    let Some(sub) = self.active(user_id).await? else {
      return Ok(Status::free());
    };

    let now = Utc::now().naive_utc();
    let is_premium = sub.expires_date > now;

    Ok(Status {
      is_premium,
      subscription_type: is_premium
        .then(|| SubscriptionType::from_product_id(&sub.product_id)),
      expires_at: Some(sub.expires_date),
      is_trial_period: sub.is_trial_period,
      auto_renew_status: sub.auto_renew_status,
      reason: None,
    })
  }

  /// Most recent active row for a user, by expiry.
  pub async fn active(
    &self,
    user_id: i64,
  ) -> Result<Option<subscription::Model>> {
    Ok(
      subscription::Entity::find()
        .filter(subscription::Column::UserId.eq(user_id))
        .filter(subscription::Column::IsActive.eq(true))
        .order_by_desc(subscription::Column::ExpiresDate)
        .one(self.db)
        .await?,
    )
  }

  /// Replace the user's active subscription: prior active rows are flipped
  /// inactive and the new row inserted in one transaction, so there is
  /// never a moment with zero or two active rows. Old rows stay around as
  /// history.
  pub async fn upsert(
    &self,
    user_id: i64,
    new: NewSubscription,
  ) -> Result<subscription::Model> {
    let txn = self.db.begin().await?;

    let active = subscription::Entity::find()
      .filter(subscription::Column::UserId.eq(user_id))
      .filter(subscription::Column::IsActive.eq(true))
      .all(&txn)
      .await?;

    for row in active {
      subscription::ActiveModel { is_active: Set(false), ..row.into() }
        .update(&txn)
        .await?;
    }

    let inserted = subscription::ActiveModel {
      id: NotSet,
      user_id: Set(user_id),
      product_id: Set(new.product_id),
      transaction_id: Set(new.transaction_id),
      original_transaction_id: Set(new.original_transaction_id),
      purchase_date: Set(new.purchase_date),
      expires_date: Set(new.expires_date),
      is_active: Set(true),
      is_trial_period: Set(new.is_trial_period),
      auto_renew_status: Set(new.auto_renew_status),
      environment: Set(new.environment),
      receipt_data: Set(new.receipt_data),
      created_at: Set(Utc::now().naive_utc()),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(inserted)
  }

  /// Deactivate every active row. Returns how many were flipped.
  pub async fn cancel(&self, user_id: i64) -> Result<u64> {
    let txn = self.db.begin().await?;

    let active = subscription::Entity::find()
      .filter(subscription::Column::UserId.eq(user_id))
      .filter(subscription::Column::IsActive.eq(true))
      .all(&txn)
      .await?;

    let count = active.len() as u64;
    for row in active {
      subscription::ActiveModel { is_active: Set(false), ..row.into() }
        .update(&txn)
        .await?;
    }

    txn.commit().await?;
    Ok(count)
  }

  /// All rows for a user, newest purchase first.
  pub async fn history(
    &self,
    user_id: i64,
  ) -> Result<Vec<subscription::Model>> {
    Ok(
      subscription::Entity::find()
        .filter(subscription::Column::UserId.eq(user_id))
        .order_by_desc(subscription::Column::PurchaseDate)
        .all(self.db)
        .await?,
    )
  }
}
