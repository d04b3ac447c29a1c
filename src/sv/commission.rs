use chrono::NaiveTime;
use serde::Serialize;

use crate::{
  entity::{PaymentStatus, SubscriptionType, affiliate_commission, affiliate_payment},
  prelude::*,
  sv::{Codes, Referrals},
  utils,
};

/// Ledger of affiliate commissions: one row per referred user per billing
/// period, deduplicated by the storage-level unique index.
pub struct Commissions<'a> {
  db: &'a DatabaseConnection,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CommissionFilter {
  pub limit: Option<u64>,
  pub offset: Option<u64>,
  pub paid_only: bool,
  pub unpaid_only: bool,
  pub date_from: Option<NaiveDate>,
  pub date_to: Option<NaiveDate>,
}

impl<'a> Commissions<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// First qualifying purchase of a referred user. Flips the referral to
  /// premium, then books the commission for the current billing period.
  /// Returns `None` for users without a referral.
  pub async fn record_conversion(
    &self,
    user_id: i64,
    subscription_id: &str,
    amount_cents: i64,
    ty: SubscriptionType,
  ) -> Result<Option<affiliate_commission::Model>> {
    self.record(user_id, subscription_id, amount_cents, ty, false).await
  }

  /// Recurring billing of an already-converted user. At most one commission
  /// per (user, code, period); a repeat within the same period returns
  /// `None`.
  pub async fn record_renewal(
    &self,
    user_id: i64,
    subscription_id: &str,
    amount_cents: i64,
    ty: SubscriptionType,
  ) -> Result<Option<affiliate_commission::Model>> {
    self.record(user_id, subscription_id, amount_cents, ty, true).await
  }

  async fn record(
    &self,
    user_id: i64,
    subscription_id: &str,
    amount_cents: i64,
    ty: SubscriptionType,
    is_renewal: bool,
  ) -> Result<Option<affiliate_commission::Model>> {
    let referrals = Referrals::new(self.db);

    // not every user is referred
    let Some(referral) = referrals.by_user(user_id).await? else {
      return Ok(None);
    };

    if !is_renewal {
      referrals.mark_premium(referral.id).await?;
    }

    let Some(code) = Codes::new(self.db).by_code(&referral.affiliate_code).await?
    else {
      // commission is forfeited, but the forfeit must be observable
      warn!(
        user_id,
        code = %referral.affiliate_code,
        "referral points at an inactive affiliate code, skipping commission"
      );
      return Ok(None);
    };

    // Billing period is the calendar month of the server clock at
    // reconciliation time, not of the purchase event.
    let (period_start, period_end) =
      utils::month_bounds(Utc::now().date_naive());

    if is_renewal {
      let existing = affiliate_commission::Entity::find()
        .filter(affiliate_commission::Column::UserId.eq(user_id))
        .filter(affiliate_commission::Column::AffiliateCode.eq(&code.code))
        .filter(affiliate_commission::Column::PeriodStart.eq(period_start))
        .filter(affiliate_commission::Column::PeriodEnd.eq(period_end))
        .one(self.db)
        .await?;

      if existing.is_some() {
        return Ok(None);
      }
    }

    let now = Utc::now().naive_utc();
    let inserted = affiliate_commission::ActiveModel {
      id: NotSet,
      affiliate_code: Set(code.code.clone()),
      user_id: Set(user_id),
      subscription_id: Set(subscription_id.to_string()),
      commission_cents: Set(utils::commission_cents(
        amount_cents,
        code.commission_percentage,
      )),
      commission_percentage: Set(code.commission_percentage),
      subscription_cents: Set(amount_cents),
      period_start: Set(period_start),
      period_end: Set(period_end),
      is_paid: Set(false),
      paid_date: Set(None),
      payment_method: Set(None),
      payment_reference: Set(None),
      created_at: Set(now),
      updated_at: Set(now),
    }
    .insert(self.db)
    .await;

    match inserted {
      Ok(model) => {
        info!(
          user_id,
          code = %model.affiliate_code,
          cents = model.commission_cents,
          ?ty,
          renewal = is_renewal,
          "commission recorded"
        );
        Ok(Some(model))
      }
      // a concurrent reconciliation won the insert race
      Err(err)
        if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
      {
        debug!(user_id, "commission already recorded for this period");
        Ok(None)
      }
      Err(err) => Err(err.into()),
    }
  }

  /// Commissions for a code, newest first. `paid_only` wins when both paid
  /// filters are set.
  pub async fn by_code(
    &self,
    code: &str,
    filter: CommissionFilter,
  ) -> Result<Vec<affiliate_commission::Model>> {
    let mut query = affiliate_commission::Entity::find()
      .filter(
        affiliate_commission::Column::AffiliateCode
          .eq(code.trim().to_uppercase()),
      )
      .order_by_desc(affiliate_commission::Column::CreatedAt);

    if filter.paid_only {
      query = query.filter(affiliate_commission::Column::IsPaid.eq(true));
    } else if filter.unpaid_only {
      query = query.filter(affiliate_commission::Column::IsPaid.eq(false));
    }

    if let Some(from) = filter.date_from {
      query = query.filter(
        affiliate_commission::Column::CreatedAt
          .gte(from.and_time(NaiveTime::MIN)),
      );
    }
    if let Some(to) = filter.date_to {
      query = query.filter(
        affiliate_commission::Column::CreatedAt
          .lt((to + TimeDelta::days(1)).and_time(NaiveTime::MIN)),
      );
    }

    if let Some(limit) = filter.limit {
      query = query.limit(limit);
    }
    if let Some(offset) = filter.offset {
      query = query.offset(offset);
    }

    Ok(query.all(self.db).await?)
  }

  /// Settle a single commission. Safe to repeat: the original paid date is
  /// kept, only the payment metadata is overwritten.
  pub async fn mark_paid(
    &self,
    id: i32,
    payment_method: &str,
    payment_reference: Option<String>,
  ) -> Result<affiliate_commission::Model> {
    let commission = affiliate_commission::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::NotFound("commission"))?;

    let now = Utc::now().naive_utc();
    let paid_date = commission.paid_date.unwrap_or(now);

    Ok(
      affiliate_commission::ActiveModel {
        is_paid: Set(true),
        paid_date: Set(Some(paid_date)),
        payment_method: Set(Some(payment_method.to_string())),
        payment_reference: Set(payment_reference),
        updated_at: Set(now),
        ..commission.into()
      }
      .update(self.db)
      .await?,
    )
  }

  /// Settle a batch of commissions for one code and write a single payment
  /// summary row, all in one transaction. Ids belonging to another code, or
  /// already paid, are silently excluded from the batch and the total.
  pub async fn process_bulk_payment(
    &self,
    code: &str,
    ids: &[i32],
    payment_method: &str,
    payment_reference: Option<String>,
  ) -> Result<BulkPayment> {
    let code = code.trim().to_uppercase();
    let txn = self.db.begin().await?;

    let batch = affiliate_commission::Entity::find()
      .filter(affiliate_commission::Column::Id.is_in(ids.iter().copied()))
      .filter(affiliate_commission::Column::AffiliateCode.eq(&code))
      .filter(affiliate_commission::Column::IsPaid.eq(false))
      .all(&txn)
      .await?;

    if batch.is_empty() {
      return Err(Error::Validation(
        "no unpaid commissions matched the requested ids".into(),
      ));
    }

    let now = Utc::now().naive_utc();
    let total_cents: i64 = batch.iter().map(|c| c.commission_cents).sum();
    let count = batch.len();

    let mut paid = Vec::with_capacity(count);
    for commission in batch {
      paid.push(
        affiliate_commission::ActiveModel {
          is_paid: Set(true),
          paid_date: Set(Some(now)),
          payment_method: Set(Some(payment_method.to_string())),
          payment_reference: Set(payment_reference.clone()),
          updated_at: Set(now),
          ..commission.into()
        }
        .update(&txn)
        .await?,
      );
    }

    let payment = affiliate_payment::ActiveModel {
      id: NotSet,
      affiliate_code: Set(code),
      total_cents: Set(total_cents),
      commission_count: Set(count as i32),
      payment_method: Set(payment_method.to_string()),
      payment_reference: Set(payment_reference),
      status: Set(PaymentStatus::Completed),
      created_at: Set(now),
      paid_at: Set(Some(now)),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(BulkPayment { commissions: paid, payment })
  }

  pub async fn stats_by_code(
    &self,
    code: &str,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
  ) -> Result<CommissionStats> {
    let rows = self
      .by_code(code, CommissionFilter { date_from, date_to, ..Default::default() })
      .await?;

    let mut stats = CommissionStats::default();
    for row in &rows {
      stats.total_commissions += 1;
      stats.total_cents += row.commission_cents;
      if row.is_paid {
        stats.paid_count += 1;
        stats.paid_cents += row.commission_cents;
      } else {
        stats.pending_count += 1;
        stats.pending_cents += row.commission_cents;
      }
      stats.avg_percentage += row.commission_percentage;
    }
    if !rows.is_empty() {
      stats.avg_percentage /= rows.len() as f64;
    }

    Ok(stats)
  }
}

#[derive(Debug)]
pub struct BulkPayment {
  pub commissions: Vec<affiliate_commission::Model>,
  pub payment: affiliate_payment::Model,
}

#[derive(Debug, Default, Serialize)]
pub struct CommissionStats {
  pub total_commissions: u64,
  pub total_cents: i64,
  pub paid_cents: i64,
  pub pending_cents: i64,
  pub avg_percentage: f64,
  pub paid_count: u64,
  pub pending_count: u64,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::test_utils::test_db;

  const YEARLY_CENTS: i64 = 9999;

  async fn setup_referred_user(db: &DatabaseConnection, percentage: f64) {
    test_db::seed_user(db, 1, false, false).await;
    test_db::seed_user(db, 2, false, false).await;
    Codes::new(db)
      .create(Some("FIT10".into()), Some(percentage), 1)
      .await
      .unwrap();
    Referrals::new(db).register(2, "FIT10").await.unwrap();
  }

  #[tokio::test]
  async fn test_no_referral_no_commission() {
    let db = test_db::setup().await;
    test_db::seed_user(&db, 9, false, false).await;

    let result = Commissions::new(&db)
      .record_conversion(9, "tx-1", YEARLY_CENTS, SubscriptionType::Yearly)
      .await
      .unwrap();

    assert!(result.is_none());
    let count =
      affiliate_commission::Entity::find().count(&db).await.unwrap();
    assert_eq!(count, 0);
  }

  #[tokio::test]
  async fn test_conversion_creates_commission_and_marks_premium() {
    let db = test_db::setup().await;
    setup_referred_user(&db, 15.0).await;

    let commission = Commissions::new(&db)
      .record_conversion(2, "tx-1", YEARLY_CENTS, SubscriptionType::Yearly)
      .await
      .unwrap()
      .unwrap();

    // $99.99 at 15% = $14.9985 -> $15.00
    assert_eq!(commission.commission_cents, 1500);
    assert_eq!(commission.commission_percentage, 15.0);
    assert_eq!(commission.subscription_cents, YEARLY_CENTS);
    assert!(!commission.is_paid);

    let (start, end) = crate::utils::month_bounds(Utc::now().date_naive());
    assert_eq!(commission.period_start, start);
    assert_eq!(commission.period_end, end);

    let referral = Referrals::new(&db).by_user(2).await.unwrap().unwrap();
    assert!(referral.is_premium);
    assert!(referral.premium_conversion_date.is_some());
  }

  #[tokio::test]
  async fn test_renewal_exactly_once_per_period() {
    let db = test_db::setup().await;
    setup_referred_user(&db, 30.0).await;

    let sv = Commissions::new(&db);
    sv.record_conversion(2, "tx-1", YEARLY_CENTS, SubscriptionType::Yearly)
      .await
      .unwrap()
      .unwrap();

    // same period: renewal is deduplicated
    let repeat = sv
      .record_renewal(2, "tx-2", YEARLY_CENTS, SubscriptionType::Yearly)
      .await
      .unwrap();
    assert!(repeat.is_none());

    let count =
      affiliate_commission::Entity::find().count(&db).await.unwrap();
    assert_eq!(count, 1);
  }

  #[tokio::test]
  async fn test_duplicate_conversion_hits_unique_index() {
    let db = test_db::setup().await;
    setup_referred_user(&db, 30.0).await;

    // the conversion path has no pre-check, so the second insert lands on
    // the unique index and is mapped to None
    let sv = Commissions::new(&db);
    sv.record_conversion(2, "tx-1", YEARLY_CENTS, SubscriptionType::Yearly)
      .await
      .unwrap()
      .unwrap();
    let second = sv
      .record_conversion(2, "tx-1", YEARLY_CENTS, SubscriptionType::Yearly)
      .await
      .unwrap();

    assert!(second.is_none());
    let count =
      affiliate_commission::Entity::find().count(&db).await.unwrap();
    assert_eq!(count, 1);
  }

  #[tokio::test]
  async fn test_new_period_creates_new_commission() {
    let db = test_db::setup().await;
    setup_referred_user(&db, 15.0).await;

    // simulate last month's commission
    let (last_start, last_end) = crate::utils::month_bounds(
      Utc::now().date_naive() - TimeDelta::days(32),
    );
    let then = Utc::now().naive_utc() - TimeDelta::days(32);
    affiliate_commission::ActiveModel {
      id: NotSet,
      affiliate_code: Set("FIT10".into()),
      user_id: Set(2),
      subscription_id: Set("tx-1".into()),
      commission_cents: Set(1500),
      commission_percentage: Set(15.0),
      subscription_cents: Set(YEARLY_CENTS),
      period_start: Set(last_start),
      period_end: Set(last_end),
      is_paid: Set(false),
      paid_date: Set(None),
      payment_method: Set(None),
      payment_reference: Set(None),
      created_at: Set(then),
      updated_at: Set(then),
    }
    .insert(&db)
    .await
    .unwrap();

    let sv = Commissions::new(&db);
    let renewed = sv
      .record_renewal(2, "tx-2", YEARLY_CENTS, SubscriptionType::Yearly)
      .await
      .unwrap();
    assert!(renewed.is_some());

    // and a second renewal within the new period is a no-op
    let repeat = sv
      .record_renewal(2, "tx-3", YEARLY_CENTS, SubscriptionType::Yearly)
      .await
      .unwrap();
    assert!(repeat.is_none());

    let count =
      affiliate_commission::Entity::find().count(&db).await.unwrap();
    assert_eq!(count, 2);
  }

  #[tokio::test]
  async fn test_percentage_snapshot_isolation() {
    let db = test_db::setup().await;
    setup_referred_user(&db, 30.0).await;

    let commission = Commissions::new(&db)
      .record_conversion(2, "tx-1", YEARLY_CENTS, SubscriptionType::Yearly)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(commission.commission_percentage, 30.0);
    assert_eq!(commission.commission_cents, 3000);

    let code = Codes::new(&db).by_code("FIT10").await.unwrap().unwrap();
    Codes::new(&db).set_percentage(code.id, 50.0).await.unwrap();

    let unchanged = affiliate_commission::Entity::find_by_id(commission.id)
      .one(&db)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(unchanged.commission_percentage, 30.0);
    assert_eq!(unchanged.commission_cents, 3000);
  }

  #[tokio::test]
  async fn test_deactivated_code_skips_commission() {
    let db = test_db::setup().await;
    setup_referred_user(&db, 30.0).await;

    let code = Codes::new(&db).by_code("FIT10").await.unwrap().unwrap();
    Codes::new(&db).set_active(code.id, false).await.unwrap();

    let result = Commissions::new(&db)
      .record_conversion(2, "tx-1", YEARLY_CENTS, SubscriptionType::Yearly)
      .await
      .unwrap();

    assert!(result.is_none());
    // the referral is still flipped premium: access is granted either way
    let referral = Referrals::new(&db).by_user(2).await.unwrap().unwrap();
    assert!(referral.is_premium);
  }

  #[tokio::test]
  async fn test_mark_paid_idempotent() {
    let db = test_db::setup().await;
    setup_referred_user(&db, 30.0).await;

    let sv = Commissions::new(&db);
    let commission = sv
      .record_conversion(2, "tx-1", YEARLY_CENTS, SubscriptionType::Yearly)
      .await
      .unwrap()
      .unwrap();

    let paid =
      sv.mark_paid(commission.id, "paypal", Some("ref-1".into())).await.unwrap();
    assert!(paid.is_paid);
    let stamped = paid.paid_date.unwrap();

    let again =
      sv.mark_paid(commission.id, "wire", Some("ref-2".into())).await.unwrap();
    assert_eq!(again.paid_date, Some(stamped));
    assert_eq!(again.payment_method.as_deref(), Some("wire"));

    assert!(matches!(
      sv.mark_paid(9999, "paypal", None).await,
      Err(Error::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn test_bulk_payment_excludes_foreign_code() {
    let db = test_db::setup().await;
    test_db::seed_user(&db, 1, false, false).await;
    test_db::seed_user(&db, 2, false, false).await;
    test_db::seed_user(&db, 3, false, false).await;

    let codes = Codes::new(&db);
    codes.create(Some("FIT10".into()), Some(30.0), 1).await.unwrap();
    codes.create(Some("OTHER".into()), Some(30.0), 1).await.unwrap();

    let referrals = Referrals::new(&db);
    referrals.register(2, "FIT10").await.unwrap();
    referrals.register(3, "OTHER").await.unwrap();

    let sv = Commissions::new(&db);
    let c1 = sv
      .record_conversion(2, "tx-1", 9999, SubscriptionType::Yearly)
      .await
      .unwrap()
      .unwrap();
    let c2 = sv
      .record_conversion(3, "tx-2", 9999, SubscriptionType::Yearly)
      .await
      .unwrap()
      .unwrap();

    let result = sv
      .process_bulk_payment("FIT10", &[c1.id, c2.id], "paypal", None)
      .await
      .unwrap();

    assert_eq!(result.commissions.len(), 1);
    assert_eq!(result.payment.commission_count, 1);
    assert_eq!(result.payment.total_cents, c1.commission_cents);

    // the foreign-code commission was untouched
    let other = affiliate_commission::Entity::find_by_id(c2.id)
      .one(&db)
      .await
      .unwrap()
      .unwrap();
    assert!(!other.is_paid);
  }

  #[tokio::test]
  async fn test_bulk_payment_empty_batch_errors() {
    let db = test_db::setup().await;
    test_db::seed_user(&db, 1, false, false).await;
    Codes::new(&db).create(Some("FIT10".into()), None, 1).await.unwrap();

    let result = Commissions::new(&db)
      .process_bulk_payment("FIT10", &[42], "paypal", None)
      .await;
    assert!(matches!(result, Err(Error::Validation(_))));

    let payments =
      affiliate_payment::Entity::find().count(&db).await.unwrap();
    assert_eq!(payments, 0);
  }

  #[tokio::test]
  async fn test_stats_by_code() {
    let db = test_db::setup().await;
    setup_referred_user(&db, 30.0).await;
    test_db::seed_user(&db, 3, false, false).await;
    Referrals::new(&db).register(3, "FIT10").await.unwrap();

    let sv = Commissions::new(&db);
    let c1 = sv
      .record_conversion(2, "tx-1", 9999, SubscriptionType::Yearly)
      .await
      .unwrap()
      .unwrap();
    sv.record_conversion(3, "tx-2", 999, SubscriptionType::Monthly)
      .await
      .unwrap()
      .unwrap();
    sv.mark_paid(c1.id, "paypal", None).await.unwrap();

    let stats = sv.stats_by_code("FIT10", None, None).await.unwrap();
    assert_eq!(stats.total_commissions, 2);
    assert_eq!(stats.paid_count, 1);
    assert_eq!(stats.pending_count, 1);
    assert_eq!(stats.paid_cents, 3000);
    assert_eq!(stats.pending_cents, 300);
    assert_eq!(stats.total_cents, 3300);
    assert_eq!(stats.avg_percentage, 30.0);
  }

  #[tokio::test]
  async fn test_by_code_paid_filter_precedence() {
    let db = test_db::setup().await;
    setup_referred_user(&db, 30.0).await;

    let sv = Commissions::new(&db);
    let c = sv
      .record_conversion(2, "tx-1", 9999, SubscriptionType::Yearly)
      .await
      .unwrap()
      .unwrap();
    sv.mark_paid(c.id, "paypal", None).await.unwrap();

    // both filters set: paid_only wins
    let rows = sv
      .by_code("FIT10", CommissionFilter {
        paid_only: true,
        unpaid_only: true,
        ..Default::default()
      })
      .await
      .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_paid);
  }
}
