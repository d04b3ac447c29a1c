use serde::Deserialize;

use crate::{
  entity::{Environment, SubscriptionType, subscription, user},
  prelude::*,
  sv::{
    Commissions, ReceiptClient, Subscriptions,
    receipt::VerifiedReceipt,
    subscription::{NewSubscription, Status},
  },
};

/// List prices in cents, used when the triggering event carries no price
/// (the receipt path: the vendor's receipt does not include what was
/// charged).
pub const MONTHLY_CENTS: i64 = 999;
pub const YEARLY_CENTS: i64 = 9999;
pub const LIFETIME_CENTS: i64 = 19_999;

pub fn list_price_cents(ty: SubscriptionType) -> i64 {
  match ty {
    SubscriptionType::Monthly => MONTHLY_CENTS,
    SubscriptionType::Yearly => YEARLY_CENTS,
    SubscriptionType::Lifetime => LIFETIME_CENTS,
  }
}

/// A verified purchase, from either entry point (app-initiated receipt
/// verification or billing webhook). Both paths converge here so they
/// produce identical subscription and ledger effects.
#[derive(Debug, Clone)]
pub struct PurchaseEvent {
  pub user_id: i64,
  pub amount_cents: i64,
  pub new: NewSubscription,
}

impl PurchaseEvent {
  pub fn from_receipt(
    user_id: i64,
    receipt_data: &str,
    verified: VerifiedReceipt,
  ) -> Self {
    let ty = SubscriptionType::from_product_id(&verified.product_id);
    Self {
      user_id,
      amount_cents: list_price_cents(ty),
      new: NewSubscription {
        product_id: verified.product_id,
        transaction_id: verified.transaction_id,
        original_transaction_id: verified.original_transaction_id,
        purchase_date: verified.purchase_date,
        expires_date: verified.expires_date,
        is_trial_period: verified.is_trial_period,
        auto_renew_status: verified.auto_renew_status,
        environment: verified.environment,
        receipt_data: Some(receipt_data.to_string()),
      },
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
  InitialPurchase,
  Renewal,
  Cancellation,
  Expiration,
  #[serde(other)]
  Unknown,
}

/// Billing-provider webhook payload. Signature verification happens at the
/// HTTP layer before this is parsed.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
  #[serde(rename = "type")]
  pub ty: EventType,
  pub app_user_id: i64,
  pub product_id: String,
  pub transaction_id: String,
  /// price in dollars, as billed
  pub price: Option<f64>,
  pub purchased_at_ms: i64,
  pub expiration_at_ms: Option<i64>,
  pub environment: Option<String>,
}

/// Turns a verified purchase or webhook event into consistent subscription
/// plus commission state.
pub struct Reconciler<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Reconciler<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// App-initiated path: validate the receipt with the vendor, then
  /// reconcile. Returns the resolved status so the client sees the outcome
  /// of its own purchase immediately.
  pub async fn verify_and_reconcile(
    &self,
    receipts: &ReceiptClient,
    user_id: i64,
    receipt_data: &str,
  ) -> Result<Status> {
    let verified = receipts.verify(receipt_data).await?;
    let event = PurchaseEvent::from_receipt(user_id, receipt_data, verified);

    self.apply(event).await?;
    Subscriptions::new(self.db).status(user_id).await
  }

  /// Core reconciliation. Whether this is a conversion or a renewal is
  /// decided by the presence of a prior active subscription row, not by
  /// what the event calls itself.
  pub async fn apply(
    &self,
    event: PurchaseEvent,
  ) -> Result<subscription::Model> {
    user::Entity::find_by_id(event.user_id)
      .one(self.db)
      .await?
      .ok_or(Error::NotFound("user"))?;

    let subs = Subscriptions::new(self.db);
    let is_renewal = subs.active(event.user_id).await?.is_some();
    let sub = subs.upsert(event.user_id, event.new).await?;

    // The subscription write above is the user-facing guarantee; commission
    // bookkeeping is best effort and must never fail the verification.
    let ty = SubscriptionType::from_product_id(&sub.product_id);
    let ledger = Commissions::new(self.db);
    let recorded = if is_renewal {
      ledger
        .record_renewal(
          event.user_id,
          &sub.transaction_id,
          event.amount_cents,
          ty,
        )
        .await
    } else {
      ledger
        .record_conversion(
          event.user_id,
          &sub.transaction_id,
          event.amount_cents,
          ty,
        )
        .await
    };

    if let Err(err) = recorded {
      error!(
        user_id = event.user_id,
        tx = %sub.transaction_id,
        "affiliate accounting failed, subscription kept: {err}"
      );
    }

    Ok(sub)
  }

  pub async fn apply_webhook(&self, event: WebhookEvent) -> Result<()> {
    match event.ty {
      EventType::InitialPurchase | EventType::Renewal => {
        let ty = SubscriptionType::from_product_id(&event.product_id);
        let amount_cents = event
          .price
          .map(|dollars| (dollars * 100.0).round() as i64)
          .unwrap_or_else(|| list_price_cents(ty));

        let purchase_date = ms_to_naive(event.purchased_at_ms)?;
        let expires_date = match event.expiration_at_ms {
          Some(ms) => ms_to_naive(ms)?,
          None => purchase_date + TimeDelta::days(36_500),
        };

        let environment = match event.environment.as_deref() {
          Some(env) if env.eq_ignore_ascii_case("sandbox") => {
            Environment::Sandbox
          }
          _ => Environment::Production,
        };

        let purchase = PurchaseEvent {
          user_id: event.app_user_id,
          amount_cents,
          new: NewSubscription {
            product_id: event.product_id,
            transaction_id: event.transaction_id.clone(),
            original_transaction_id: event.transaction_id,
            purchase_date,
            expires_date,
            is_trial_period: false,
            auto_renew_status: true,
            environment,
            receipt_data: None,
          },
        };

        self.apply(purchase).await?;
      }
      EventType::Cancellation | EventType::Expiration => {
        let flipped =
          Subscriptions::new(self.db).cancel(event.app_user_id).await?;
        info!(
          user_id = event.app_user_id,
          flipped, "subscription deactivated by webhook"
        );
      }
      EventType::Unknown => {
        debug!(user_id = event.app_user_id, "ignoring unhandled webhook type");
      }
    }

    Ok(())
  }
}

fn ms_to_naive(ms: i64) -> Result<DateTime> {
  chrono::DateTime::from_timestamp_millis(ms)
    .map(|dt| dt.naive_utc())
    .ok_or_else(|| {
      Error::Validation("timestamp out of range in webhook event".into())
    })
}
