use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode},
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::{
  entity::{affiliate_code, affiliate_commission, subscription, user_referral},
  prelude::*,
  state::AppState,
  sv::{
    Codes, Commissions, Reconciler, Referrals, Subscriptions,
    code::CodeStats,
    commission::{CommissionFilter, CommissionStats},
    reconcile::WebhookEvent,
    referral::{ConversionStats, ListOpts},
    subscription::Status,
  },
};

type HmacSha256 = Hmac<Sha256>;

pub async fn health() -> Json<json::Value> {
  Json(json::json!({ "status": "ok" }))
}

// subscription endpoints

#[derive(Deserialize)]
pub struct VerifyReceiptReq {
  pub user_id: i64,
  pub receipt_data: String,
}

pub async fn verify_receipt(
  State(app): State<Arc<AppState>>,
  Json(req): Json<VerifyReceiptReq>,
) -> Result<Json<Status>> {
  if req.receipt_data.trim().is_empty() {
    return Err(Error::Validation("receipt_data is required".into()));
  }

  let status = Reconciler::new(&app.db)
    .verify_and_reconcile(&app.receipts, req.user_id, &req.receipt_data)
    .await?;

  Ok(Json(status))
}

pub async fn subscription_status(
  State(app): State<Arc<AppState>>,
  Path(user_id): Path<i64>,
) -> Result<Json<Status>> {
  Ok(Json(Subscriptions::new(&app.db).status(user_id).await?))
}

/// Public variant of [`subscription_status`], same resolver underneath so
/// the admin/affiliate auto-grant is never missed.
pub async fn check_premium(
  State(app): State<Arc<AppState>>,
  Path(user_id): Path<i64>,
) -> Result<Json<Status>> {
  Ok(Json(Subscriptions::new(&app.db).status(user_id).await?))
}

#[derive(Deserialize)]
pub struct CancelReq {
  pub user_id: i64,
}

pub async fn cancel_subscription(
  State(app): State<Arc<AppState>>,
  Json(req): Json<CancelReq>,
) -> Result<Json<json::Value>> {
  let deactivated = Subscriptions::new(&app.db).cancel(req.user_id).await?;
  Ok(Json(json::json!({ "success": true, "deactivated": deactivated })))
}

pub async fn subscription_history(
  State(app): State<Arc<AppState>>,
  Path(user_id): Path<i64>,
) -> Result<Json<Vec<subscription::Model>>> {
  Ok(Json(Subscriptions::new(&app.db).history(user_id).await?))
}

// billing webhook

pub async fn billing_webhook(
  State(app): State<Arc<AppState>>,
  headers: HeaderMap,
  body: String,
) -> Result<StatusCode> {
  let signature = headers
    .get("x-signature")
    .and_then(|value| value.to_str().ok())
    .ok_or(Error::InvalidSignature)?;

  verify_signature(&app.config.webhook_secret, body.as_bytes(), signature)?;

  let event: WebhookEvent = json::from_str(&body)
    .map_err(|err| Error::Validation(format!("malformed webhook: {err}")))?;

  Reconciler::new(&app.db).apply_webhook(event).await?;
  Ok(StatusCode::OK)
}

fn verify_signature(secret: &str, body: &[u8], signature: &str) -> Result<()> {
  let provided =
    hex::decode(signature).map_err(|_| Error::InvalidSignature)?;

  let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
    .map_err(|_| Error::InvalidSignature)?;
  mac.update(body);
  mac.verify_slice(&provided).map_err(|_| Error::InvalidSignature)
}

// affiliate code endpoints

#[derive(Deserialize)]
pub struct CreateCodeReq {
  pub code: Option<String>,
  pub commission_percentage: Option<f64>,
  pub created_by: i64,
}

pub async fn create_code(
  State(app): State<Arc<AppState>>,
  Json(req): Json<CreateCodeReq>,
) -> Result<Json<affiliate_code::Model>> {
  let code = Codes::new(&app.db)
    .create(req.code, req.commission_percentage, req.created_by)
    .await?;
  Ok(Json(code))
}

pub async fn list_codes(
  State(app): State<Arc<AppState>>,
) -> Result<Json<Vec<CodeStats>>> {
  Ok(Json(Codes::new(&app.db).active_with_stats().await?))
}

pub async fn activate_code(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i32>,
) -> Result<Json<json::Value>> {
  Codes::new(&app.db).set_active(id, true).await?;
  Ok(Json(json::json!({ "success": true })))
}

pub async fn deactivate_code(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i32>,
) -> Result<Json<json::Value>> {
  Codes::new(&app.db).set_active(id, false).await?;
  Ok(Json(json::json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct PercentageReq {
  pub commission_percentage: f64,
}

pub async fn update_percentage(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i32>,
  Json(req): Json<PercentageReq>,
) -> Result<Json<affiliate_code::Model>> {
  let code =
    Codes::new(&app.db).set_percentage(id, req.commission_percentage).await?;
  Ok(Json(code))
}

// referral endpoints

#[derive(Deserialize)]
pub struct RegisterReferralReq {
  pub user_id: i64,
  pub code: String,
}

pub async fn register_referral(
  State(app): State<Arc<AppState>>,
  Json(req): Json<RegisterReferralReq>,
) -> Result<Json<user_referral::Model>> {
  if req.code.trim().is_empty() {
    return Err(Error::Validation("code is required".into()));
  }

  let referral =
    Referrals::new(&app.db).register(req.user_id, &req.code).await?;
  Ok(Json(referral))
}

#[derive(Deserialize, Default)]
pub struct ReferralQuery {
  pub limit: Option<u64>,
  pub offset: Option<u64>,
  #[serde(default)]
  pub premium_only: bool,
}

pub async fn list_referrals(
  State(app): State<Arc<AppState>>,
  Path(code): Path<String>,
  Query(query): Query<ReferralQuery>,
) -> Result<Json<Vec<user_referral::Model>>> {
  let referrals = Referrals::new(&app.db)
    .by_code(&code, ListOpts {
      limit: query.limit,
      offset: query.offset,
      premium_only: query.premium_only,
    })
    .await?;
  Ok(Json(referrals))
}

pub async fn referral_stats(
  State(app): State<Arc<AppState>>,
  Path(code): Path<String>,
) -> Result<Json<ConversionStats>> {
  Ok(Json(Referrals::new(&app.db).conversion_stats(&code).await?))
}

// commission endpoints

#[derive(Deserialize, Default)]
pub struct CommissionQuery {
  pub limit: Option<u64>,
  pub offset: Option<u64>,
  #[serde(default)]
  pub paid_only: bool,
  #[serde(default)]
  pub unpaid_only: bool,
  pub date_from: Option<NaiveDate>,
  pub date_to: Option<NaiveDate>,
}

pub async fn list_commissions(
  State(app): State<Arc<AppState>>,
  Path(code): Path<String>,
  Query(query): Query<CommissionQuery>,
) -> Result<Json<Vec<affiliate_commission::Model>>> {
  let commissions = Commissions::new(&app.db)
    .by_code(&code, CommissionFilter {
      limit: query.limit,
      offset: query.offset,
      paid_only: query.paid_only,
      unpaid_only: query.unpaid_only,
      date_from: query.date_from,
      date_to: query.date_to,
    })
    .await?;
  Ok(Json(commissions))
}

#[derive(Deserialize, Default)]
pub struct StatsQuery {
  pub date_from: Option<NaiveDate>,
  pub date_to: Option<NaiveDate>,
}

pub async fn commission_stats(
  State(app): State<Arc<AppState>>,
  Path(code): Path<String>,
  Query(query): Query<StatsQuery>,
) -> Result<Json<CommissionStats>> {
  let stats = Commissions::new(&app.db)
    .stats_by_code(&code, query.date_from, query.date_to)
    .await?;
  Ok(Json(stats))
}

#[derive(Deserialize)]
pub struct MarkPaidReq {
  pub payment_method: String,
  pub payment_reference: Option<String>,
}

pub async fn mark_paid(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i32>,
  Json(req): Json<MarkPaidReq>,
) -> Result<Json<affiliate_commission::Model>> {
  let commission = Commissions::new(&app.db)
    .mark_paid(id, &req.payment_method, req.payment_reference)
    .await?;
  Ok(Json(commission))
}

#[derive(Deserialize)]
pub struct BulkPaymentReq {
  pub affiliate_code: String,
  pub commission_ids: Vec<i32>,
  pub payment_method: String,
  pub payment_reference: Option<String>,
}

pub async fn bulk_payment(
  State(app): State<Arc<AppState>>,
  Json(req): Json<BulkPaymentReq>,
) -> Result<Json<json::Value>> {
  let result = Commissions::new(&app.db)
    .process_bulk_payment(
      &req.affiliate_code,
      &req.commission_ids,
      &req.payment_method,
      req.payment_reference,
    )
    .await?;

  Ok(Json(json::json!({
    "payment": result.payment,
    "commissions": result.commissions,
  })))
}
