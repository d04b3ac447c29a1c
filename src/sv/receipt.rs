//! Client for the store's receipt-verification endpoint. The receipt blob
//! is opaque to us; the vendor answers with a status code plus the decoded
//! transaction list, and we pick the latest transaction out of it.
//!
//! Receipts from TestFlight/sandbox builds come back from the production
//! endpoint with a dedicated status; those are retried once against the
//! sandbox endpoint instead of surfacing an error to the caller.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{entity::Environment, prelude::*};

pub const PRODUCTION_URL: &str = "https://buy.itunes.apple.com/verifyReceipt";
pub const SANDBOX_URL: &str = "https://sandbox.itunes.apple.com/verifyReceipt";

/// Vendor status codes.
const STATUS_OK: i64 = 0;
const STATUS_SANDBOX_RECEIPT: i64 = 21007;

pub struct ReceiptClient {
  client: Client,
  shared_secret: String,
}

#[derive(Debug, Clone)]
pub struct VerifiedReceipt {
  pub product_id: String,
  pub transaction_id: String,
  pub original_transaction_id: String,
  pub purchase_date: DateTime,
  pub expires_date: DateTime,
  pub is_trial_period: bool,
  pub auto_renew_status: bool,
  pub environment: Environment,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
  #[serde(rename = "receipt-data")]
  receipt_data: &'a str,
  password: &'a str,
  #[serde(rename = "exclude-old-transactions")]
  exclude_old_transactions: bool,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
  status: i64,
  environment: Option<String>,
  latest_receipt_info: Option<Vec<ReceiptInfo>>,
  pending_renewal_info: Option<Vec<RenewalInfo>>,
}

#[derive(Debug, Deserialize)]
struct ReceiptInfo {
  product_id: String,
  transaction_id: String,
  original_transaction_id: String,
  purchase_date_ms: String,
  expires_date_ms: Option<String>,
  // vendor sends booleans as strings
  is_trial_period: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RenewalInfo {
  auto_renew_status: Option<String>,
}

impl ReceiptClient {
  pub fn new(shared_secret: &str) -> Self {
    let client = Client::builder()
      .timeout(Duration::from_secs(10))
      .build()
      .expect("failed to build HTTP client");

    Self { client, shared_secret: shared_secret.to_string() }
  }

  pub async fn verify(&self, receipt_data: &str) -> Result<VerifiedReceipt> {
    let response = self.post(PRODUCTION_URL, receipt_data).await?;

    let response = if response.status == STATUS_SANDBOX_RECEIPT {
      debug!("sandbox receipt sent to production, retrying against sandbox");
      self.post(SANDBOX_URL, receipt_data).await?
    } else {
      response
    };

    parse(response)
  }

  async fn post(
    &self,
    url: &str,
    receipt_data: &str,
  ) -> Result<VerifyResponse> {
    let body = VerifyRequest {
      receipt_data,
      password: &self.shared_secret,
      exclude_old_transactions: true,
    };

    Ok(self.client.post(url).json(&body).send().await?.json().await?)
  }
}

fn parse(response: VerifyResponse) -> Result<VerifiedReceipt> {
  if response.status != STATUS_OK {
    return Err(Error::ExternalValidation(format!(
      "vendor status {}",
      response.status
    )));
  }

  let latest = response
    .latest_receipt_info
    .unwrap_or_default()
    .into_iter()
    .max_by_key(|info| {
      info
        .expires_date_ms
        .as_deref()
        .and_then(|ms| ms.parse::<i64>().ok())
        .unwrap_or(0)
    })
    .ok_or_else(|| {
      Error::ExternalValidation("receipt contains no transactions".into())
    })?;

  let purchase_date = ms_to_naive(&latest.purchase_date_ms)?;
  let expires_date = match &latest.expires_date_ms {
    Some(ms) => ms_to_naive(ms)?,
    // non-expiring product
    None => purchase_date + TimeDelta::days(36_500),
  };

  let environment = match response.environment.as_deref() {
    Some("Sandbox") => Environment::Sandbox,
    _ => Environment::Production,
  };

  let auto_renew_status = response
    .pending_renewal_info
    .unwrap_or_default()
    .first()
    .and_then(|info| info.auto_renew_status.as_deref())
    .map(|status| status == "1")
    .unwrap_or(false);

  Ok(VerifiedReceipt {
    product_id: latest.product_id,
    transaction_id: latest.transaction_id,
    original_transaction_id: latest.original_transaction_id,
    purchase_date,
    expires_date,
    is_trial_period: latest.is_trial_period.as_deref() == Some("true"),
    auto_renew_status,
    environment,
  })
}

fn ms_to_naive(ms: &str) -> Result<DateTime> {
  let ms: i64 = ms.parse().map_err(|_| {
    Error::ExternalValidation("malformed timestamp in receipt".into())
  })?;

  chrono::DateTime::from_timestamp_millis(ms)
    .map(|dt| dt.naive_utc())
    .ok_or_else(|| {
      Error::ExternalValidation("timestamp out of range in receipt".into())
    })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn info(tx: &str, expires_ms: i64) -> ReceiptInfo {
    ReceiptInfo {
      product_id: "com.nutrifit.premium.yearly".into(),
      transaction_id: tx.into(),
      original_transaction_id: "tx-0".into(),
      purchase_date_ms: "1755000000000".into(),
      expires_date_ms: Some(expires_ms.to_string()),
      is_trial_period: Some("false".into()),
    }
  }

  #[test]
  fn parse_picks_latest_transaction() {
    let response = VerifyResponse {
      status: 0,
      environment: Some("Production".into()),
      latest_receipt_info: Some(vec![
        info("tx-1", 1_760_000_000_000),
        info("tx-2", 1_790_000_000_000),
      ]),
      pending_renewal_info: Some(vec![RenewalInfo {
        auto_renew_status: Some("1".into()),
      }]),
    };

    let verified = parse(response).unwrap();
    assert_eq!(verified.transaction_id, "tx-2");
    assert!(verified.auto_renew_status);
    assert_eq!(verified.environment, Environment::Production);
  }

  #[test]
  fn parse_rejects_vendor_error_status() {
    let response = VerifyResponse {
      status: 21003,
      environment: None,
      latest_receipt_info: None,
      pending_renewal_info: None,
    };

    assert!(matches!(parse(response), Err(Error::ExternalValidation(_))));
  }

  #[test]
  fn parse_rejects_empty_transaction_list() {
    let response = VerifyResponse {
      status: 0,
      environment: Some("Production".into()),
      latest_receipt_info: Some(vec![]),
      pending_renewal_info: None,
    };

    assert!(matches!(parse(response), Err(Error::ExternalValidation(_))));
  }

  #[test]
  fn parse_maps_sandbox_environment_and_trial() {
    let mut trial = info("tx-1", 1_790_000_000_000);
    trial.is_trial_period = Some("true".into());

    let response = VerifyResponse {
      status: 0,
      environment: Some("Sandbox".into()),
      latest_receipt_info: Some(vec![trial]),
      pending_renewal_info: None,
    };

    let verified = parse(response).unwrap();
    assert!(verified.is_trial_period);
    assert_eq!(verified.environment, Environment::Sandbox);
    assert!(!verified.auto_renew_status);
  }

  #[test]
  fn malformed_timestamp_rejected() {
    assert!(matches!(ms_to_naive("nope"), Err(Error::ExternalValidation(_))));
    assert!(ms_to_naive("1755000000000").is_ok());
  }
}
