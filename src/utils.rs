use crate::prelude::*;

/// First and last calendar day of the month containing `day`.
/// Billing periods are keyed off the server clock at reconciliation time,
/// not the purchase timestamp, so a delayed reconciliation near a month
/// boundary lands in the month it was processed in.
pub fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
  let start = day.with_day(1).unwrap_or(day);

  let next_month = if start.month() == 12 {
    NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
  } else {
    NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
  };

  let end = next_month.map(|d| d - TimeDelta::days(1)).unwrap_or(start);
  (start, end)
}

/// Commission owed on `amount_cents` at `percentage`, rounded
/// half-away-from-zero to whole cents.
pub fn commission_cents(amount_cents: i64, percentage: f64) -> i64 {
  (amount_cents as f64 * percentage / 100.0).round() as i64
}

#[cfg(test)]
mod tests {
  use super::*;

  fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  #[test]
  fn month_bounds_mid_month() {
    let (start, end) = month_bounds(day(2026, 8, 25));
    assert_eq!(start, day(2026, 8, 1));
    assert_eq!(end, day(2026, 8, 31));
  }

  #[test]
  fn month_bounds_december_wraps_year() {
    let (start, end) = month_bounds(day(2025, 12, 31));
    assert_eq!(start, day(2025, 12, 1));
    assert_eq!(end, day(2025, 12, 31));
  }

  #[test]
  fn month_bounds_leap_february() {
    let (start, end) = month_bounds(day(2028, 2, 15));
    assert_eq!(start, day(2028, 2, 1));
    assert_eq!(end, day(2028, 2, 29));
  }

  #[test]
  fn commission_rounds_half_up() {
    // $99.99 at 30% = $29.997 -> $30.00
    assert_eq!(commission_cents(9999, 30.0), 3000);
    // $99.99 at 15% = $14.9985 -> $15.00
    assert_eq!(commission_cents(9999, 15.0), 1500);
    // $10.00 at 25% = $2.50 exactly
    assert_eq!(commission_cents(1000, 25.0), 250);
    // $0.01 at 30% = $0.003 -> $0.00
    assert_eq!(commission_cents(1, 30.0), 0);
  }
}
