pub mod code;
pub mod commission;
pub mod receipt;
pub mod reconcile;
pub mod referral;
pub mod subscription;
#[cfg(test)]
pub mod test_utils;

pub use code::Codes;
pub use commission::Commissions;
pub use receipt::ReceiptClient;
pub use reconcile::Reconciler;
pub use referral::Referrals;
pub use subscription::Subscriptions;
