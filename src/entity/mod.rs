pub mod affiliate_code;
pub mod affiliate_commission;
pub mod affiliate_payment;
pub mod subscription;
pub mod user;
pub mod user_referral;

pub use affiliate_payment::PaymentStatus;
pub use subscription::{Environment, SubscriptionType};
