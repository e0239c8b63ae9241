mod account;
mod audit_log;
mod coupon;
mod credit_key;
mod credit_log;
mod redemption;
mod referral;

pub use account::*;
pub use audit_log::*;
pub use coupon::*;
pub use credit_key::*;
pub use credit_log::*;
pub use redemption::*;
pub use referral::*;
