use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{AppError, Result};
use crate::models::MAX_CREDIT_AMOUNT;

const SECONDS_PER_DAY: i64 = 86400;
const MAX_TITLE_LEN: usize = 120;
const MAX_DESCRIPTION_LEN: usize = 2000;
const MAX_USES_LIMIT: i64 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ValidityType {
    ExpiryDate,
    Days,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    Active,
    Exhausted,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub id: String,
    pub shop_id: String,
    pub title: String,
    pub description: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub max_uses: i64,
    pub uses_left: i64,
    pub customer_reward_points: i64,
    pub affiliate_commission: i64,
    pub validity_type: ValidityType,
    pub validity_days: Option<i64>,
    pub expires_at: i64,
    pub clicks: i64,
    pub created_at: i64,
}

impl Coupon {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Expired takes precedence over exhausted; both are terminal.
    pub fn status(&self, now: i64) -> CouponStatus {
        if self.is_expired(now) {
            CouponStatus::Expired
        } else if self.uses_left <= 0 {
            CouponStatus::Exhausted
        } else {
            CouponStatus::Active
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CouponView {
    #[serde(flatten)]
    pub coupon: Coupon,
    pub status: CouponStatus,
}

impl CouponView {
    pub fn new(coupon: Coupon, now: i64) -> Self {
        let status = coupon.status(now);
        Self { coupon, status }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCoupon {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub max_uses: i64,
    pub validity_type: ValidityType,
    /// Last valid day (UTC) when validity_type is expiry_date
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    /// Days from creation when validity_type is days
    #[serde(default)]
    pub validity_days: Option<i64>,
    #[serde(default)]
    pub affiliate_commission: i64,
    #[serde(default)]
    pub customer_reward_points: i64,
}

impl CreateCoupon {
    pub fn validate(&self, now: i64) -> Result<()> {
        let title = self.title.trim();
        if title.is_empty() || title.len() > MAX_TITLE_LEN {
            return Err(AppError::Validation(format!(
                "Title must be between 1 and {} characters",
                MAX_TITLE_LEN
            )));
        }
        if self.description.len() > MAX_DESCRIPTION_LEN {
            return Err(AppError::Validation(format!(
                "Description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }
        if self.max_uses < 1 || self.max_uses > MAX_USES_LIMIT {
            return Err(AppError::Validation(format!(
                "max_uses must be between 1 and {}",
                MAX_USES_LIMIT
            )));
        }
        match self.discount_type {
            DiscountType::Percentage if !(1..=100).contains(&self.discount_value) => {
                return Err(AppError::Validation(
                    "Percentage discount must be between 1 and 100".into(),
                ));
            }
            DiscountType::Fixed if !(1..=MAX_CREDIT_AMOUNT).contains(&self.discount_value) => {
                return Err(AppError::Validation(format!(
                    "Fixed discount must be between 1 and {}",
                    MAX_CREDIT_AMOUNT
                )));
            }
            _ => {}
        }
        let payout = 0..=MAX_CREDIT_AMOUNT;
        if !payout.contains(&self.affiliate_commission)
            || !payout.contains(&self.customer_reward_points)
        {
            return Err(AppError::Validation(format!(
                "Commission and reward points must be between 0 and {}",
                MAX_CREDIT_AMOUNT
            )));
        }
        // Resolving the expiry runs the remaining validity checks
        self.resolve_expiry(now).map(|_| ())
    }

    /// Compute the absolute expiry timestamp for a coupon created at `now`.
    pub fn resolve_expiry(&self, now: i64) -> Result<i64> {
        let expires_at = match self.validity_type {
            ValidityType::ExpiryDate => {
                let date = self.expiry_date.ok_or_else(|| {
                    AppError::Validation("expiry_date is required for expiry_date validity".into())
                })?;
                // Valid through the whole expiry day
                date.and_time(NaiveTime::MIN).and_utc().timestamp() + SECONDS_PER_DAY
            }
            ValidityType::Days => {
                let days = self.validity_days.ok_or_else(|| {
                    AppError::Validation("validity_days is required for days validity".into())
                })?;
                if !(1..=3650).contains(&days) {
                    return Err(AppError::Validation(
                        "validity_days must be between 1 and 3650".into(),
                    ));
                }
                now + days * SECONDS_PER_DAY
            }
        };
        if expires_at <= now {
            return Err(AppError::Validation("Expiry date is in the past".into()));
        }
        Ok(expires_at)
    }
}

/// Result of consuming one use of a coupon.
#[derive(Debug, Clone)]
pub struct ConsumeResult {
    pub coupon: Coupon,
    pub uses_left_after: i64,
}
