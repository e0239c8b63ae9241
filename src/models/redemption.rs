use serde::{Deserialize, Serialize};

use crate::error::Rejection;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Redemption {
    pub id: String,
    pub coupon_id: String,
    pub customer_id: String,
    pub affiliate_id: Option<String>,
    pub reward_points: i64,
    pub commission: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedeemBody {
    #[serde(default)]
    pub affiliate_id: Option<String>,
    /// Hex HMAC from a signed affiliate link
    #[serde(default)]
    pub affiliate_sig: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Outcome of a redemption attempt. Rejections are expected results.
#[derive(Debug, Clone)]
pub enum RedemptionOutcome {
    Succeeded {
        redemption: Redemption,
        /// True when an earlier attempt with the same idempotency key is returned
        replayed: bool,
    },
    Rejected(Rejection),
}

impl RedemptionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<Rejection>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redemption: Option<Redemption>,
}

impl From<RedemptionOutcome> for RedeemResponse {
    fn from(outcome: RedemptionOutcome) -> Self {
        match outcome {
            RedemptionOutcome::Succeeded { redemption, replayed } => {
                let message = if replayed {
                    "Coupon already redeemed successfully".to_string()
                } else if redemption.reward_points > 0 {
                    format!(
                        "Coupon redeemed successfully! You earned {} points.",
                        redemption.reward_points
                    )
                } else {
                    "Coupon redeemed successfully!".to_string()
                };
                Self {
                    success: true,
                    code: None,
                    message,
                    redemption: Some(redemption),
                }
            }
            RedemptionOutcome::Rejected(reason) => Self {
                success: false,
                code: Some(reason),
                message: reason.message().to_string(),
                redemption: None,
            },
        }
    }
}
