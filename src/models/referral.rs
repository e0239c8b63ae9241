use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReferralStatus {
    Pending,
    Rewarded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Referral {
    pub id: String,
    pub referrer_shop_id: String,
    pub referred_shop_id: String,
    pub status: ReferralStatus,
    /// Credits paid to the referrer (0 while pending)
    pub bonus: i64,
    pub created_at: i64,
    pub rewarded_at: Option<i64>,
}
