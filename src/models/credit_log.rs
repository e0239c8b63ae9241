use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::pagination::PaginationQuery;

/// Upper bound on any single credit movement.
pub const MAX_CREDIT_AMOUNT: i64 = 1_000_000_000;

/// Upper bound on any balance. Far enough below `i64::MAX` that
/// `balance + delta` never leaves SQLite's integer range.
pub const MAX_BALANCE: i64 = 1_000_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CreditReason {
    CouponFee,
    RedemptionReward,
    AffiliateCommission,
    ReferralBonus,
    CreditKey,
    AdminAdjustment,
    SignupBonus,
}

/// The entity a ledger movement is correlated with.
#[derive(Debug, Clone, Copy)]
pub struct EntityRef<'a> {
    pub entity_type: &'a str,
    pub entity_id: &'a str,
}

impl<'a> EntityRef<'a> {
    pub fn new(entity_type: &'a str, entity_id: &'a str) -> Self {
        Self {
            entity_type,
            entity_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditLogEntry {
    pub id: String,
    pub account_id: String,
    pub delta: i64,
    pub balance_after: i64,
    pub reason: CreditReason,
    pub entity_type: String,
    pub entity_id: String,
    pub created_at: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreditLogQuery {
    pub account_id: Option<String>,
    pub reason: Option<CreditReason>,
    pub entity_id: Option<String>,
    pub from_timestamp: Option<i64>,
    pub to_timestamp: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl CreditLogQuery {
    pub fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Balance vs. ledger comparison for one account.
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub account_id: String,
    pub balance: i64,
    pub log_total: i64,
    pub entry_count: i64,
    pub consistent: bool,
}

#[derive(Debug, Deserialize)]
pub struct AdjustCredits {
    pub delta: i64,
    #[serde(default)]
    pub note: Option<String>,
}
