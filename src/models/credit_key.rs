use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::Rejection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CreditRequestStatus {
    Pending,
    KeyGenerated,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditRequest {
    pub id: String,
    pub shop_id: String,
    pub requested_amount: i64,
    pub message: String,
    pub status: CreditRequestStatus,
    pub admin_response: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct SubmitCreditRequest {
    pub amount: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditKey {
    pub id: String,
    pub shop_id: String,
    pub request_id: Option<String>,
    pub key_code: String,
    pub credit_amount: i64,
    pub is_used: bool,
    pub created_at: i64,
    pub expires_at: i64,
    pub used_at: Option<i64>,
}

impl CreditKey {
    pub fn is_available(&self, now: i64) -> bool {
        !self.is_used && now < self.expires_at
    }
}

/// Admin input for turning a pending credit request into a key.
#[derive(Debug, Deserialize)]
pub struct IssueCreditKey {
    /// Defaults to the requested amount
    #[serde(default)]
    pub amount: Option<i64>,
    /// Absolute expiry; takes precedence over expires_in_days
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub expires_in_days: Option<i64>,
    #[serde(default)]
    pub admin_response: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActivateCreditKey {
    pub key_code: String,
}

#[derive(Debug, Clone)]
pub enum ActivationOutcome {
    Activated {
        key: CreditKey,
        credited: i64,
        balance: i64,
    },
    Rejected(Rejection),
}

#[derive(Debug, Serialize)]
pub struct ActivationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<Rejection>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credited: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<i64>,
}

impl From<ActivationOutcome> for ActivationResponse {
    fn from(outcome: ActivationOutcome) -> Self {
        match outcome {
            ActivationOutcome::Activated { credited, balance, .. } => Self {
                success: true,
                code: None,
                message: format!("Successfully added {} credits to your account", credited),
                credited: Some(credited),
                balance: Some(balance),
            },
            ActivationOutcome::Rejected(reason) => Self {
                success: false,
                code: Some(reason),
                message: reason.message().to_string(),
                credited: None,
                balance: None,
            },
        }
    }
}
