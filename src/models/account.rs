use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{AppError, Result};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Customer,
    Affiliate,
    ShopOwner,
    Admin,
}

/// Capability set of an account. Stored as a comma-separated column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roles(BTreeSet<Role>);

impl Roles {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self(roles.into_iter().collect())
    }

    pub fn has(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }

    pub fn to_column(&self) -> String {
        self.0
            .iter()
            .map(|r| r.as_ref())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn from_column(value: &str) -> std::result::Result<Self, strum::ParseError> {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<std::result::Result<BTreeSet<_>, _>>()
            .map(Self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub roles: Roles,
    pub balance: i64,
    pub active: bool,
    pub created_at: i64,
}

impl Account {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.has(role)
    }

    pub fn require_role(&self, role: Role) -> Result<()> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Account lacks the {} capability",
                role.as_ref()
            )))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAccount {
    pub name: String,
    pub roles: Roles,
    /// Shop that invited this shop (creates a pending referral)
    #[serde(default)]
    pub referred_by: Option<String>,
}

impl CreateAccount {
    pub fn validate(&self) -> Result<()> {
        let name = self.name.trim();
        if name.is_empty() || name.len() > 120 {
            return Err(AppError::Validation(
                "Name must be between 1 and 120 characters".into(),
            ));
        }
        if self.roles.is_empty() {
            return Err(AppError::Validation("At least one role is required".into()));
        }
        if self.referred_by.is_some() && !self.roles.has(Role::ShopOwner) {
            return Err(AppError::Validation(
                "Only shop owners can be referred".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoles {
    pub roles: Roles,
}

/// API key bound to an account. Stands in for the external identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    pub account_id: String,
    pub prefix: String,
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<i64>,
}

/// Response when creating an account (includes full key, shown only once)
#[derive(Debug, Serialize)]
pub struct AccountCreated {
    #[serde(flatten)]
    pub account: Account,
    pub api_key: String,
}
