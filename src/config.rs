use std::env;

use crate::redemption::RedemptionPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub audit_database_path: String,
    pub base_url: String,
    pub bootstrap_admin_name: Option<String>,
    pub dev_mode: bool,
    /// Enable/disable audit logging entirely
    pub audit_log_enabled: bool,
    /// Days to retain audit logs before purging (0 = never purge)
    pub audit_log_retention_days: i64,
    pub economy: Economy,
    /// Max successful redemptions per customer per coupon (0 = unlimited)
    pub max_redemptions_per_customer: u32,
    /// When set, affiliate links must carry an HMAC signature
    pub affiliate_link_secret: Option<String>,
}

/// Fixed amounts of the credit economy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Economy {
    pub coupon_issuance_fee: i64,
    pub referral_bonus: i64,
    pub min_credit_request: i64,
    pub shop_signup_credits: i64,
}

impl Default for Economy {
    fn default() -> Self {
        Self {
            coupon_issuance_fee: 50,
            referral_bonus: 10_000,
            min_credit_request: 100,
            shop_signup_credits: 0,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("COUPONLEDGER_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env_parse("PORT", 3000);

        let base_url = env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let audit_log_enabled = env::var("AUDIT_LOG_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let defaults = Economy::default();
        let economy = Economy {
            coupon_issuance_fee: env_parse("COUPON_ISSUANCE_FEE", defaults.coupon_issuance_fee),
            referral_bonus: env_parse("REFERRAL_BONUS", defaults.referral_bonus),
            min_credit_request: env_parse("MIN_CREDIT_REQUEST", defaults.min_credit_request),
            shop_signup_credits: env_parse("SHOP_SIGNUP_CREDITS", defaults.shop_signup_credits),
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "couponledger.db".to_string()),
            audit_database_path: env::var("AUDIT_DATABASE_PATH")
                .unwrap_or_else(|_| "couponledger_audit.db".to_string()),
            base_url,
            bootstrap_admin_name: env::var("BOOTSTRAP_ADMIN_NAME").ok(),
            dev_mode,
            audit_log_enabled,
            audit_log_retention_days: env_parse("AUDIT_LOG_RETENTION_DAYS", 90),
            economy,
            max_redemptions_per_customer: env_parse("MAX_REDEMPTIONS_PER_CUSTOMER", 1),
            affiliate_link_secret: env::var("AFFILIATE_LINK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn redemption_policy(&self) -> RedemptionPolicy {
        RedemptionPolicy {
            max_per_customer: self.max_redemptions_per_customer,
            affiliate_link_secret: self.affiliate_link_secret.clone(),
        }
    }
}
