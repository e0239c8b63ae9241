use rusqlite::Connection;

use crate::error::Result;

/// Create the main database schema. Idempotent.
///
/// CHECK constraints mirror the ledger invariants: balances never go
/// negative and `0 <= uses_left <= max_uses`.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            roles TEXT NOT NULL,
            balance INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0),
            active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS api_keys (
            id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL REFERENCES accounts(id),
            prefix TEXT NOT NULL,
            key_hash TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL,
            revoked_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_api_keys_account ON api_keys(account_id);

        CREATE TABLE IF NOT EXISTS coupons (
            id TEXT PRIMARY KEY,
            shop_id TEXT NOT NULL REFERENCES accounts(id),
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            discount_type TEXT NOT NULL,
            discount_value INTEGER NOT NULL,
            max_uses INTEGER NOT NULL CHECK (max_uses > 0),
            uses_left INTEGER NOT NULL CHECK (uses_left >= 0 AND uses_left <= max_uses),
            customer_reward_points INTEGER NOT NULL CHECK (customer_reward_points >= 0),
            affiliate_commission INTEGER NOT NULL CHECK (affiliate_commission >= 0),
            validity_type TEXT NOT NULL,
            validity_days INTEGER,
            expires_at INTEGER NOT NULL,
            clicks INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_coupons_shop ON coupons(shop_id);

        CREATE TABLE IF NOT EXISTS redemptions (
            id TEXT PRIMARY KEY,
            coupon_id TEXT NOT NULL REFERENCES coupons(id),
            customer_id TEXT NOT NULL REFERENCES accounts(id),
            affiliate_id TEXT,
            reward_points INTEGER NOT NULL,
            commission INTEGER NOT NULL,
            idempotency_key TEXT,
            created_at INTEGER NOT NULL,
            UNIQUE (customer_id, idempotency_key)
        );
        CREATE INDEX IF NOT EXISTS idx_redemptions_coupon_customer
            ON redemptions(coupon_id, customer_id);
        CREATE INDEX IF NOT EXISTS idx_redemptions_customer ON redemptions(customer_id);
        CREATE INDEX IF NOT EXISTS idx_redemptions_affiliate ON redemptions(affiliate_id);

        CREATE TABLE IF NOT EXISTS referrals (
            id TEXT PRIMARY KEY,
            referrer_shop_id TEXT NOT NULL REFERENCES accounts(id),
            referred_shop_id TEXT NOT NULL UNIQUE REFERENCES accounts(id),
            status TEXT NOT NULL,
            bonus INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            rewarded_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_referrals_referrer ON referrals(referrer_shop_id);

        CREATE TABLE IF NOT EXISTS credit_requests (
            id TEXT PRIMARY KEY,
            shop_id TEXT NOT NULL REFERENCES accounts(id),
            requested_amount INTEGER NOT NULL CHECK (requested_amount > 0),
            message TEXT NOT NULL,
            status TEXT NOT NULL,
            admin_response TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_credit_requests_shop ON credit_requests(shop_id);
        CREATE INDEX IF NOT EXISTS idx_credit_requests_status ON credit_requests(status);

        CREATE TABLE IF NOT EXISTS credit_keys (
            id TEXT PRIMARY KEY,
            shop_id TEXT NOT NULL REFERENCES accounts(id),
            request_id TEXT REFERENCES credit_requests(id),
            key_code TEXT NOT NULL UNIQUE,
            credit_amount INTEGER NOT NULL CHECK (credit_amount > 0),
            is_used INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            used_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_credit_keys_shop ON credit_keys(shop_id);

        CREATE TABLE IF NOT EXISTS credit_log (
            id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL REFERENCES accounts(id),
            delta INTEGER NOT NULL CHECK (delta <> 0),
            balance_after INTEGER NOT NULL CHECK (balance_after >= 0),
            reason TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_credit_log_account ON credit_log(account_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_credit_log_entity ON credit_log(entity_id);
        CREATE INDEX IF NOT EXISTS idx_credit_log_created ON credit_log(created_at);
        ",
    )?;
    Ok(())
}

/// Create the audit database schema. Idempotent.
pub fn init_audit_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS audit_logs (
            id TEXT PRIMARY KEY,
            timestamp INTEGER NOT NULL,
            actor_type TEXT NOT NULL,
            actor_id TEXT,
            action TEXT NOT NULL,
            resource_type TEXT NOT NULL,
            resource_id TEXT NOT NULL,
            details TEXT,
            ip_address TEXT,
            user_agent TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_audit_logs_timestamp ON audit_logs(timestamp);
        CREATE INDEX IF NOT EXISTS idx_audit_logs_actor ON audit_logs(actor_type, actor_id);
        CREATE INDEX IF NOT EXISTS idx_audit_logs_resource ON audit_logs(resource_type, resource_id);
        ",
    )?;
    Ok(())
}
