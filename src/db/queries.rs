use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, ToSql, params};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

use super::from_row::{
    ACCOUNT_COLS, AUDIT_LOG_COLS, COUPON_COLS, CREDIT_KEY_COLS, CREDIT_LOG_COLS,
    CREDIT_REQUEST_COLS, REDEMPTION_COLS, REFERRAL_COLS, query_all, query_one,
};

pub fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

const KEY_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const API_KEY_PREFIX: &str = "cl_";

/// Hash a secret (API key) for storage/lookup.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"couponledger-secret-v1:");
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Accumulates optional `AND` filters so COUNT and SELECT share one WHERE clause.
struct Filter {
    clause: String,
    params: Vec<Box<dyn ToSql>>,
}

impl Filter {
    fn new() -> Self {
        Self {
            clause: String::from("WHERE 1=1"),
            params: Vec::new(),
        }
    }

    fn eq<V: ToSql + 'static>(mut self, column: &str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.clause.push_str(&format!(" AND {} = ?", column));
            self.params.push(Box::new(v));
        }
        self
    }

    fn gte(mut self, column: &str, value: Option<i64>) -> Self {
        if let Some(v) = value {
            self.clause.push_str(&format!(" AND {} >= ?", column));
            self.params.push(Box::new(v));
        }
        self
    }

    fn lte(mut self, column: &str, value: Option<i64>) -> Self {
        if let Some(v) = value {
            self.clause.push_str(&format!(" AND {} <= ?", column));
            self.params.push(Box::new(v));
        }
        self
    }

    fn refs(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|b| b.as_ref()).collect()
    }

    fn count(&self, conn: &Connection, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {} {}", table, self.clause);
        Ok(conn.query_row(&sql, self.refs().as_slice(), |row| row.get(0))?)
    }
}

// ============ Accounts ============

pub fn create_account(conn: &Connection, name: &str, roles: &Roles) -> Result<Account> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO accounts (id, name, roles, balance, active, created_at)
         VALUES (?1, ?2, ?3, 0, 1, ?4)",
        params![&id, name.trim(), roles.to_column(), now],
    )?;

    Ok(Account {
        id,
        name: name.trim().to_string(),
        roles: roles.clone(),
        balance: 0,
        active: true,
        created_at: now,
    })
}

pub fn get_account_by_id(conn: &Connection, id: &str) -> Result<Option<Account>> {
    query_one(
        conn,
        &format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLS),
        &[&id],
    )
}

pub fn list_accounts_paginated(
    conn: &Connection,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Account>, i64)> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM accounts ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
            ACCOUNT_COLS
        ),
        params![limit, offset],
    )?;
    Ok((items, total))
}

pub fn update_account_roles(conn: &Connection, id: &str, roles: &Roles) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE accounts SET roles = ?1 WHERE id = ?2",
        params![roles.to_column(), id],
    )?;
    Ok(updated > 0)
}

/// Accounts are never deleted; deactivation blocks authentication.
pub fn deactivate_account(conn: &Connection, id: &str) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE accounts SET active = 0 WHERE id = ?1 AND active = 1",
        params![id],
    )?;
    Ok(updated > 0)
}

pub fn count_admins(conn: &Connection) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM accounts WHERE active = 1 AND (',' || roles || ',') LIKE '%,admin,%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ============ API Keys ============

/// Generate a new API key: `cl_` followed by 40 random characters.
pub fn generate_api_key() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let body: String = (0..40)
        .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
        .collect();
    format!("{}{}", API_KEY_PREFIX, body.to_lowercase())
}

/// Create an API key for an account. Returns the stored key and the plaintext,
/// which is never persisted.
pub fn create_api_key(conn: &Connection, account_id: &str) -> Result<(ApiKey, String)> {
    let id = gen_id();
    let now = now();
    let key = generate_api_key();
    let key_hash = hash_secret(&key);
    let prefix: String = key.chars().take(8).collect();

    conn.execute(
        "INSERT INTO api_keys (id, account_id, prefix, key_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&id, account_id, &prefix, &key_hash, now],
    )?;

    Ok((
        ApiKey {
            id,
            account_id: account_id.to_string(),
            prefix,
            key_hash,
            created_at: now,
            revoked_at: None,
        },
        key,
    ))
}

/// Resolve a bearer key to its active account.
pub fn get_account_by_api_key(conn: &Connection, api_key: &str) -> Result<Option<Account>> {
    let key_hash = hash_secret(api_key);
    query_one(
        conn,
        &format!(
            "SELECT {} FROM accounts
             WHERE active = 1 AND id = (
                 SELECT account_id FROM api_keys WHERE key_hash = ?1 AND revoked_at IS NULL
             )",
            ACCOUNT_COLS
        ),
        &[&key_hash],
    )
}

// ============ Coupons ============

pub fn insert_coupon(
    conn: &Connection,
    shop_id: &str,
    input: &CreateCoupon,
    expires_at: i64,
    now: i64,
) -> Result<Coupon> {
    let id = gen_id();

    conn.execute(
        "INSERT INTO coupons (id, shop_id, title, description, discount_type, discount_value, max_uses, uses_left, customer_reward_points, affiliate_commission, validity_type, validity_days, expires_at, clicks, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?8, ?9, ?10, ?11, ?12, 0, ?13)",
        params![
            &id,
            shop_id,
            input.title.trim(),
            &input.description,
            input.discount_type.as_ref(),
            input.discount_value,
            input.max_uses,
            input.customer_reward_points,
            input.affiliate_commission,
            input.validity_type.as_ref(),
            input.validity_days,
            expires_at,
            now
        ],
    )?;

    Ok(Coupon {
        id,
        shop_id: shop_id.to_string(),
        title: input.title.trim().to_string(),
        description: input.description.clone(),
        discount_type: input.discount_type,
        discount_value: input.discount_value,
        max_uses: input.max_uses,
        uses_left: input.max_uses,
        customer_reward_points: input.customer_reward_points,
        affiliate_commission: input.affiliate_commission,
        validity_type: input.validity_type,
        validity_days: input.validity_days,
        expires_at,
        clicks: 0,
        created_at: now,
    })
}

pub fn get_coupon_by_id(conn: &Connection, id: &str) -> Result<Option<Coupon>> {
    query_one(
        conn,
        &format!("SELECT {} FROM coupons WHERE id = ?1", COUPON_COLS),
        &[&id],
    )
}

pub fn list_coupons_for_shop(conn: &Connection, shop_id: &str) -> Result<Vec<Coupon>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM coupons WHERE shop_id = ?1 ORDER BY created_at DESC",
            COUPON_COLS
        ),
        &[&shop_id],
    )
}

pub fn list_coupons_paginated(
    conn: &Connection,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Coupon>, i64)> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM coupons", [], |row| row.get(0))?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM coupons ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
            COUPON_COLS
        ),
        params![limit, offset],
    )?;
    Ok((items, total))
}

pub fn count_coupons_for_shop(conn: &Connection, shop_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM coupons WHERE shop_id = ?1",
        params![shop_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Decrement `uses_left` by one if the coupon is still live at `now`.
/// Returns the remaining uses, or None when nothing was consumed.
pub fn decrement_coupon_use(conn: &Connection, id: &str, now: i64) -> Result<Option<i64>> {
    let remaining = conn
        .query_row(
            "UPDATE coupons SET uses_left = uses_left - 1
             WHERE id = ?1 AND uses_left > 0 AND expires_at > ?2
             RETURNING uses_left",
            params![id, now],
            |row| row.get(0),
        )
        .optional()?;
    Ok(remaining)
}

pub fn increment_coupon_clicks(conn: &Connection, id: &str) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE coupons SET clicks = clicks + 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(updated > 0)
}

// ============ Redemptions ============

#[allow(clippy::too_many_arguments)]
pub fn insert_redemption(
    conn: &Connection,
    coupon_id: &str,
    customer_id: &str,
    affiliate_id: Option<&str>,
    reward_points: i64,
    commission: i64,
    idempotency_key: Option<&str>,
    now: i64,
) -> Result<Redemption> {
    let id = gen_id();

    conn.execute(
        "INSERT INTO redemptions (id, coupon_id, customer_id, affiliate_id, reward_points, commission, idempotency_key, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![&id, coupon_id, customer_id, affiliate_id, reward_points, commission, idempotency_key, now],
    )?;

    Ok(Redemption {
        id,
        coupon_id: coupon_id.to_string(),
        customer_id: customer_id.to_string(),
        affiliate_id: affiliate_id.map(String::from),
        reward_points,
        commission,
        idempotency_key: idempotency_key.map(String::from),
        created_at: now,
    })
}

pub fn get_redemption_by_idempotency_key(
    conn: &Connection,
    customer_id: &str,
    idempotency_key: &str,
) -> Result<Option<Redemption>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM redemptions WHERE customer_id = ?1 AND idempotency_key = ?2",
            REDEMPTION_COLS
        ),
        &[&customer_id, &idempotency_key],
    )
}

pub fn count_redemptions_for_customer_coupon(
    conn: &Connection,
    customer_id: &str,
    coupon_id: &str,
) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM redemptions WHERE customer_id = ?1 AND coupon_id = ?2",
        params![customer_id, coupon_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_redemptions_for_coupon(conn: &Connection, coupon_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM redemptions WHERE coupon_id = ?1",
        params![coupon_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn list_redemptions_for_customer(conn: &Connection, customer_id: &str) -> Result<Vec<Redemption>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM redemptions WHERE customer_id = ?1 ORDER BY created_at DESC",
            REDEMPTION_COLS
        ),
        &[&customer_id],
    )
}

pub fn list_redemptions_for_affiliate(conn: &Connection, affiliate_id: &str) -> Result<Vec<Redemption>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM redemptions WHERE affiliate_id = ?1 ORDER BY created_at DESC",
            REDEMPTION_COLS
        ),
        &[&affiliate_id],
    )
}

pub fn list_redemptions_paginated(
    conn: &Connection,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Redemption>, i64)> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM redemptions", [], |row| row.get(0))?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM redemptions ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
            REDEMPTION_COLS
        ),
        params![limit, offset],
    )?;
    Ok((items, total))
}

// ============ Referrals ============

pub fn insert_referral(
    conn: &Connection,
    referrer_shop_id: &str,
    referred_shop_id: &str,
) -> Result<Referral> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO referrals (id, referrer_shop_id, referred_shop_id, status, bonus, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![&id, referrer_shop_id, referred_shop_id, ReferralStatus::Pending.as_ref(), now],
    )?;

    Ok(Referral {
        id,
        referrer_shop_id: referrer_shop_id.to_string(),
        referred_shop_id: referred_shop_id.to_string(),
        status: ReferralStatus::Pending,
        bonus: 0,
        created_at: now,
        rewarded_at: None,
    })
}

pub fn get_referral_for_referred_shop(
    conn: &Connection,
    referred_shop_id: &str,
) -> Result<Option<Referral>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM referrals WHERE referred_shop_id = ?1",
            REFERRAL_COLS
        ),
        &[&referred_shop_id],
    )
}

/// Compare-and-swap pending -> rewarded. Returns false if another caller
/// already rewarded this referral.
pub fn try_mark_referral_rewarded(conn: &Connection, id: &str, bonus: i64, now: i64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE referrals SET status = ?1, bonus = ?2, rewarded_at = ?3
         WHERE id = ?4 AND status = ?5",
        params![
            ReferralStatus::Rewarded.as_ref(),
            bonus,
            now,
            id,
            ReferralStatus::Pending.as_ref()
        ],
    )?;
    Ok(updated > 0)
}

pub fn list_referrals_for_referrer(conn: &Connection, referrer_shop_id: &str) -> Result<Vec<Referral>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM referrals WHERE referrer_shop_id = ?1 ORDER BY created_at DESC",
            REFERRAL_COLS
        ),
        &[&referrer_shop_id],
    )
}

pub fn list_referrals_paginated(
    conn: &Connection,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Referral>, i64)> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM referrals", [], |row| row.get(0))?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM referrals ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
            REFERRAL_COLS
        ),
        params![limit, offset],
    )?;
    Ok((items, total))
}

// ============ Credit Requests ============

pub fn insert_credit_request(
    conn: &Connection,
    shop_id: &str,
    amount: i64,
    message: &str,
) -> Result<CreditRequest> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO credit_requests (id, shop_id, requested_amount, message, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![&id, shop_id, amount, message, CreditRequestStatus::Pending.as_ref(), now],
    )?;

    Ok(CreditRequest {
        id,
        shop_id: shop_id.to_string(),
        requested_amount: amount,
        message: message.to_string(),
        status: CreditRequestStatus::Pending,
        admin_response: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_credit_request_by_id(conn: &Connection, id: &str) -> Result<Option<CreditRequest>> {
    query_one(
        conn,
        &format!("SELECT {} FROM credit_requests WHERE id = ?1", CREDIT_REQUEST_COLS),
        &[&id],
    )
}

pub fn list_credit_requests_for_shop(conn: &Connection, shop_id: &str) -> Result<Vec<CreditRequest>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM credit_requests WHERE shop_id = ?1 ORDER BY created_at DESC",
            CREDIT_REQUEST_COLS
        ),
        &[&shop_id],
    )
}

pub fn list_credit_requests_paginated(
    conn: &Connection,
    status: Option<CreditRequestStatus>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<CreditRequest>, i64)> {
    let filter = Filter::new().eq("status", status.map(|s| s.as_ref().to_string()));
    let total = filter.count(conn, "credit_requests")?;

    let sql = format!(
        "SELECT {} FROM credit_requests {} ORDER BY created_at DESC LIMIT {} OFFSET {}",
        CREDIT_REQUEST_COLS, filter.clause, limit, offset
    );
    let items = query_all(conn, &sql, filter.refs().as_slice())?;
    Ok((items, total))
}

/// Move a request from `from` to `to`. Returns false if it was no longer in `from`.
pub fn transition_credit_request(
    conn: &Connection,
    id: &str,
    from: CreditRequestStatus,
    to: CreditRequestStatus,
    admin_response: Option<&str>,
) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE credit_requests
         SET status = ?1, admin_response = COALESCE(?2, admin_response), updated_at = ?3
         WHERE id = ?4 AND status = ?5",
        params![to.as_ref(), admin_response, now(), id, from.as_ref()],
    )?;
    Ok(updated > 0)
}

// ============ Credit Keys ============

/// Generate a credit key code: PREFIX-XXXX-XXXX-XXXX-XXXX
pub fn generate_key_code(prefix: &str) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();

    let mut part = || -> String {
        (0..4)
            .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
            .collect()
    };

    format!("{}-{}-{}-{}-{}", prefix, part(), part(), part(), part())
}

pub fn insert_credit_key(
    conn: &Connection,
    shop_id: &str,
    request_id: Option<&str>,
    key_code: &str,
    credit_amount: i64,
    expires_at: i64,
) -> Result<CreditKey> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO credit_keys (id, shop_id, request_id, key_code, credit_amount, is_used, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)",
        params![&id, shop_id, request_id, key_code, credit_amount, now, expires_at],
    )?;

    Ok(CreditKey {
        id,
        shop_id: shop_id.to_string(),
        request_id: request_id.map(String::from),
        key_code: key_code.to_string(),
        credit_amount,
        is_used: false,
        created_at: now,
        expires_at,
        used_at: None,
    })
}

pub fn get_credit_key_by_code(conn: &Connection, key_code: &str) -> Result<Option<CreditKey>> {
    query_one(
        conn,
        &format!("SELECT {} FROM credit_keys WHERE key_code = ?1", CREDIT_KEY_COLS),
        &[&key_code],
    )
}

pub fn list_credit_keys_for_shop(conn: &Connection, shop_id: &str) -> Result<Vec<CreditKey>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM credit_keys WHERE shop_id = ?1 ORDER BY created_at DESC",
            CREDIT_KEY_COLS
        ),
        &[&shop_id],
    )
}

/// Atomically mark a key as used, returning whether this call claimed it.
///
/// Uses compare-and-swap so that of several concurrent activations exactly
/// one observes `true`.
pub fn try_mark_credit_key_used(conn: &Connection, id: &str, now: i64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE credit_keys SET is_used = 1, used_at = ?1 WHERE id = ?2 AND is_used = 0",
        params![now, id],
    )?;
    Ok(updated > 0)
}

// ============ Credit Log ============

pub fn insert_credit_log(
    conn: &Connection,
    account_id: &str,
    delta: i64,
    balance_after: i64,
    reason: CreditReason,
    entity: EntityRef<'_>,
) -> Result<CreditLogEntry> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO credit_log (id, account_id, delta, balance_after, reason, entity_type, entity_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![&id, account_id, delta, balance_after, reason.as_ref(), entity.entity_type, entity.entity_id, now],
    )?;

    Ok(CreditLogEntry {
        id,
        account_id: account_id.to_string(),
        delta,
        balance_after,
        reason,
        entity_type: entity.entity_type.to_string(),
        entity_id: entity.entity_id.to_string(),
        created_at: now,
    })
}

pub fn query_credit_log(
    conn: &Connection,
    query: &CreditLogQuery,
) -> Result<(Vec<CreditLogEntry>, i64)> {
    let filter = Filter::new()
        .eq("account_id", query.account_id.clone())
        .eq("reason", query.reason.map(|r| r.as_ref().to_string()))
        .eq("entity_id", query.entity_id.clone())
        .gte("created_at", query.from_timestamp)
        .lte("created_at", query.to_timestamp);
    let total = filter.count(conn, "credit_log")?;

    let page = query.pagination();
    let sql = format!(
        "SELECT {} FROM credit_log {} ORDER BY created_at DESC, rowid DESC LIMIT {} OFFSET {}",
        CREDIT_LOG_COLS,
        filter.clause,
        page.limit(),
        page.offset()
    );
    let items = query_all(conn, &sql, filter.refs().as_slice())?;
    Ok((items, total))
}

/// Sum and count of all ledger deltas for an account.
pub fn sum_credit_log(conn: &Connection, account_id: &str) -> Result<(i64, i64)> {
    let totals = conn.query_row(
        "SELECT COALESCE(SUM(delta), 0), COUNT(*) FROM credit_log WHERE account_id = ?1",
        params![account_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(totals)
}

// ============ Audit Logs ============

#[allow(clippy::too_many_arguments)]
pub fn create_audit_log(
    conn: &Connection,
    enabled: bool,
    actor_type: ActorType,
    actor_id: Option<&str>,
    action: AuditAction,
    resource_type: &str,
    resource_id: &str,
    details: Option<&serde_json::Value>,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> Result<AuditLog> {
    let log = AuditLog {
        id: gen_id(),
        timestamp: now(),
        actor_type,
        actor_id: actor_id.map(String::from),
        action: action.as_ref().to_string(),
        resource_type: resource_type.to_string(),
        resource_id: resource_id.to_string(),
        details: details.cloned(),
        ip_address: ip_address.map(String::from),
        user_agent: user_agent.map(String::from),
    };

    // Skip database insert if audit logging is disabled
    if !enabled {
        return Ok(log);
    }

    let details_str = details.map(|d| d.to_string());

    conn.execute(
        "INSERT INTO audit_logs (id, timestamp, actor_type, actor_id, action, resource_type, resource_id, details, ip_address, user_agent)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            &log.id,
            log.timestamp,
            actor_type.as_ref(),
            actor_id,
            &log.action,
            resource_type,
            resource_id,
            &details_str,
            ip_address,
            user_agent
        ],
    )?;

    Ok(log)
}

pub fn query_audit_logs(conn: &Connection, query: &AuditLogQuery) -> Result<(Vec<AuditLog>, i64)> {
    let filter = Filter::new()
        .eq("actor_type", query.actor_type.map(|a| a.as_ref().to_string()))
        .eq("actor_id", query.actor_id.clone())
        .eq("action", query.action.clone())
        .eq("resource_type", query.resource_type.clone())
        .eq("resource_id", query.resource_id.clone())
        .gte("timestamp", query.from_timestamp)
        .lte("timestamp", query.to_timestamp);
    let total = filter.count(conn, "audit_logs")?;

    let page = query.pagination();
    let sql = format!(
        "SELECT {} FROM audit_logs {} ORDER BY timestamp DESC, rowid DESC LIMIT {} OFFSET {}",
        AUDIT_LOG_COLS,
        filter.clause,
        page.limit(),
        page.offset()
    );
    let items = query_all(conn, &sql, filter.refs().as_slice())?;
    Ok((items, total))
}

/// Purge audit events older than the retention window. A window of 0 keeps
/// everything. The credit log is the reconciliation record and is never purged.
pub fn purge_old_audit_logs(conn: &Connection, retention_days: i64) -> Result<usize> {
    if retention_days <= 0 {
        return Ok(0);
    }
    let cutoff = now().saturating_sub(retention_days.saturating_mul(86400));
    let deleted = conn.execute("DELETE FROM audit_logs WHERE timestamp < ?1", params![cutoff])?;
    Ok(deleted)
}
