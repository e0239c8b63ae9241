//! Row mapping for every persisted model, plus the column lists that keep
//! SELECTs and `from_row` in the same order.

use std::str::FromStr;

use rusqlite::{Connection, OptionalExtension, Row, ToSql, types::Type};

use crate::error::Result;
use crate::models::*;

pub const ACCOUNT_COLS: &str = "id, name, roles, balance, active, created_at";

pub const API_KEY_COLS: &str = "id, account_id, prefix, key_hash, created_at, revoked_at";

pub const COUPON_COLS: &str = "id, shop_id, title, description, discount_type, discount_value, max_uses, uses_left, customer_reward_points, affiliate_commission, validity_type, validity_days, expires_at, clicks, created_at";

pub const REDEMPTION_COLS: &str = "id, coupon_id, customer_id, affiliate_id, reward_points, commission, idempotency_key, created_at";

pub const REFERRAL_COLS: &str = "id, referrer_shop_id, referred_shop_id, status, bonus, created_at, rewarded_at";

pub const CREDIT_REQUEST_COLS: &str = "id, shop_id, requested_amount, message, status, admin_response, created_at, updated_at";

pub const CREDIT_KEY_COLS: &str = "id, shop_id, request_id, key_code, credit_amount, is_used, created_at, expires_at, used_at";

pub const CREDIT_LOG_COLS: &str = "id, account_id, delta, balance_after, reason, entity_type, entity_id, created_at";

pub const AUDIT_LOG_COLS: &str = "id, timestamp, actor_type, actor_id, action, resource_type, resource_id, details, ip_address, user_agent";

pub trait FromRow: Sized {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Parse a text column into a strum enum, surfacing bad values as a
/// conversion error rather than panicking.
fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn query_one<T: FromRow>(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<Option<T>> {
    let result = conn.query_row(sql, params, |row| T::from_row(row)).optional()?;
    Ok(result)
}

pub fn query_all<T: FromRow>(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| T::from_row(row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl FromRow for Account {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let roles: String = row.get(2)?;
        Ok(Account {
            id: row.get(0)?,
            name: row.get(1)?,
            roles: Roles::from_column(&roles).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
            })?,
            balance: row.get(3)?,
            active: row.get::<_, i32>(4)? != 0,
            created_at: row.get(5)?,
        })
    }
}

impl FromRow for ApiKey {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ApiKey {
            id: row.get(0)?,
            account_id: row.get(1)?,
            prefix: row.get(2)?,
            key_hash: row.get(3)?,
            created_at: row.get(4)?,
            revoked_at: row.get(5)?,
        })
    }
}

impl FromRow for Coupon {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Coupon {
            id: row.get(0)?,
            shop_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            discount_type: parse_col(row, 4)?,
            discount_value: row.get(5)?,
            max_uses: row.get(6)?,
            uses_left: row.get(7)?,
            customer_reward_points: row.get(8)?,
            affiliate_commission: row.get(9)?,
            validity_type: parse_col(row, 10)?,
            validity_days: row.get(11)?,
            expires_at: row.get(12)?,
            clicks: row.get(13)?,
            created_at: row.get(14)?,
        })
    }
}

impl FromRow for Redemption {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Redemption {
            id: row.get(0)?,
            coupon_id: row.get(1)?,
            customer_id: row.get(2)?,
            affiliate_id: row.get(3)?,
            reward_points: row.get(4)?,
            commission: row.get(5)?,
            idempotency_key: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

impl FromRow for Referral {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Referral {
            id: row.get(0)?,
            referrer_shop_id: row.get(1)?,
            referred_shop_id: row.get(2)?,
            status: parse_col(row, 3)?,
            bonus: row.get(4)?,
            created_at: row.get(5)?,
            rewarded_at: row.get(6)?,
        })
    }
}

impl FromRow for CreditRequest {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(CreditRequest {
            id: row.get(0)?,
            shop_id: row.get(1)?,
            requested_amount: row.get(2)?,
            message: row.get(3)?,
            status: parse_col(row, 4)?,
            admin_response: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl FromRow for CreditKey {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(CreditKey {
            id: row.get(0)?,
            shop_id: row.get(1)?,
            request_id: row.get(2)?,
            key_code: row.get(3)?,
            credit_amount: row.get(4)?,
            is_used: row.get::<_, i32>(5)? != 0,
            created_at: row.get(6)?,
            expires_at: row.get(7)?,
            used_at: row.get(8)?,
        })
    }
}

impl FromRow for CreditLogEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(CreditLogEntry {
            id: row.get(0)?,
            account_id: row.get(1)?,
            delta: row.get(2)?,
            balance_after: row.get(3)?,
            reason: parse_col(row, 4)?,
            entity_type: row.get(5)?,
            entity_id: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

impl FromRow for AuditLog {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let details: Option<String> = row.get(7)?;
        Ok(AuditLog {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            actor_type: parse_col(row, 2)?,
            actor_id: row.get(3)?,
            action: row.get(4)?,
            resource_type: row.get(5)?,
            resource_id: row.get(6)?,
            details: details.and_then(|s| serde_json::from_str(&s).ok()),
            ip_address: row.get(8)?,
            user_agent: row.get(9)?,
        })
    }
}
