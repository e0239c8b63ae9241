//! Coupon definitions and their remaining-use counters.

use rusqlite::{Connection, Transaction};

use crate::config::Economy;
use crate::db::{queries, write_tx};
use crate::error::{AppError, Rejection, Result};
use crate::ledger;
use crate::models::{
    Account, ConsumeResult, Coupon, CouponStatus, CreateCoupon, CreditReason, EntityRef, Referral,
    Role,
};
use crate::referrals;

/// Take one use of a coupon.
///
/// The decrement is a single guarded UPDATE, so with N uses left at most N
/// callers succeed no matter how they interleave. When nothing was consumed
/// the coupon is re-read only to pick the rejection reason.
pub fn try_consume_use(tx: &Transaction<'_>, coupon_id: &str) -> Result<ConsumeResult> {
    let now = queries::now();

    if let Some(uses_left_after) = queries::decrement_coupon_use(tx, coupon_id, now)? {
        let coupon = queries::get_coupon_by_id(tx, coupon_id)?
            .ok_or(Rejection::CouponNotFound)?;
        return Ok(ConsumeResult {
            coupon,
            uses_left_after,
        });
    }

    let rejection = match queries::get_coupon_by_id(tx, coupon_id)? {
        None => Rejection::CouponNotFound,
        Some(coupon) => match coupon.status(now) {
            CouponStatus::Expired => Rejection::CouponExpired,
            CouponStatus::Exhausted => Rejection::CouponExhausted,
            // Lost a race between the guarded UPDATE and this read; the use is gone.
            CouponStatus::Active => Rejection::CouponExhausted,
        },
    };
    Err(rejection.into())
}

/// Count a view of the coupon. Never fails and never touches `uses_left`.
pub fn record_click(conn: &Connection, coupon_id: &str) {
    match queries::increment_coupon_clicks(conn, coupon_id) {
        Ok(true) => {}
        Ok(false) => tracing::debug!("Click for unknown coupon {}", coupon_id),
        Err(e) => tracing::debug!("Failed to record click for coupon {}: {}", coupon_id, e),
    }
}

/// Create a coupon, charging the owner the issuance fee in the same
/// transaction. Either both happen or neither does.
///
/// Also returns the shop's referral if this creation paid it out.
pub fn create_coupon(
    conn: &mut Connection,
    economy: &Economy,
    shop: &Account,
    input: &CreateCoupon,
) -> Result<(Coupon, Option<Referral>)> {
    shop.require_role(Role::ShopOwner)?;
    let now = queries::now();
    input.validate(now)?;
    let expires_at = input.resolve_expiry(now)?;

    let coupon = write_tx(conn, |tx| {
        let coupon = queries::insert_coupon(tx, &shop.id, input, expires_at, now)?;
        if economy.coupon_issuance_fee > 0 {
            ledger::debit(
                tx,
                &shop.id,
                economy.coupon_issuance_fee,
                CreditReason::CouponFee,
                EntityRef::new("coupon", &coupon.id),
            )?;
        }
        Ok(coupon)
    })?;

    tracing::info!(
        "Shop {} created coupon {} ({} uses)",
        shop.id,
        coupon.id,
        coupon.max_uses
    );

    // The coupon is committed; a failed referral payout is retried on the
    // shop's next coupon.
    let referral = referrals::on_coupon_created(conn, &shop.id, economy.referral_bonus)
        .unwrap_or_else(|e| {
            tracing::warn!("Referral check failed for shop {}: {}", shop.id, e);
            None
        });

    Ok((coupon, referral))
}

pub fn get_coupon(conn: &Connection, coupon_id: &str) -> Result<Coupon> {
    queries::get_coupon_by_id(conn, coupon_id)?
        .ok_or_else(|| AppError::NotFound("Coupon not found".into()))
}

pub fn coupons_for_shop(conn: &Connection, shop_id: &str) -> Result<Vec<Coupon>> {
    queries::list_coupons_for_shop(conn, shop_id)
}
