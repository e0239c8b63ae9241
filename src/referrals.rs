//! One-time referral payouts between shops.

use rusqlite::{Connection, Transaction};

use crate::db::{queries, write_tx};
use crate::error::{AppError, Result};
use crate::ledger;
use crate::models::{CreditReason, EntityRef, Referral, Role};

/// Record that `referred_shop_id` signed up through `referrer_shop_id`.
/// Runs inside the signup transaction.
pub fn register(
    tx: &Transaction<'_>,
    referrer_shop_id: &str,
    referred_shop_id: &str,
) -> Result<Referral> {
    if referrer_shop_id == referred_shop_id {
        return Err(AppError::Validation("A shop cannot refer itself".into()));
    }

    let referrer = queries::get_account_by_id(tx, referrer_shop_id)?
        .filter(|a| a.active && a.has_role(Role::ShopOwner))
        .ok_or_else(|| {
            AppError::Validation(format!("{} is not an active shop", referrer_shop_id))
        })?;

    queries::insert_referral(tx, &referrer.id, referred_shop_id)
}

/// Pay out a pending referral once the referred shop has created a coupon.
///
/// Returns the referral when this call rewarded it. Calling it again, or
/// concurrently, is harmless: the pending -> rewarded flip is a guarded
/// UPDATE and the bonus is credited in the same transaction.
pub fn on_coupon_created(
    conn: &mut Connection,
    shop_id: &str,
    bonus: i64,
) -> Result<Option<Referral>> {
    let rewarded = write_tx(conn, |tx| {
        let Some(referral) = queries::get_referral_for_referred_shop(tx, shop_id)? else {
            return Ok(None);
        };
        if queries::count_coupons_for_shop(tx, shop_id)? == 0 {
            return Ok(None);
        }

        let now = queries::now();
        if !queries::try_mark_referral_rewarded(tx, &referral.id, bonus, now)? {
            return Ok(None);
        }

        if bonus > 0 {
            ledger::credit(
                tx,
                &referral.referrer_shop_id,
                bonus,
                CreditReason::ReferralBonus,
                EntityRef::new("referral", &referral.id),
            )?;
        }

        queries::get_referral_for_referred_shop(tx, shop_id)
    })?;

    if let Some(referral) = &rewarded {
        tracing::info!(
            "Referral {} rewarded: shop {} earned {} credits",
            referral.id,
            referral.referrer_shop_id,
            referral.bonus
        );
    }

    Ok(rewarded)
}

pub fn referrals_for_referrer(conn: &Connection, referrer_shop_id: &str) -> Result<Vec<Referral>> {
    queries::list_referrals_for_referrer(conn, referrer_shop_id)
}
