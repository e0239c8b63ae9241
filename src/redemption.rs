//! Coupon redemption: consume one use, pay the customer and the attributed
//! affiliate, and record what was awarded.

use hmac::{Hmac, Mac};
use rusqlite::{Connection, Transaction};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::coupons;
use crate::db::{queries, write_tx};
use crate::error::{AppError, Rejection, Result};
use crate::ledger;
use crate::models::{Coupon, CreditReason, EntityRef, RedemptionOutcome, Role};

type HmacSha256 = Hmac<Sha256>;

const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// Tunable redemption rules.
#[derive(Debug, Clone, Default)]
pub struct RedemptionPolicy {
    /// Successful redemptions allowed per customer per coupon; 0 = unlimited
    pub max_per_customer: u32,
    /// When set, affiliate attribution must carry a valid link signature
    pub affiliate_link_secret: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RedeemRequest {
    pub coupon_id: String,
    pub customer_id: Option<String>,
    pub affiliate_id: Option<String>,
    pub affiliate_sig: Option<String>,
    pub idempotency_key: Option<String>,
}

fn link_mac(secret: &str, coupon_id: &str, affiliate_id: &str) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("Invalid link secret: {}", e)))?;
    mac.update(coupon_id.as_bytes());
    mac.update(b":");
    mac.update(affiliate_id.as_bytes());
    Ok(mac)
}

/// Hex signature binding an affiliate to a coupon's distribution link.
pub fn sign_affiliate_link(secret: &str, coupon_id: &str, affiliate_id: &str) -> Result<String> {
    let mac = link_mac(secret, coupon_id, affiliate_id)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_affiliate_link(secret: &str, coupon_id: &str, affiliate_id: &str, sig: &str) -> bool {
    match sign_affiliate_link(secret, coupon_id, affiliate_id) {
        Ok(expected) => expected
            .as_bytes()
            .ct_eq(sig.trim().to_ascii_lowercase().as_bytes())
            .into(),
        Err(_) => false,
    }
}

/// Attribution that survives the signature check, before any database lookups.
fn signed_affiliate<'a>(request: &'a RedeemRequest, policy: &RedemptionPolicy) -> Option<&'a str> {
    let affiliate_id = request.affiliate_id.as_deref().filter(|s| !s.is_empty())?;

    if let Some(secret) = &policy.affiliate_link_secret {
        let valid = request
            .affiliate_sig
            .as_deref()
            .is_some_and(|sig| verify_affiliate_link(secret, &request.coupon_id, affiliate_id, sig));
        if !valid {
            tracing::warn!(
                "Dropping unsigned affiliate {} on coupon {}",
                affiliate_id,
                request.coupon_id
            );
            return None;
        }
    }
    Some(affiliate_id)
}

/// An affiliate is paid only if it is a distinct, active account with the
/// affiliate capability.
fn eligible_affiliate(
    tx: &Transaction<'_>,
    affiliate_id: &str,
    customer_id: &str,
    coupon: &Coupon,
) -> Result<bool> {
    if affiliate_id == customer_id || affiliate_id == coupon.shop_id {
        return Ok(false);
    }
    Ok(queries::get_account_by_id(tx, affiliate_id)?
        .is_some_and(|a| a.active && a.has_role(Role::Affiliate)))
}

pub fn redeem(
    conn: &mut Connection,
    request: &RedeemRequest,
    policy: &RedemptionPolicy,
) -> Result<RedemptionOutcome> {
    let customer_id = request.customer_id.as_deref().ok_or(AppError::Unauthorized)?;
    let customer = queries::get_account_by_id(conn, customer_id)?
        .filter(|a| a.active)
        .ok_or(AppError::Unauthorized)?;

    let idempotency_key = request.idempotency_key.as_deref().filter(|k| !k.is_empty());
    if idempotency_key.is_some_and(|k| k.len() > MAX_IDEMPOTENCY_KEY_LEN) {
        return Err(AppError::Validation(format!(
            "idempotency_key must be at most {} characters",
            MAX_IDEMPOTENCY_KEY_LEN
        )));
    }

    let affiliate_id = signed_affiliate(request, policy);

    let outcome = write_tx(conn, |tx| {
        if let Some(key) = idempotency_key {
            if let Some(existing) =
                queries::get_redemption_by_idempotency_key(tx, &customer.id, key)?
            {
                if existing.coupon_id != request.coupon_id {
                    return Err(AppError::Validation(
                        "idempotency_key was already used for a different coupon".into(),
                    ));
                }
                return Ok(RedemptionOutcome::Succeeded {
                    redemption: existing,
                    replayed: true,
                });
            }
        }

        if policy.max_per_customer > 0 {
            let prior =
                queries::count_redemptions_for_customer_coupon(tx, &customer.id, &request.coupon_id)?;
            if prior >= i64::from(policy.max_per_customer) {
                return Ok(RedemptionOutcome::Rejected(Rejection::AlreadyRedeemed));
            }
        }

        let consumed = match coupons::try_consume_use(tx, &request.coupon_id) {
            Ok(consumed) => consumed,
            Err(AppError::Rejected(reason)) => return Ok(RedemptionOutcome::Rejected(reason)),
            Err(e) => return Err(e),
        };
        let coupon = &consumed.coupon;

        let paid_affiliate = match affiliate_id {
            Some(id) if eligible_affiliate(tx, id, &customer.id, coupon)? => Some(id),
            Some(id) => {
                tracing::warn!("Dropping ineligible affiliate {} on coupon {}", id, coupon.id);
                None
            }
            None => None,
        };
        let commission = if paid_affiliate.is_some() {
            coupon.affiliate_commission
        } else {
            0
        };

        // Inserted before crediting: its id correlates the credit log entries.
        let redemption = queries::insert_redemption(
            tx,
            &coupon.id,
            &customer.id,
            paid_affiliate,
            coupon.customer_reward_points,
            commission,
            idempotency_key,
            queries::now(),
        )?;
        let entity = EntityRef::new("redemption", &redemption.id);

        if redemption.reward_points > 0 {
            ledger::credit(
                tx,
                &customer.id,
                redemption.reward_points,
                CreditReason::RedemptionReward,
                entity,
            )?;
        }
        if let (Some(affiliate), true) = (paid_affiliate, commission > 0) {
            ledger::credit(tx, affiliate, commission, CreditReason::AffiliateCommission, entity)?;
        }

        Ok(RedemptionOutcome::Succeeded {
            redemption,
            replayed: false,
        })
    })?;

    match &outcome {
        RedemptionOutcome::Succeeded {
            redemption,
            replayed: false,
        } => tracing::info!(
            "Customer {} redeemed coupon {} (reward {}, commission {})",
            customer.id,
            redemption.coupon_id,
            redemption.reward_points,
            redemption.commission
        ),
        RedemptionOutcome::Succeeded { replayed: true, .. } => tracing::debug!(
            "Replayed redemption for customer {} on coupon {}",
            customer.id,
            request.coupon_id
        ),
        RedemptionOutcome::Rejected(reason) => tracing::info!(
            "Redemption of coupon {} by {} rejected: {}",
            request.coupon_id,
            customer.id,
            reason.as_ref()
        ),
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affiliate_link_signature_roundtrip() {
        let sig = sign_affiliate_link("secret", "coupon-1", "aff-1").unwrap();
        assert!(verify_affiliate_link("secret", "coupon-1", "aff-1", &sig));
        assert!(verify_affiliate_link("secret", "coupon-1", "aff-1", &sig.to_uppercase()));
        assert!(!verify_affiliate_link("secret", "coupon-2", "aff-1", &sig));
        assert!(!verify_affiliate_link("other", "coupon-1", "aff-1", &sig));
        assert!(!verify_affiliate_link("secret", "coupon-1", "aff-1", ""));
    }

    #[test]
    fn test_unsigned_affiliate_dropped_when_secret_set() {
        let policy = RedemptionPolicy {
            max_per_customer: 1,
            affiliate_link_secret: Some("secret".into()),
        };
        let request = RedeemRequest {
            coupon_id: "c".into(),
            affiliate_id: Some("a".into()),
            ..Default::default()
        };
        assert_eq!(signed_affiliate(&request, &policy), None);
        assert_eq!(signed_affiliate(&request, &RedemptionPolicy::default()), Some("a"));
    }
}
