//! Credit requests and the one-time credit keys that settle them.

use rusqlite::Connection;

use crate::config::Economy;
use crate::db::{queries, write_tx};
use crate::error::{AppError, Rejection, Result};
use crate::ledger;
use crate::models::{
    Account, ActivationOutcome, CreditKey, CreditReason, CreditRequest, CreditRequestStatus,
    EntityRef, IssueCreditKey, MAX_CREDIT_AMOUNT, Role, SubmitCreditRequest,
};

const KEY_PREFIX: &str = "CK";
const DEFAULT_KEY_LIFETIME_DAYS: i64 = 30;
const MAX_KEY_LIFETIME_DAYS: i64 = 3650;
const MAX_MESSAGE_LEN: usize = 1000;

pub fn submit_request(
    conn: &Connection,
    economy: &Economy,
    shop: &Account,
    input: &SubmitCreditRequest,
) -> Result<CreditRequest> {
    shop.require_role(Role::ShopOwner)?;

    if input.amount < economy.min_credit_request {
        return Err(AppError::Validation(format!(
            "Minimum credit request is {}",
            economy.min_credit_request
        )));
    }
    if input.amount > MAX_CREDIT_AMOUNT {
        return Err(AppError::Validation(format!(
            "Maximum credit request is {}",
            MAX_CREDIT_AMOUNT
        )));
    }
    let message = input.message.trim();
    if message.is_empty() || message.len() > MAX_MESSAGE_LEN {
        return Err(AppError::Validation(format!(
            "Message must be between 1 and {} characters",
            MAX_MESSAGE_LEN
        )));
    }

    let request = queries::insert_credit_request(conn, &shop.id, input.amount, message)?;
    tracing::info!(
        "Shop {} requested {} credits ({})",
        shop.id,
        request.requested_amount,
        request.id
    );
    Ok(request)
}

/// Issue a key for a pending request, moving the request to `key_generated`.
pub fn issue(conn: &mut Connection, request_id: &str, input: &IssueCreditKey) -> Result<CreditKey> {
    let now = queries::now();
    let expires_at = match (input.expires_at, input.expires_in_days) {
        (Some(at), _) => at,
        (None, Some(days)) if (1..=MAX_KEY_LIFETIME_DAYS).contains(&days) => now + days * 86400,
        (None, Some(_)) => {
            return Err(AppError::Validation(format!(
                "expires_in_days must be between 1 and {}",
                MAX_KEY_LIFETIME_DAYS
            )));
        }
        (None, None) => now + DEFAULT_KEY_LIFETIME_DAYS * 86400,
    };
    if expires_at <= now {
        return Err(AppError::Validation("Key expiry must be in the future".into()));
    }

    let key = write_tx(conn, |tx| {
        let request = queries::get_credit_request_by_id(tx, request_id)?
            .ok_or_else(|| AppError::NotFound("Credit request not found".into()))?;

        let amount = input.amount.unwrap_or(request.requested_amount);
        if !(1..=MAX_CREDIT_AMOUNT).contains(&amount) {
            return Err(AppError::Validation(format!(
                "Key amount must be between 1 and {}",
                MAX_CREDIT_AMOUNT
            )));
        }

        if !queries::transition_credit_request(
            tx,
            &request.id,
            CreditRequestStatus::Pending,
            CreditRequestStatus::KeyGenerated,
            input.admin_response.as_deref(),
        )? {
            return Err(AppError::Validation(format!(
                "Credit request is already {}",
                request.status.as_ref()
            )));
        }

        let code = queries::generate_key_code(KEY_PREFIX);
        queries::insert_credit_key(tx, &request.shop_id, Some(&request.id), &code, amount, expires_at)
    })?;

    tracing::info!(
        "Issued credit key {} for {} credits to shop {}",
        key.id,
        key.credit_amount,
        key.shop_id
    );
    Ok(key)
}

/// Redeem a credit key for `shop_id`.
///
/// Marking the key used and crediting the shop share one transaction, and
/// the mark is a guarded UPDATE, so concurrent attempts credit exactly once.
pub fn activate(conn: &mut Connection, key_code: &str, shop_id: &str) -> Result<ActivationOutcome> {
    let code = key_code.trim().to_uppercase();
    if code.is_empty() {
        return Ok(ActivationOutcome::Rejected(Rejection::InvalidKey));
    }

    let outcome = write_tx(conn, |tx| {
        let Some(key) = queries::get_credit_key_by_code(tx, &code)? else {
            return Ok(ActivationOutcome::Rejected(Rejection::InvalidKey));
        };
        if key.shop_id != shop_id {
            return Ok(ActivationOutcome::Rejected(Rejection::OwnerMismatch));
        }
        if key.is_used {
            return Ok(ActivationOutcome::Rejected(Rejection::KeyAlreadyUsed));
        }
        let now = queries::now();
        if now >= key.expires_at {
            return Ok(ActivationOutcome::Rejected(Rejection::KeyExpired));
        }

        if !queries::try_mark_credit_key_used(tx, &key.id, now)? {
            return Ok(ActivationOutcome::Rejected(Rejection::KeyAlreadyUsed));
        }

        let entry = ledger::credit(
            tx,
            shop_id,
            key.credit_amount,
            CreditReason::CreditKey,
            EntityRef::new("credit_key", &key.id),
        )?;

        if let Some(request_id) = &key.request_id {
            queries::transition_credit_request(
                tx,
                request_id,
                CreditRequestStatus::KeyGenerated,
                CreditRequestStatus::Completed,
                None,
            )?;
        }

        Ok(ActivationOutcome::Activated {
            credited: key.credit_amount,
            balance: entry.balance_after,
            key: CreditKey {
                is_used: true,
                used_at: Some(now),
                ..key
            },
        })
    })?;

    match &outcome {
        ActivationOutcome::Activated { key, credited, .. } => {
            tracing::info!("Shop {} activated key {} for {} credits", shop_id, key.id, credited)
        }
        ActivationOutcome::Rejected(reason) => {
            tracing::info!("Key activation by shop {} rejected: {}", shop_id, reason.as_ref())
        }
    }

    Ok(outcome)
}

/// All keys issued to a shop. With `available_only`, drops used and expired keys.
pub fn keys_for_shop(conn: &Connection, shop_id: &str, available_only: bool) -> Result<Vec<CreditKey>> {
    let keys = queries::list_credit_keys_for_shop(conn, shop_id)?;
    if !available_only {
        return Ok(keys);
    }
    let now = queries::now();
    Ok(keys.into_iter().filter(|k| k.is_available(now)).collect())
}

pub fn requests_for_shop(conn: &Connection, shop_id: &str) -> Result<Vec<CreditRequest>> {
    queries::list_credit_requests_for_shop(conn, shop_id)
}

pub fn list_requests(
    conn: &Connection,
    status: Option<CreditRequestStatus>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<CreditRequest>, i64)> {
    queries::list_credit_requests_paginated(conn, status, limit, offset)
}
