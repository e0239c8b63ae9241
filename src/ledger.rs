//! Account balances and the append-only credit log.
//!
//! Every balance change goes through [`credit`] or [`debit`], which update the
//! balance and append exactly one log row in the caller's transaction. The
//! sum of an account's log deltas therefore always equals its balance.

use rusqlite::{Connection, OptionalExtension, Transaction, params};

use crate::db::{queries, write_tx};
use crate::error::{AppError, Rejection, Result};
use crate::models::{
    AdjustCredits, CreditLogEntry, CreditLogQuery, CreditReason, EntityRef, MAX_BALANCE,
    MAX_CREDIT_AMOUNT, Reconciliation,
};

fn check_amount(amount: i64) -> Result<()> {
    if !(1..=MAX_CREDIT_AMOUNT).contains(&amount) {
        return Err(AppError::Validation(format!(
            "Amount must be between 1 and {}",
            MAX_CREDIT_AMOUNT
        )));
    }
    Ok(())
}

fn apply_delta(
    tx: &Transaction<'_>,
    account_id: &str,
    delta: i64,
    reason: CreditReason,
    entity: EntityRef<'_>,
) -> Result<CreditLogEntry> {
    // The guard and the write are one statement, so two debits racing for the
    // same balance cannot both pass the check. |delta| is bounded, so
    // `?3 - ?1` stays an integer.
    let balance_after: Option<i64> = tx
        .query_row(
            "UPDATE accounts SET balance = balance + ?1
             WHERE id = ?2 AND balance + ?1 >= 0 AND balance <= ?3 - ?1
             RETURNING balance",
            params![delta, account_id, MAX_BALANCE],
            |row| row.get(0),
        )
        .optional()?;

    let Some(balance_after) = balance_after else {
        return match queries::get_account_by_id(tx, account_id)? {
            None => Err(AppError::NotFound(format!("Account {} not found", account_id))),
            Some(_) if delta < 0 => Err(Rejection::InsufficientCredits.into()),
            Some(account) => {
                tracing::warn!(
                    "Credit of {} to account {} would exceed the balance limit",
                    delta,
                    account.id
                );
                Err(AppError::Validation(format!(
                    "Balance cannot exceed {}",
                    MAX_BALANCE
                )))
            }
        };
    };

    queries::insert_credit_log(tx, account_id, delta, balance_after, reason, entity)
}

/// Add `amount` to an account's balance.
pub fn credit(
    tx: &Transaction<'_>,
    account_id: &str,
    amount: i64,
    reason: CreditReason,
    entity: EntityRef<'_>,
) -> Result<CreditLogEntry> {
    check_amount(amount)?;
    apply_delta(tx, account_id, amount, reason, entity)
}

/// Subtract `amount` from an account's balance, rejecting with
/// `INSUFFICIENT_CREDITS` rather than going below zero.
pub fn debit(
    tx: &Transaction<'_>,
    account_id: &str,
    amount: i64,
    reason: CreditReason,
    entity: EntityRef<'_>,
) -> Result<CreditLogEntry> {
    check_amount(amount)?;
    apply_delta(tx, account_id, -amount, reason, entity)
}

/// Manual admin adjustment in either direction, correlated with `reference`
/// (usually the acting admin's id).
pub fn adjust(
    conn: &mut Connection,
    account_id: &str,
    input: &AdjustCredits,
    reference: &str,
) -> Result<CreditLogEntry> {
    if input.delta == 0 {
        return Err(AppError::Validation("delta must be non-zero".into()));
    }
    let magnitude = input.delta.checked_abs().unwrap_or(i64::MAX);
    check_amount(magnitude)?;

    let entity = EntityRef::new("admin_adjustment", reference);
    write_tx(conn, |tx| {
        if input.delta > 0 {
            credit(tx, account_id, magnitude, CreditReason::AdminAdjustment, entity)
        } else {
            debit(tx, account_id, magnitude, CreditReason::AdminAdjustment, entity)
        }
    })
}

pub fn balance(conn: &Connection, account_id: &str) -> Result<i64> {
    queries::get_account_by_id(conn, account_id)?
        .map(|a| a.balance)
        .ok_or_else(|| AppError::NotFound(format!("Account {} not found", account_id)))
}

pub fn history(conn: &Connection, query: &CreditLogQuery) -> Result<(Vec<CreditLogEntry>, i64)> {
    queries::query_credit_log(conn, query)
}

/// Compare an account's balance with the sum of its credit log.
pub fn reconcile(conn: &Connection, account_id: &str) -> Result<Reconciliation> {
    let balance = balance(conn, account_id)?;
    let (log_total, entry_count) = queries::sum_credit_log(conn, account_id)?;
    Ok(Reconciliation {
        account_id: account_id.to_string(),
        balance,
        log_total,
        entry_count,
        consistent: balance == log_total,
    })
}

/// Reconcile every account, returning only the inconsistent ones.
pub fn reconcile_all(conn: &Connection) -> Result<Vec<Reconciliation>> {
    let mut stmt = conn.prepare("SELECT id FROM accounts ORDER BY created_at")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut mismatches = Vec::new();
    for id in ids {
        let report = reconcile(conn, &id)?;
        if !report.consistent {
            tracing::warn!(
                "Ledger mismatch for account {}: balance {} vs log {}",
                id,
                report.balance,
                report.log_total
            );
            mismatches.push(report);
        }
    }
    Ok(mismatches)
}
