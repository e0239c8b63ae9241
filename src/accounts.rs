//! Account provisioning. Accounts are created by an admin (or the CLI) and
//! are never deleted, only deactivated.

use rusqlite::Connection;

use crate::config::Economy;
use crate::db::{queries, write_tx};
use crate::error::{AppError, Result};
use crate::ledger;
use crate::models::{AccountCreated, CreateAccount, CreditReason, EntityRef, Role, Roles};
use crate::referrals;

/// Create an account with its first API key. A `referred_by` shop gets a
/// pending referral, and new shops receive the signup grant if one is set.
pub fn create_account(
    conn: &mut Connection,
    economy: &Economy,
    input: &CreateAccount,
) -> Result<AccountCreated> {
    input.validate()?;

    let created = write_tx(conn, |tx| {
        let mut account = queries::create_account(tx, &input.name, &input.roles)?;
        let (_key, api_key) = queries::create_api_key(tx, &account.id)?;

        if let Some(referrer) = input.referred_by.as_deref() {
            referrals::register(tx, referrer, &account.id)?;
        }

        if economy.shop_signup_credits > 0 && account.has_role(Role::ShopOwner) {
            let entry = ledger::credit(
                tx,
                &account.id,
                economy.shop_signup_credits,
                CreditReason::SignupBonus,
                EntityRef::new("account", &account.id),
            )?;
            account.balance = entry.balance_after;
        }

        Ok(AccountCreated { account, api_key })
    })?;

    tracing::info!(
        "Created account {} with roles [{}]",
        created.account.id,
        created.account.roles.to_column()
    );
    Ok(created)
}

/// Create an admin account unless an active admin already exists.
/// Returns None when there was nothing to do.
pub fn bootstrap_admin(
    conn: &mut Connection,
    economy: &Economy,
    name: &str,
) -> Result<Option<AccountCreated>> {
    if queries::count_admins(conn)? > 0 {
        return Ok(None);
    }
    create_admin(conn, economy, name).map(Some)
}

pub fn create_admin(conn: &mut Connection, economy: &Economy, name: &str) -> Result<AccountCreated> {
    let input = CreateAccount {
        name: name.to_string(),
        roles: Roles::new([Role::Admin]),
        referred_by: None,
    };
    create_account(conn, economy, &input)
}

/// Refuse to strip the last active admin of admin access.
fn guard_last_admin(conn: &Connection, account_id: &str) -> Result<()> {
    let account = queries::get_account_by_id(conn, account_id)?
        .ok_or_else(|| AppError::NotFound("Account not found".into()))?;
    if account.active && account.has_role(Role::Admin) && queries::count_admins(conn)? <= 1 {
        return Err(AppError::Validation("Cannot remove the last admin".into()));
    }
    Ok(())
}

/// Replace an account's roles. The last-admin check shares the write
/// transaction, so concurrent demotions cannot both pass it.
pub fn update_roles(conn: &mut Connection, account_id: &str, roles: &Roles) -> Result<()> {
    if roles.is_empty() {
        return Err(AppError::Validation("At least one role is required".into()));
    }
    write_tx(conn, |tx| {
        if !roles.has(Role::Admin) {
            guard_last_admin(tx, account_id)?;
        }
        if !queries::update_account_roles(tx, account_id, roles)? {
            return Err(AppError::NotFound("Account not found".into()));
        }
        Ok(())
    })
}

pub fn deactivate(conn: &mut Connection, account_id: &str) -> Result<()> {
    let changed = write_tx(conn, |tx| {
        guard_last_admin(tx, account_id)?;
        queries::deactivate_account(tx, account_id)
    })?;
    if !changed {
        tracing::debug!("Account {} was already inactive", account_id);
    }
    Ok(())
}
