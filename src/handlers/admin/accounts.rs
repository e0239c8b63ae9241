use axum::{
    extract::{Extension, State},
    http::HeaderMap,
};

use crate::accounts;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::ledger;
use crate::middleware::AccountContext;
use crate::models::{
    Account, AccountCreated, ActorType, AdjustCredits, AuditAction, CreateAccount, CreditLogEntry,
    Reconciliation, UpdateRoles,
};
use crate::pagination::{Paginated, PaginationQuery};
use crate::util::AuditLogBuilder;

pub async fn create_account(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
    headers: HeaderMap,
    Json(input): Json<CreateAccount>,
) -> Result<Json<AccountCreated>> {
    let mut conn = state.db.get()?;
    let created = accounts::create_account(&mut conn, &state.economy, &input)?;

    if let Some(audit_conn) = state.audit_conn() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(ActorType::Admin, Some(ctx.id()))
            .action(AuditAction::CreateAccount)
            .resource("account", &created.account.id)
            .details(&serde_json::json!({
                "name": created.account.name,
                "roles": created.account.roles,
                "referred_by": input.referred_by,
            }))
            .save_best_effort();
    }

    Ok(Json(created))
}

pub async fn list_accounts(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Paginated<Account>>> {
    let conn = state.db.get()?;
    let limit = query.limit();
    let offset = query.offset();
    let (accounts, total) = queries::list_accounts_paginated(&conn, limit, offset)?;
    Ok(Json(Paginated::new(accounts, total, limit, offset)))
}

pub async fn update_account_roles(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<UpdateRoles>,
) -> Result<Json<Account>> {
    let mut conn = state.db.get()?;
    accounts::update_roles(&mut conn, &id, &input.roles)?;
    let account = queries::get_account_by_id(&conn, &id)?
        .ok_or_else(|| AppError::NotFound("Account not found".into()))?;

    if let Some(audit_conn) = state.audit_conn() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(ActorType::Admin, Some(ctx.id()))
            .action(AuditAction::UpdateRoles)
            .resource("account", &id)
            .details(&serde_json::json!({ "roles": input.roles }))
            .save_best_effort();
    }

    Ok(Json(account))
}

pub async fn deactivate_account(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Account>> {
    if id == ctx.account.id {
        return Err(AppError::Validation("Cannot deactivate your own account".into()));
    }

    let mut conn = state.db.get()?;
    accounts::deactivate(&mut conn, &id)?;
    let account = queries::get_account_by_id(&conn, &id)?
        .ok_or_else(|| AppError::NotFound("Account not found".into()))?;

    if let Some(audit_conn) = state.audit_conn() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(ActorType::Admin, Some(ctx.id()))
            .action(AuditAction::DeactivateAccount)
            .resource("account", &id)
            .save_best_effort();
    }

    Ok(Json(account))
}

/// Manual balance correction. Negative deltas are rejected with
/// `INSUFFICIENT_CREDITS` if they would overdraw the account.
pub async fn adjust_account_credits(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<AdjustCredits>,
) -> Result<Json<CreditLogEntry>> {
    let mut conn = state.db.get()?;
    let entry = ledger::adjust(&mut conn, &id, &input, ctx.id())?;

    if let Some(audit_conn) = state.audit_conn() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(ActorType::Admin, Some(ctx.id()))
            .action(AuditAction::AdjustCredits)
            .resource("account", &id)
            .details(&serde_json::json!({
                "delta": input.delta,
                "balance_after": entry.balance_after,
                "note": input.note,
            }))
            .save_best_effort();
    }

    Ok(Json(entry))
}

pub async fn reconcile_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Reconciliation>> {
    let conn = state.db.get()?;
    Ok(Json(ledger::reconcile(&conn, &id)?))
}
