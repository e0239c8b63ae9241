use axum::{
    extract::{Extension, State},
    http::HeaderMap,
};
use serde::Deserialize;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::middleware::AccountContext;
use crate::models::{
    ActivateCreditKey, ActivationOutcome, ActivationResponse, ActorType, AuditAction, CreditKey,
    CreditRequest, Role, SubmitCreditRequest,
};
use crate::util::AuditLogBuilder;
use crate::vault;

#[derive(Debug, Deserialize)]
pub struct CreditKeyQuery {
    /// Only keys that are unused and unexpired
    #[serde(default)]
    pub available: bool,
}

pub async fn submit_credit_request(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
    headers: HeaderMap,
    Json(input): Json<SubmitCreditRequest>,
) -> Result<Json<CreditRequest>> {
    let conn = state.db.get()?;
    let request = vault::submit_request(&conn, &state.economy, &ctx.account, &input)?;

    if let Some(audit_conn) = state.audit_conn() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(ActorType::Account, Some(ctx.id()))
            .action(AuditAction::SubmitCreditRequest)
            .resource("credit_request", &request.id)
            .details(&serde_json::json!({ "amount": request.requested_amount }))
            .save_best_effort();
    }

    Ok(Json(request))
}

pub async fn list_my_credit_requests(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
) -> Result<Json<Vec<CreditRequest>>> {
    ctx.account.require_role(Role::ShopOwner)?;
    let conn = state.db.get()?;
    Ok(Json(vault::requests_for_shop(&conn, ctx.id())?))
}

pub async fn list_credit_keys(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
    Query(query): Query<CreditKeyQuery>,
) -> Result<Json<Vec<CreditKey>>> {
    ctx.account.require_role(Role::ShopOwner)?;
    let conn = state.db.get()?;
    Ok(Json(vault::keys_for_shop(&conn, ctx.id(), query.available)?))
}

/// Activate a credit key. Rejections are `200 { success: false, code }`.
pub async fn activate_credit_key(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
    headers: HeaderMap,
    Json(input): Json<ActivateCreditKey>,
) -> Result<Json<ActivationResponse>> {
    ctx.account.require_role(Role::ShopOwner)?;
    let mut conn = state.db.get()?;
    let outcome = vault::activate(&mut conn, &input.key_code, ctx.id())?;

    if let ActivationOutcome::Activated { key, credited, .. } = &outcome {
        if let Some(audit_conn) = state.audit_conn() {
            AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
                .actor(ActorType::Account, Some(ctx.id()))
                .action(AuditAction::ActivateCreditKey)
                .resource("credit_key", &key.id)
                .details(&serde_json::json!({ "credited": credited }))
                .save_best_effort();
        }
    }

    Ok(Json(outcome.into()))
}
