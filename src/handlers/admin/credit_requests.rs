use axum::{
    extract::{Extension, State},
    http::HeaderMap,
};
use serde::Deserialize;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Path, Query};
use crate::middleware::AccountContext;
use crate::models::{
    ActorType, AuditAction, CreditKey, CreditRequest, CreditRequestStatus, IssueCreditKey,
};
use crate::pagination::{Paginated, PaginationQuery};
use crate::util::AuditLogBuilder;
use crate::vault;

#[derive(Debug, Deserialize)]
pub struct CreditRequestQuery {
    pub status: Option<CreditRequestStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_credit_requests(
    State(state): State<AppState>,
    Query(query): Query<CreditRequestQuery>,
) -> Result<Json<Paginated<CreditRequest>>> {
    let page = PaginationQuery {
        limit: query.limit,
        offset: query.offset,
    };
    let conn = state.db.get()?;
    let (requests, total) = vault::list_requests(&conn, query.status, page.limit(), page.offset())?;
    Ok(Json(Paginated::new(requests, total, page.limit(), page.offset())))
}

/// Issue the credit key for a pending request.
pub async fn issue_credit_key(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<IssueCreditKey>,
) -> Result<Json<CreditKey>> {
    let mut conn = state.db.get()?;
    let key = vault::issue(&mut conn, &id, &input)?;

    if let Some(audit_conn) = state.audit_conn() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(ActorType::Admin, Some(ctx.id()))
            .action(AuditAction::IssueCreditKey)
            .resource("credit_key", &key.id)
            .details(&serde_json::json!({
                "request_id": id,
                "shop_id": key.shop_id,
                "amount": key.credit_amount,
                "expires_at": key.expires_at,
            }))
            .save_best_effort();
    }

    Ok(Json(key))
}
