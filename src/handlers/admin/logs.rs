use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::ledger;
use crate::models::{AuditLog, AuditLogQuery, CreditLogEntry, CreditLogQuery};
use crate::pagination::Paginated;

/// Credit log across all accounts, newest first.
pub async fn query_credit_log(
    State(state): State<AppState>,
    Query(query): Query<CreditLogQuery>,
) -> Result<Json<Paginated<CreditLogEntry>>> {
    let conn = state.db.get()?;
    let (entries, total) = ledger::history(&conn, &query)?;
    let page = query.pagination();
    Ok(Json(Paginated::new(entries, total, page.limit(), page.offset())))
}

pub async fn query_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<Paginated<AuditLog>>> {
    let conn = state.audit.get()?;
    let (logs, total) = queries::query_audit_logs(&conn, &query)?;
    let page = query.pagination();
    Ok(Json(Paginated::new(logs, total, page.limit(), page.offset())))
}
